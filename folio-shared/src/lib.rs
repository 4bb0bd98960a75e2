pub mod types;
pub mod errors;
pub mod middleware;

pub use types::*;
pub use errors::{ApiError, ApiResult, ErrorCode};

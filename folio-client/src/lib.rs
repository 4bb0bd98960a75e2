pub mod api;
pub mod feed;
pub mod models;
pub mod projection;
pub mod store;

pub use api::{ApiClient, ClientError};
pub use models::*;
pub use projection::{Delta, InsertPosition, Keyed, Projection};
pub use store::{FeedMessage, FeedSource, LiveStore};

use axum::http::StatusCode;

use folio_shared::errors::ApiError;

pub mod contact;
pub mod feed;
pub mod health;
pub mod notifications;
pub mod projects;

/// Bare `OPTIONS` requests answer an empty 200; the CORS layer attaches the
/// allow headers on the way out.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Fallback for any verb a route does not handle.
pub async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use folio_shared::errors::{ApiError, ApiResult, ErrorCode};

use crate::models::{ContactMessage, NewContactMessage};
use crate::services::contact_service;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ContactRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(email(message = "invalid email format"))]
    pub email: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub message: String,
    pub contact: ContactMessage,
}

fn required(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// POST /contact
/// Store an inbound message from an unauthenticated visitor.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ContactRequest>,
) -> ApiResult<Json<ContactResponse>> {
    let (name, email, message) = match (
        required(&req.name),
        required(&req.email),
        required(&req.message),
    ) {
        (Some(n), Some(e), Some(m)) => (n, e, m),
        _ => {
            return Err(ApiError::new(
                ErrorCode::Validation,
                "Name, email, and message are required",
            ))
        }
    };

    req.validate()
        .map_err(|e| ApiError::new(ErrorCode::Validation, e.to_string()))?;

    let new_message = NewContactMessage {
        name: name.to_string(),
        email: email.to_string(),
        subject: req.subject.clone().filter(|s| !s.trim().is_empty()),
        message: message.to_string(),
    };

    let contact = contact_service::create_message(&state.db, new_message)?;

    Ok(Json(ContactResponse {
        message: "Message sent successfully".to_string(),
        contact,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_rejects_missing_and_blank() {
        assert_eq!(required(&None), None);
        assert_eq!(required(&Some("".into())), None);
        assert_eq!(required(&Some("   ".into())), None);
        assert_eq!(required(&Some(" Ada ".into())), Some("Ada"));
    }

    #[test]
    fn email_format_validated() {
        let req = ContactRequest {
            name: Some("Ada".into()),
            email: Some("not-an-email".into()),
            subject: None,
            message: Some("hello".into()),
        };
        assert!(req.validate().is_err());

        let req = ContactRequest {
            email: Some("ada@example.com".into()),
            ..req
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn missing_fields_deserialize_to_none() {
        let req: ContactRequest = serde_json::from_str(r#"{"name": "Ada"}"#).unwrap();
        assert_eq!(req.name.as_deref(), Some("Ada"));
        assert!(req.email.is_none());
        assert!(req.message.is_none());
    }
}

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use folio_shared::errors::{ApiError, ApiResult, ErrorCode};
use folio_shared::types::auth::AuthUser;
use folio_shared::types::feed::{ChangeEvent, FeedTable};

use crate::models::Notification;
use crate::services::notification_service::{self, ReadFlagOutcome};
use crate::AppState;

/// Enumerated notification kinds accepted at the boundary. The wire field
/// is `type` and defaults to `info`.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

// --- Request DTOs ---

#[derive(Debug, Deserialize)]
pub struct CreateNotificationRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: NotificationKind,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNotificationRequest {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub read: Option<bool>,
}

// --- Response DTOs ---

#[derive(Debug, Serialize)]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Serialize)]
pub struct NotificationEnvelope {
    pub notification: Notification,
}

// --- Handlers ---

/// GET /notifications
/// List the caller's notifications, newest first.
pub async fn list(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> ApiResult<Json<NotificationList>> {
    let notifications = notification_service::list_for_user(&state.db, auth_user.id)?;
    Ok(Json(NotificationList { notifications }))
}

/// POST /notifications
/// Create a notification for the caller. The owner is always the
/// authenticated user; a client-supplied owner is never trusted.
pub async fn create(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Json(req): Json<CreateNotificationRequest>,
) -> ApiResult<Json<NotificationEnvelope>> {
    let title = req
        .title
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::new(ErrorCode::Validation, "title and message are required"))?;
    let message = req
        .message
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::new(ErrorCode::Validation, "title and message are required"))?;

    let notification =
        notification_service::create(&state.db, auth_user.id, title, message, req.kind.as_str())?;

    emit_change(
        &state,
        ChangeEvent::inserted(
            FeedTable::Notifications,
            notification.id,
            Some(notification.user_id),
            serde_json::to_value(&notification).unwrap_or_default(),
        ),
    );

    Ok(Json(NotificationEnvelope { notification }))
}

/// PATCH /notifications
/// Toggle the read flag. The update is filtered by id AND owner, so a
/// caller can never flip another user's notification by guessing an id.
pub async fn update(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Json(req): Json<UpdateNotificationRequest>,
) -> ApiResult<Json<NotificationEnvelope>> {
    let (id, read) = match (req.id, req.read) {
        (Some(id), Some(read)) => (id, read),
        _ => {
            return Err(ApiError::new(
                ErrorCode::Validation,
                "id and read are required",
            ))
        }
    };

    match notification_service::set_read(&state.db, id, auth_user.id, read)? {
        ReadFlagOutcome::Updated(notification) => {
            emit_change(
                &state,
                ChangeEvent::updated(
                    FeedTable::Notifications,
                    notification.id,
                    Some(notification.user_id),
                    serde_json::to_value(&notification).unwrap_or_default(),
                ),
            );
            Ok(Json(NotificationEnvelope { notification }))
        }
        // Missing row and foreign row are indistinguishable on purpose.
        ReadFlagOutcome::NotVisible => Err(ApiError::not_found("notification not found")),
    }
}

fn emit_change(state: &AppState, event: ChangeEvent) {
    let receivers = state.feed.emit(event);
    tracing::trace!(receivers, "notification change fanned out");
}

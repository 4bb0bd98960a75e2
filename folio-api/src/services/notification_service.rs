use diesel::prelude::*;
use uuid::Uuid;

use folio_shared::errors::{ApiError, ApiResult};

use crate::models::{NewNotification, Notification};
use crate::schema::notifications;
use crate::DbPool;

/// Outcome of a read-flag update. `NotVisible` deliberately conflates "no
/// such row" with "row owned by someone else": the update is filtered by
/// both id and owner, so an unauthorized attempt is a no-op and the caller
/// cannot learn whether the row exists.
#[derive(Debug)]
pub enum ReadFlagOutcome {
    Updated(Notification),
    NotVisible,
}

/// List a user's notifications, newest first.
pub fn list_for_user(pool: &DbPool, user_id: Uuid) -> ApiResult<Vec<Notification>> {
    let mut conn = pool.get().map_err(|e| {
        tracing::error!(error = %e, "failed to get db connection");
        ApiError::store("Failed to fetch notifications")
    })?;

    let items = notifications::table
        .filter(notifications::user_id.eq(user_id))
        .order(notifications::created_at.desc())
        .load::<Notification>(&mut conn)
        .map_err(|e| {
            tracing::error!(error = %e, user_id = %user_id, "failed to fetch notifications");
            ApiError::store("Failed to fetch notifications")
        })?;

    Ok(items)
}

/// Create a notification owned by `user_id`. The owner always comes from
/// the authenticated caller, never from the request body.
pub fn create(
    pool: &DbPool,
    user_id: Uuid,
    title: &str,
    message: &str,
    kind: &str,
) -> ApiResult<Notification> {
    let mut conn = pool.get().map_err(|e| {
        tracing::error!(error = %e, "failed to get db connection");
        ApiError::store("Failed to create notification")
    })?;

    let new_notification = NewNotification {
        user_id,
        title: title.to_string(),
        message: message.to_string(),
        kind: kind.to_string(),
    };

    let notification = diesel::insert_into(notifications::table)
        .values(&new_notification)
        .get_result::<Notification>(&mut conn)
        .map_err(|e| {
            tracing::error!(error = %e, user_id = %user_id, "failed to insert notification");
            ApiError::store("Failed to create notification")
        })?;

    tracing::debug!(
        notification_id = %notification.id,
        user_id = %user_id,
        kind = %kind,
        "notification created"
    );

    Ok(notification)
}

/// Set the read flag on a notification, but only if it belongs to the
/// caller. Authorization happens in the query itself.
pub fn set_read(
    pool: &DbPool,
    notification_id: Uuid,
    user_id: Uuid,
    read: bool,
) -> ApiResult<ReadFlagOutcome> {
    let mut conn = pool.get().map_err(|e| {
        tracing::error!(error = %e, "failed to get db connection");
        ApiError::store("Failed to update notification")
    })?;

    let result = diesel::update(
        notifications::table
            .filter(notifications::id.eq(notification_id))
            .filter(notifications::user_id.eq(user_id)),
    )
    .set(notifications::read.eq(read))
    .get_result::<Notification>(&mut conn);

    match result {
        Ok(notification) => Ok(ReadFlagOutcome::Updated(notification)),
        Err(diesel::result::Error::NotFound) => Ok(ReadFlagOutcome::NotVisible),
        Err(e) => {
            tracing::error!(error = %e, notification_id = %notification_id, "failed to update notification");
            Err(ApiError::store("Failed to update notification"))
        }
    }
}

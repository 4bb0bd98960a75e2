use diesel::prelude::*;

use folio_shared::errors::{ApiError, ApiResult};

use crate::models::{ContactMessage, NewContactMessage};
use crate::schema::contact_messages;
use crate::DbPool;

/// Persist one inbound contact message. Single best-effort write; the
/// caller retries by resubmitting the form.
pub fn create_message(pool: &DbPool, new_message: NewContactMessage) -> ApiResult<ContactMessage> {
    let mut conn = pool.get().map_err(|e| {
        tracing::error!(error = %e, "failed to get db connection");
        ApiError::store("Failed to send message")
    })?;

    let contact = diesel::insert_into(contact_messages::table)
        .values(&new_message)
        .get_result::<ContactMessage>(&mut conn)
        .map_err(|e| {
            tracing::error!(error = %e, "failed to insert contact message");
            ApiError::store("Failed to send message")
        })?;

    tracing::info!(
        contact_id = %contact.id,
        email = %contact.email,
        "contact message stored"
    );

    Ok(contact)
}

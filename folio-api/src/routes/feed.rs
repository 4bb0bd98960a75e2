// Server-Sent Events route carrying the change feed.
//
//   GET /feed?table=notifications        (bearer token required; per-user)
//   GET /feed?table=portfolio_projects   (public; table-wide)
//
// Each SSE message has:
//   event: <op>            ("INSERT" | "UPDATE" | "DELETE")
//   id:    <event_id>      (e.g. "evt_a1b2c3d4")
//   data:  <json ChangeEvent>
//
// The handler subscribes to the `FeedBus` broadcast channel and converts
// each received event into an SSE frame. Visibility filtering happens in
// the stream itself so only matching events go over the wire, in the order
// the bus delivered them.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures::stream::Stream;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use folio_shared::errors::ApiError;
use folio_shared::middleware::authenticate;
use folio_shared::types::feed::FeedTable;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub table: FeedTable,
}

/// GET /feed -- SSE stream of committed row changes.
///
/// Emits a heartbeat comment every 15 seconds to keep the connection alive
/// through proxies.
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<FeedQuery>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    // The notifications feed is scoped to its owner; the projects feed is
    // public content and deliberately unfiltered.
    let user_filter: Option<Uuid> = match query.table {
        FeedTable::Notifications => Some(authenticate(&headers)?.id),
        FeedTable::PortfolioProjects => None,
    };

    let mut rx = state.feed.subscribe();

    let user_label = user_filter
        .map(|u| u.to_string())
        .unwrap_or_else(|| "*".into());
    info!(table = %query.table, user_id = %user_label, "feed client connected");

    let table = query.table;
    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if !event.visible_to(table, user_filter) {
                        continue;
                    }

                    let json = match serde_json::to_string(&event) {
                        Ok(j) => j,
                        Err(e) => {
                            warn!("feed: failed to serialize event: {e}");
                            continue;
                        }
                    };

                    let sse_event = SseEvent::default()
                        .event(event.op.as_str())
                        .id(event.id.clone())
                        .data(json);

                    yield Ok(sse_event);
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!("feed client lagged, skipped {n} events");
                    // Tell the client it missed data so it can refetch.
                    let warning = SseEvent::default()
                        .event("_warning")
                        .data(format!("{{\"message\":\"lagged, skipped {n} events\"}}"));
                    yield Ok(warning);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    info!("feed: bus closed, ending stream");
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_query_parses() {
        let q: FeedQuery = serde_json::from_str(r#"{"table": "notifications"}"#).unwrap();
        assert_eq!(q.table, FeedTable::Notifications);

        let q: FeedQuery = serde_json::from_str(r#"{"table": "portfolio_projects"}"#).unwrap();
        assert_eq!(q.table, FeedTable::PortfolioProjects);
    }

    #[test]
    fn unknown_table_rejected() {
        let res: Result<FeedQuery, _> = serde_json::from_str(r#"{"table": "secrets"}"#);
        assert!(res.is_err());
    }
}

// Change-feed types shared by the API service and the client SDK.
//
// Every committed write to a feed-visible table is represented as a
// `ChangeEvent`. A single `FeedBus` backed by a `tokio::sync::broadcast`
// channel fans each event out to every consumer: the SSE route on the server
// side, and any in-process subscriber in tests. Broadcast preserves
// per-sender ordering, which is what gives the per-user feed its delivery
// order guarantee.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Row operation carried by a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

impl ChangeOp {
    /// Stable string used in SSE `event:` fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tables that publish to the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedTable {
    #[serde(rename = "notifications")]
    Notifications,
    #[serde(rename = "portfolio_projects")]
    PortfolioProjects,
}

impl FeedTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notifications => "notifications",
            Self::PortfolioProjects => "portfolio_projects",
        }
    }
}

impl std::fmt::Display for FeedTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully self-describing change event, ready for serialisation.
///
/// ```json
/// {
///   "id":         "evt_a1b2c3d4",
///   "table":      "notifications",
///   "op":         "INSERT",
///   "row_id":     "018f...",
///   "user_id":    "018f...",
///   "row":        { ... },
///   "created_at": "2025-06-15T14:22:33.123Z"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Globally unique event identifier (format: `evt_<uuid-v4>`).
    pub id: String,

    pub table: FeedTable,
    pub op: ChangeOp,

    /// Primary key of the affected row.
    pub row_id: Uuid,

    /// Owning user for per-user feeds (`notifications`). `None` for
    /// table-wide public feeds.
    pub user_id: Option<Uuid>,

    /// Full row as stored, for INSERT and UPDATE. Absent for DELETE.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<serde_json::Value>,

    /// ISO-8601 timestamp (UTC).
    pub created_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn inserted(
        table: FeedTable,
        row_id: Uuid,
        user_id: Option<Uuid>,
        row: serde_json::Value,
    ) -> Self {
        Self::new(table, ChangeOp::Insert, row_id, user_id, Some(row))
    }

    pub fn updated(
        table: FeedTable,
        row_id: Uuid,
        user_id: Option<Uuid>,
        row: serde_json::Value,
    ) -> Self {
        Self::new(table, ChangeOp::Update, row_id, user_id, Some(row))
    }

    pub fn deleted(table: FeedTable, row_id: Uuid, user_id: Option<Uuid>) -> Self {
        Self::new(table, ChangeOp::Delete, row_id, user_id, None)
    }

    fn new(
        table: FeedTable,
        op: ChangeOp,
        row_id: Uuid,
        user_id: Option<Uuid>,
        row: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: format!("evt_{}", Uuid::new_v4()),
            table,
            op,
            row_id,
            user_id,
            row,
            created_at: Utc::now(),
        }
    }

    /// Whether this event is visible to a subscriber of `table`, optionally
    /// restricted to one owning user.
    pub fn visible_to(&self, table: FeedTable, user_id: Option<Uuid>) -> bool {
        if self.table != table {
            return false;
        }
        match user_id {
            Some(uid) => self.user_id == Some(uid),
            None => true,
        }
    }
}

/// Broadcast-based fan-out channel for `ChangeEvent`.
///
/// Capacity is generous (1024 events); subscribers that lag further than
/// that skip events (`broadcast::RecvError::Lagged` semantics).
///
/// The bus is cheap to clone (interior `Arc`).
#[derive(Clone)]
pub struct FeedBus {
    tx: broadcast::Sender<ChangeEvent>,
}

impl FeedBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    /// Publish an event. Returns the number of active subscribers that will
    /// receive it. Silently succeeds even if there are no subscribers.
    pub fn emit(&self, event: ChangeEvent) -> usize {
        debug!(table = %event.table, op = %event.op, event_id = %event.id, "change event emitted");
        self.tx.send(event).unwrap_or(0)
    }

    /// Obtain a new receiver. Each receiver gets an independent copy of
    /// every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

impl Default for FeedBus {
    fn default() -> Self {
        Self::new()
    }
}

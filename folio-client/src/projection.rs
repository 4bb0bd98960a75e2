// Local projection of a server-owned table.
//
// The server holds the single writable copy of every row; the client holds
// a read-only cached projection reconciled through change events. The merge
// function here is pure so a scripted sequence of deltas can be replayed
// against it in tests without a network.

use serde::de::DeserializeOwned;
use uuid::Uuid;

use folio_shared::types::feed::{ChangeEvent, ChangeOp};

/// Rows that can be reconciled by primary key.
pub trait Keyed {
    fn key(&self) -> Uuid;
}

/// Where a new row lands in the cached list. Notifications show newest
/// first (head); project listings keep server order and append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    Head,
    Tail,
}

/// A typed change-feed delta, decoded from a `ChangeEvent`.
#[derive(Debug, Clone)]
pub enum Delta<T> {
    Insert(T),
    Update(T),
    Delete(Uuid),
}

impl<T: DeserializeOwned> Delta<T> {
    /// Decode the event's row payload. Returns `None` when the payload is
    /// missing or does not match `T` (the event is then dropped and logged
    /// by the caller, never partially applied).
    pub fn from_event(event: &ChangeEvent) -> Option<Self> {
        match event.op {
            ChangeOp::Insert => Self::decode_row(event).map(Delta::Insert),
            ChangeOp::Update => Self::decode_row(event).map(Delta::Update),
            ChangeOp::Delete => Some(Delta::Delete(event.row_id)),
        }
    }

    fn decode_row(event: &ChangeEvent) -> Option<T> {
        let row = event.row.as_ref()?;
        serde_json::from_value(row.clone()).ok()
    }
}

/// An ordered, id-unique cache of rows plus the merge rules for applying
/// deltas to it.
#[derive(Debug, Clone)]
pub struct Projection<T> {
    items: Vec<T>,
    insert_position: InsertPosition,
}

impl<T: Keyed + Clone> Projection<T> {
    pub fn new(insert_position: InsertPosition) -> Self {
        Self {
            items: Vec::new(),
            insert_position,
        }
    }

    /// Replace the cache with a fresh server snapshot.
    pub fn reset(&mut self, items: Vec<T>) {
        self.items = items;
    }

    /// Merge one delta. Applying the same insert or update twice leaves the
    /// cache in the same final state, which makes the fetch/event race at
    /// subscription time harmless.
    pub fn apply(&mut self, delta: Delta<T>) {
        match delta {
            Delta::Insert(row) => {
                if let Some(existing) = self.position_of(row.key()) {
                    // Already known (e.g. the initial fetch raced the feed):
                    // refresh in place instead of duplicating.
                    self.items[existing] = row;
                } else {
                    match self.insert_position {
                        InsertPosition::Head => self.items.insert(0, row),
                        InsertPosition::Tail => self.items.push(row),
                    }
                }
            }
            Delta::Update(row) => {
                if let Some(existing) = self.position_of(row.key()) {
                    self.items[existing] = row;
                }
            }
            Delta::Delete(id) => {
                self.items.retain(|item| item.key() != id);
            }
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.items.clone()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn position_of(&self, key: Uuid) -> Option<usize> {
        self.items.iter().position(|item| item.key() == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Row {
        id: Uuid,
        label: String,
    }

    impl Keyed for Row {
        fn key(&self) -> Uuid {
            self.id
        }
    }

    fn row(label: &str) -> Row {
        Row {
            id: Uuid::new_v4(),
            label: label.into(),
        }
    }

    #[test]
    fn insert_head_prepends() {
        let mut p = Projection::new(InsertPosition::Head);
        let a = row("a");
        let b = row("b");
        p.apply(Delta::Insert(a.clone()));
        p.apply(Delta::Insert(b.clone()));
        assert_eq!(p.items(), &[b, a]);
    }

    #[test]
    fn insert_tail_appends() {
        let mut p = Projection::new(InsertPosition::Tail);
        let a = row("a");
        let b = row("b");
        p.apply(Delta::Insert(a.clone()));
        p.apply(Delta::Insert(b.clone()));
        assert_eq!(p.items(), &[a, b]);
    }

    #[test]
    fn duplicate_insert_is_idempotent() {
        // A row known from the initial fetch arrives again as a feed INSERT.
        let mut p = Projection::new(InsertPosition::Head);
        let a = row("a");
        let b = row("b");
        p.reset(vec![b.clone(), a.clone()]);

        p.apply(Delta::Insert(a.clone()));
        assert_eq!(p.len(), 2);
        assert_eq!(p.items(), &[b, a]);
    }

    #[test]
    fn update_replaces_by_id() {
        let mut p = Projection::new(InsertPosition::Head);
        let a = row("a");
        p.reset(vec![a.clone()]);

        let mut a2 = a.clone();
        a2.label = "a-read".into();
        p.apply(Delta::Update(a2.clone()));
        assert_eq!(p.items(), &[a2]);
    }

    #[test]
    fn update_of_unknown_id_is_noop() {
        let mut p = Projection::new(InsertPosition::Head);
        let a = row("a");
        p.reset(vec![a.clone()]);

        p.apply(Delta::Update(row("ghost")));
        assert_eq!(p.items(), &[a]);
    }

    #[test]
    fn delete_removes_by_id() {
        let mut p = Projection::new(InsertPosition::Tail);
        let a = row("a");
        let b = row("b");
        p.reset(vec![a.clone(), b.clone()]);

        p.apply(Delta::Delete(a.id));
        assert_eq!(p.items(), &[b]);

        // Deleting again changes nothing.
        p.apply(Delta::Delete(a.id));
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn scripted_sequence_matches_server_state() {
        // Replay a feed history and check the cache equals the rows the
        // server would hold at that point.
        let mut p = Projection::new(InsertPosition::Head);
        let a = row("a");
        let b = row("b");
        let c = row("c");

        p.apply(Delta::Insert(a.clone()));
        p.apply(Delta::Insert(b.clone()));
        let mut b_read = b.clone();
        b_read.label = "b-read".into();
        p.apply(Delta::Update(b_read.clone()));
        p.apply(Delta::Insert(c.clone()));
        p.apply(Delta::Delete(a.id));

        assert_eq!(p.items(), &[c, b_read]);
    }

    #[test]
    fn delta_decoding_from_events() {
        use folio_shared::types::feed::{ChangeEvent, FeedTable};

        let a = row("a");
        let evt = ChangeEvent::inserted(
            FeedTable::Notifications,
            a.id,
            None,
            serde_json::to_value(&a).unwrap(),
        );
        match Delta::<Row>::from_event(&evt) {
            Some(Delta::Insert(decoded)) => assert_eq!(decoded, a),
            other => panic!("expected insert, got {other:?}"),
        }

        let evt = ChangeEvent::deleted(FeedTable::Notifications, a.id, None);
        match Delta::<Row>::from_event(&evt) {
            Some(Delta::Delete(id)) => assert_eq!(id, a.id),
            other => panic!("expected delete, got {other:?}"),
        }

        // Mismatched payloads decode to nothing rather than a bogus row.
        let evt = ChangeEvent::updated(
            FeedTable::Notifications,
            a.id,
            None,
            serde_json::json!({"unexpected": true}),
        );
        assert!(Delta::<Row>::from_event(&evt).is_none());
    }
}

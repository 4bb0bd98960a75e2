// Live store: the client half of the change-feed contract.
//
// A `LiveStore` owns one initial fetch and one feed subscription for the
// lifetime of the consuming view. Events that arrive before the initial
// fetch resolves are buffered and applied in arrival order afterwards;
// applying an id twice is idempotent, so the fetch/event race cannot
// duplicate or lose rows. Dropping the store aborts the feed task, which
// releases the subscription and guarantees no state update after teardown.

use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use folio_shared::types::feed::{ChangeEvent, FeedTable};

use crate::api::{ApiClient, ClientError};
use crate::models::{Notification, PortfolioProject};
use crate::projection::{Delta, InsertPosition, Keyed, Projection};

/// What a feed subscription yields next.
#[derive(Debug)]
pub enum FeedMessage {
    Event(ChangeEvent),
    /// The subscriber fell behind and `n` events were skipped; the cache
    /// may be stale until the next `refetch`.
    Lagged(u64),
    Closed,
}

/// Anything that can deliver feed messages in order: an in-process
/// broadcast receiver, or the channel fed by an SSE connection.
pub trait FeedSource: Send + 'static {
    fn next_event(&mut self) -> impl Future<Output = FeedMessage> + Send;
}

impl FeedSource for broadcast::Receiver<ChangeEvent> {
    fn next_event(&mut self) -> impl Future<Output = FeedMessage> + Send {
        async move {
            match self.recv().await {
                Ok(event) => FeedMessage::Event(event),
                Err(broadcast::error::RecvError::Lagged(n)) => FeedMessage::Lagged(n),
                Err(broadcast::error::RecvError::Closed) => FeedMessage::Closed,
            }
        }
    }
}

impl FeedSource for mpsc::UnboundedReceiver<ChangeEvent> {
    fn next_event(&mut self) -> impl Future<Output = FeedMessage> + Send {
        async move {
            match self.recv().await {
                Some(event) => FeedMessage::Event(event),
                None => FeedMessage::Closed,
            }
        }
    }
}

pub type Fetcher<T> =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Vec<T>, ClientError>> + Send + Sync>;

/// Called on every live INSERT so the UI can surface a transient alert.
pub type InsertAlert<T> = Box<dyn Fn(&T) + Send + Sync>;

struct Shared<T> {
    projection: Projection<T>,
    loading: bool,
}

/// Apply the initial fetch result, then drain events buffered while it was
/// in flight, in arrival order. A failed fetch keeps the last-known rows
/// rather than flashing an empty view.
fn settle_fetch<T: Keyed + Clone>(
    shared: &Arc<Mutex<Shared<T>>>,
    res: Result<Vec<T>, ClientError>,
    buffered: &mut Vec<Delta<T>>,
) {
    let mut state = shared.lock().unwrap();
    match res {
        Ok(items) => state.projection.reset(items),
        Err(e) => tracing::warn!(error = %e, "initial fetch failed, keeping last-known items"),
    }
    for delta in buffered.drain(..) {
        state.projection.apply(delta);
    }
    state.loading = false;
}

pub struct LiveStore<T> {
    shared: Arc<Mutex<Shared<T>>>,
    fetcher: Fetcher<T>,
    feed_task: JoinHandle<()>,
}

impl<T> LiveStore<T>
where
    T: Keyed + Clone + DeserializeOwned + Send + 'static,
{
    /// Start the initial fetch and the feed subscription concurrently.
    ///
    /// `user_filter` restricts applied events to one owner; pass `None`
    /// when the source is already filtered (the server-side SSE feed) or
    /// the table is public.
    pub fn connect<S: FeedSource>(
        table: FeedTable,
        user_filter: Option<Uuid>,
        insert_position: InsertPosition,
        fetcher: Fetcher<T>,
        source: S,
        on_insert: Option<InsertAlert<T>>,
    ) -> Self {
        let shared = Arc::new(Mutex::new(Shared {
            projection: Projection::new(insert_position),
            loading: true,
        }));

        let task_shared = shared.clone();
        let task_fetcher = fetcher.clone();
        let feed_task = tokio::spawn(async move {
            let mut source = source;
            let mut fetch = (task_fetcher)();
            let mut fetched = false;
            let mut buffered: Vec<Delta<T>> = Vec::new();

            loop {
                tokio::select! {
                    res = &mut fetch, if !fetched => {
                        fetched = true;
                        settle_fetch(&task_shared, res, &mut buffered);
                    }
                    msg = source.next_event() => match msg {
                        FeedMessage::Event(event) => {
                            if !event.visible_to(table, user_filter) {
                                continue;
                            }
                            let Some(delta) = Delta::<T>::from_event(&event) else {
                                tracing::warn!(event_id = %event.id, "undecodable change event dropped");
                                continue;
                            };
                            if let (Delta::Insert(row), Some(alert)) = (&delta, on_insert.as_ref()) {
                                alert(row);
                            }
                            if fetched {
                                task_shared.lock().unwrap().projection.apply(delta);
                            } else {
                                buffered.push(delta);
                            }
                        }
                        FeedMessage::Lagged(n) => {
                            tracing::warn!(skipped = n, "feed lagged, cache stale until refetch");
                        }
                        FeedMessage::Closed => {
                            // The feed is gone; still settle the fetch so
                            // loading clears and cached rows appear.
                            if !fetched {
                                let res = (&mut fetch).await;
                                settle_fetch(&task_shared, res, &mut buffered);
                            }
                            break;
                        }
                    }
                }
            }
        });

        Self {
            shared,
            fetcher,
            feed_task,
        }
    }

    /// Current cached rows, in reconciled order.
    pub fn snapshot(&self) -> Vec<T> {
        self.shared.lock().unwrap().projection.to_vec()
    }

    /// True until the initial fetch settles (successfully or not).
    pub fn is_loading(&self) -> bool {
        self.shared.lock().unwrap().loading
    }

    /// Manual refresh, the only recovery path after a silent feed
    /// disconnect. A failed refetch keeps the last-known rows.
    pub async fn refetch(&self) -> Result<(), ClientError> {
        let res = (self.fetcher)().await;
        let mut state = self.shared.lock().unwrap();
        state.loading = false;
        match res {
            Ok(items) => {
                state.projection.reset(items);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl LiveStore<Notification> {
    /// Notifications view: per-user rows, newest first, alert on insert.
    pub fn for_notifications<S: FeedSource>(
        api: ApiClient,
        source: S,
        on_insert: Option<InsertAlert<Notification>>,
    ) -> Self {
        let fetcher: Fetcher<Notification> = Arc::new(move || {
            let api = api.clone();
            Box::pin(async move { api.fetch_notifications().await })
        });
        Self::connect(
            FeedTable::Notifications,
            None,
            InsertPosition::Head,
            fetcher,
            source,
            on_insert,
        )
    }
}

impl LiveStore<PortfolioProject> {
    /// Public project listing: table-wide feed, server order preserved.
    pub fn for_projects<S: FeedSource>(api: ApiClient, source: S) -> Self {
        let fetcher: Fetcher<PortfolioProject> = Arc::new(move || {
            let api = api.clone();
            Box::pin(async move { api.fetch_projects().await })
        });
        Self::connect(
            FeedTable::PortfolioProjects,
            None,
            InsertPosition::Tail,
            fetcher,
            source,
            None,
        )
    }
}

impl<T> Drop for LiveStore<T> {
    fn drop(&mut self) {
        // Releases the feed subscription; a fetch resolving after this
        // cannot touch the projection.
        self.feed_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use folio_shared::types::feed::FeedBus;

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

    fn insert_event(r: &Row) -> ChangeEvent {
        ChangeEvent::inserted(
            FeedTable::Notifications,
            r.id,
            None,
            serde_json::to_value(r).unwrap(),
        )
    }

    fn ready_fetcher(items: Vec<Row>) -> Fetcher<Row> {
        Arc::new(move || {
            let items = items.clone();
            Box::pin(async move { Ok(items) })
        })
    }

    /// Fetcher that resolves only after the watch flips to true.
    fn gated_fetcher(
        items: Vec<Row>,
        gate: tokio::sync::watch::Receiver<bool>,
    ) -> Fetcher<Row> {
        Arc::new(move || {
            let items = items.clone();
            let mut gate = gate.clone();
            Box::pin(async move {
                while !*gate.borrow() {
                    gate.changed().await.expect("gate sender dropped");
                }
                Ok(items)
            })
        })
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn events_before_fetch_are_buffered_then_applied() {
        let bus = FeedBus::new();
        let (release, gate) = tokio::sync::watch::channel(false);

        let a = row("a");
        let b = row("b");
        let c = row("c");

        let store = LiveStore::connect(
            FeedTable::Notifications,
            None,
            InsertPosition::Head,
            gated_fetcher(vec![b.clone(), a.clone()], gate),
            bus.subscribe(),
            None,
        );

        // Feed events land while the fetch is still in flight. One of them
        // duplicates a row the fetch will also return.
        bus.emit(insert_event(&c));
        bus.emit(insert_event(&a));
        settle().await;

        assert!(store.is_loading());
        assert!(store.snapshot().is_empty());

        release.send(true).unwrap();
        settle().await;

        assert!(!store.is_loading());
        // c prepended, a deduplicated in place.
        assert_eq!(store.snapshot(), vec![c, b, a]);
    }

    #[tokio::test]
    async fn live_events_apply_in_delivery_order() {
        let bus = FeedBus::new();
        let a = row("a");

        let store = LiveStore::connect(
            FeedTable::Notifications,
            None,
            InsertPosition::Head,
            ready_fetcher(vec![a.clone()]),
            bus.subscribe(),
            None,
        );
        settle().await;

        let mut a_read = a.clone();
        a_read.label = "a-read".into();
        bus.emit(ChangeEvent::updated(
            FeedTable::Notifications,
            a.id,
            None,
            serde_json::to_value(&a_read).unwrap(),
        ));
        bus.emit(ChangeEvent::deleted(FeedTable::Notifications, a.id, None));
        settle().await;

        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn failed_fetch_keeps_last_known_items() {
        let bus = FeedBus::new();
        let fetcher: Fetcher<Row> = Arc::new(|| {
            Box::pin(async { Err(ClientError::MissingToken) })
        });

        let store = LiveStore::connect(
            FeedTable::Notifications,
            None,
            InsertPosition::Head,
            fetcher,
            bus.subscribe(),
            None,
        );
        settle().await;

        // Loading cleared, cache left alone (still empty here), no panic.
        assert!(!store.is_loading());
        assert!(store.snapshot().is_empty());
        assert!(store.refetch().await.is_err());
    }

    #[tokio::test]
    async fn events_for_other_tables_or_users_are_ignored() {
        let bus = FeedBus::new();
        let owner = Uuid::new_v4();
        let a = row("a");
        let foreign = row("foreign");

        let store = LiveStore::connect(
            FeedTable::Notifications,
            Some(owner),
            InsertPosition::Head,
            ready_fetcher(vec![]),
            bus.subscribe(),
            None,
        );
        settle().await;

        bus.emit(ChangeEvent::inserted(
            FeedTable::PortfolioProjects,
            a.id,
            None,
            serde_json::to_value(&a).unwrap(),
        ));
        bus.emit(ChangeEvent::inserted(
            FeedTable::Notifications,
            foreign.id,
            Some(Uuid::new_v4()),
            serde_json::to_value(&foreign).unwrap(),
        ));
        bus.emit(ChangeEvent::inserted(
            FeedTable::Notifications,
            a.id,
            Some(owner),
            serde_json::to_value(&a).unwrap(),
        ));
        settle().await;

        assert_eq!(store.snapshot(), vec![a]);
    }

    #[tokio::test]
    async fn insert_alert_fires_on_live_inserts() {
        let bus = FeedBus::new();
        let alerts = Arc::new(AtomicUsize::new(0));
        let counter = alerts.clone();

        let store = LiveStore::connect(
            FeedTable::Notifications,
            None,
            InsertPosition::Head,
            ready_fetcher(vec![]),
            bus.subscribe(),
            Some(Box::new(move |_row: &Row| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        );
        settle().await;

        bus.emit(insert_event(&row("a")));
        bus.emit(insert_event(&row("b")));
        settle().await;

        assert_eq!(alerts.load(Ordering::SeqCst), 2);
        assert_eq!(store.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn drop_releases_the_subscription() {
        let bus = FeedBus::new();
        let store = LiveStore::connect(
            FeedTable::Notifications,
            None,
            InsertPosition::Head,
            ready_fetcher(vec![]),
            bus.subscribe(),
            None,
        );
        settle().await;

        assert_eq!(bus.emit(insert_event(&row("a"))), 1);

        drop(store);
        settle().await;

        // The aborted task dropped its receiver: nobody is listening.
        assert_eq!(bus.emit(insert_event(&row("b"))), 0);
    }

    #[tokio::test]
    async fn refetch_resets_to_server_snapshot() {
        let bus = FeedBus::new();
        let a = row("a");

        let store = LiveStore::connect(
            FeedTable::Notifications,
            None,
            InsertPosition::Head,
            ready_fetcher(vec![a.clone()]),
            bus.subscribe(),
            None,
        );
        settle().await;

        bus.emit(insert_event(&row("transient")));
        settle().await;
        assert_eq!(store.snapshot().len(), 2);

        store.refetch().await.unwrap();
        assert_eq!(store.snapshot(), vec![a]);
    }
}

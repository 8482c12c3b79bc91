//! Optimistic mutations with rollback.
//!
//! [`SyncController::submit`] applies a change to the [`LocalStore`]
//! immediately, then queues the matching remote call on the collection's
//! [`CommandLane`]. The controller keeps the last value the server confirmed
//! and the changes still waiting on their remote calls. When a call
//! completes, the store is rebuilt from the confirmed value (reconciled with
//! the server's answer on success) with the remaining changes replayed on
//! top, so a failure never discards what an earlier call confirmed.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use pantry_core::DomainError;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::ApiResult;
use crate::error::SyncError;
use crate::notify::{Notifier, Severity};
use crate::store::{LocalStore, Snapshot};

type Command = Pin<Box<dyn Future<Output = ()> + Send>>;

type Replay<T> = Box<dyn Fn(&mut T) -> Result<(), DomainError> + Send>;

// =============================================================================
// Command lane
// =============================================================================

/// Runs queued futures one at a time, in submission order.
#[derive(Clone)]
pub struct CommandLane {
    inner: Arc<LaneInner>,
}

struct LaneInner {
    name: &'static str,
    tx: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CommandLane {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            inner: Arc::new(LaneInner {
                name,
                tx: Mutex::new(None),
                worker: Mutex::new(None),
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Spawn the worker task. Does nothing if it is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut tx_slot = self.inner.tx.lock();
        if tx_slot.is_some() {
            return;
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
        let name = self.inner.name;
        let handle = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                command.await;
            }
            debug!(lane = name, "Command lane drained");
        });

        *tx_slot = Some(tx);
        *self.inner.worker.lock() = Some(handle);
        debug!(lane = name, "Command lane started");
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.tx.lock().is_some()
    }

    /// Queue a command behind everything already submitted.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Closed`] if the lane is not running.
    pub fn enqueue(&self, command: Command) -> Result<(), SyncError> {
        let tx = self.inner.tx.lock();
        let sender = tx.as_ref().ok_or(SyncError::Closed(self.inner.name))?;
        sender
            .send(command)
            .map_err(|_| SyncError::Closed(self.inner.name))
    }

    /// Stop accepting commands and wait for queued ones to finish.
    pub async fn shutdown(&self) {
        // Dropping the sender lets the worker exit once the queue is empty.
        drop(self.inner.tx.lock().take());
        let handle = self.inner.worker.lock().take();
        if let Some(handle) = handle
            && let Err(err) = handle.await
        {
            warn!(lane = self.inner.name, error = %err, "Command lane worker failed");
        }
    }
}

// =============================================================================
// Pending result
// =============================================================================

/// Handle to the outcome of a submitted mutation.
///
/// The local change is already visible when this is returned. Awaiting
/// yields the server's answer; dropping it does not cancel the remote call.
#[must_use = "the remote result is lost unless awaited"]
pub struct Pending<R> {
    rx: oneshot::Receiver<Result<R, SyncError>>,
}

impl<R> Pending<R> {
    /// A handle that is already resolved.
    pub fn ready(result: Result<R, SyncError>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }
}

impl<R> Future for Pending<R> {
    type Output = Result<R, SyncError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(SyncError::Cancelled)))
    }
}

// =============================================================================
// Controller
// =============================================================================

/// Confirmed value plus the changes not yet answered by the server.
struct Ledger<T> {
    next_id: u64,
    confirmed: T,
    /// Oldest first.
    pending: VecDeque<(u64, Replay<T>)>,
}

impl<T: Clone> Ledger<T> {
    fn new(confirmed: T) -> Self {
        Self {
            next_id: 0,
            confirmed,
            pending: VecDeque::new(),
        }
    }

    /// The confirmed value with every pending change applied.
    fn replayed(&self) -> T {
        let mut value = self.confirmed.clone();
        for (id, replay) in &self.pending {
            if let Err(err) = replay(&mut value) {
                debug!(change = id, error = %err, "Pending change no longer applies");
            }
        }
        value
    }

    fn take(&mut self, id: u64) -> Option<Replay<T>> {
        let index = self.pending.iter().position(|(pending, _)| *pending == id)?;
        self.pending.remove(index).map(|(_, replay)| replay)
    }
}

/// Couples one collection's store with its command lane.
pub struct SyncController<T> {
    store: LocalStore<T>,
    lane: CommandLane,
    ledger: Arc<Mutex<Ledger<T>>>,
    notifier: Notifier,
    severity: Severity,
}

impl<T> Clone for SyncController<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            lane: self.lane.clone(),
            ledger: Arc::clone(&self.ledger),
            notifier: self.notifier.clone(),
            severity: self.severity,
        }
    }
}

impl<T: Snapshot> SyncController<T> {
    /// `severity` is used for failure notifications of this collection.
    #[must_use]
    pub fn new(store: LocalStore<T>, notifier: Notifier, severity: Severity) -> Self {
        let lane = CommandLane::new(store.key());
        Self {
            store,
            lane,
            ledger: Arc::new(Mutex::new(Ledger::new(T::default()))),
            notifier,
            severity,
        }
    }

    #[must_use]
    pub const fn store(&self) -> &LocalStore<T> {
        &self.store
    }

    #[must_use]
    pub const fn lane(&self) -> &CommandLane {
        &self.lane
    }

    /// Load the persisted snapshot and start the lane.
    pub fn start(&self) {
        let mut ledger = self.ledger.lock();
        self.store.init();
        if ledger.pending.is_empty() {
            ledger.confirmed = self.store.get();
        }
        drop(ledger);
        self.lane.start();
    }

    /// Wait for queued commands and stop the lane.
    pub async fn shutdown(&self) {
        self.lane.shutdown().await;
    }

    /// Number of changes whose remote calls have not completed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.ledger.lock().pending.len()
    }

    /// Adopt `value` as the server's copy, keeping pending changes on top.
    pub fn rebase(&self, value: T) {
        let mut ledger = self.ledger.lock();
        ledger.confirmed = value;
        self.store.replace(ledger.replayed());
    }

    /// Replace the collection and forget pending changes. Remote calls
    /// already queued still run, but their results no longer touch the
    /// store.
    pub fn reset(&self, value: T) {
        let mut ledger = self.ledger.lock();
        ledger.pending.clear();
        ledger.confirmed = value.clone();
        self.store.replace(value);
    }

    /// Empty the collection, drop its persisted snapshot and forget pending
    /// changes.
    pub fn clear(&self) {
        let mut ledger = self.ledger.lock();
        ledger.pending.clear();
        ledger.confirmed = T::default();
        self.store.clear();
    }

    /// Apply a mutation optimistically and queue its remote call.
    ///
    /// - `apply` edits a copy of the collection and returns the payload for
    ///   the remote call. If it fails nothing changes and the error is
    ///   returned immediately. It runs again whenever the collection is
    ///   rebuilt while the call is pending, so it must depend only on the
    ///   value it is given.
    /// - `remote` performs the network call.
    /// - `reconcile` maps the server's answer onto the confirmed collection
    ///   with this change applied; returning `None` keeps that value.
    ///
    /// On remote failure the change is dropped, the collection is rebuilt
    /// from the confirmed value and a notification is published.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Domain`] if `apply` rejects the change, or
    /// [`SyncError::Closed`] if the lane is not running (the change is
    /// rolled back).
    pub fn submit<P, R, Fut>(
        &self,
        action: &'static str,
        apply: impl Fn(&mut T) -> Result<P, DomainError> + Send + 'static,
        remote: impl FnOnce(P) -> Fut + Send + 'static,
        reconcile: impl FnOnce(&T, &R) -> Option<T> + Send + 'static,
    ) -> Result<Pending<R>, SyncError>
    where
        P: Send + 'static,
        R: Send + 'static,
        Fut: Future<Output = ApiResult<R>> + Send + 'static,
    {
        let mut ledger = self.ledger.lock();
        let guard = self.store.loading();
        let (_, payload) = self.store.mutate(&apply)?;

        let id = ledger.next_id;
        ledger.next_id += 1;
        let replay: Replay<T> = Box::new(move |value: &mut T| apply(value).map(drop));
        ledger.pending.push_back((id, replay));

        let (tx, rx) = oneshot::channel();
        let store = self.store.clone();
        let shared = Arc::clone(&self.ledger);
        let notifier = self.notifier.clone();
        let severity = self.severity;
        let source = self.lane.name();

        let command = Box::pin(async move {
            let _guard = guard;
            let result = remote(payload).await;

            let current = {
                let mut ledger = shared.lock();
                if let Some(replay) = ledger.take(id) {
                    if let Ok(answer) = &result {
                        let mut base = ledger.confirmed.clone();
                        if let Err(err) = replay(&mut base) {
                            debug!(collection = source, action, error = %err, "Change no longer applies to confirmed value");
                        }
                        ledger.confirmed = reconcile(&base, answer).unwrap_or(base);
                    }
                    store.replace(ledger.replayed());
                    true
                } else {
                    false
                }
            };

            let outcome = match result {
                Ok(answer) => {
                    if current {
                        info!(collection = source, action, "Remote change confirmed");
                    } else {
                        debug!(collection = source, action, "Ignoring answer for a superseded change");
                    }
                    Ok(answer)
                }
                Err(err) => {
                    if current {
                        notifier.failure(source, action, severity, &err);
                    } else {
                        debug!(collection = source, action, error = %err, "Ignoring failure of a superseded change");
                    }
                    Err(SyncError::Remote(err))
                }
            };
            // Caller may have dropped the handle.
            let _ = tx.send(outcome);
        });

        if let Err(err) = self.lane.enqueue(command) {
            ledger.take(id);
            self.store.replace(ledger.replayed());
            return Err(err);
        }
        Ok(Pending { rx })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pantry_core::{ProductId, Wishlist};

    use super::*;
    use crate::api::ApiError;
    use crate::persist::{MemoryStorage, Storage};

    fn controller() -> SyncController<Wishlist> {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::default());
        SyncController::new(
            LocalStore::new("wishlist", storage),
            Notifier::default(),
            Severity::Quiet,
        )
    }

    fn toggle(
        id: &'static str,
    ) -> impl Fn(&mut Wishlist) -> Result<bool, DomainError> + Send + 'static {
        move |w| Ok(w.toggle(ProductId::new(id)))
    }

    #[tokio::test]
    async fn test_success_reconciles() {
        let sync = controller();
        sync.start();

        let pending = sync
            .submit(
                "like",
                toggle("p1"),
                |_| async { Ok(Wishlist::from(vec![ProductId::new("p1"), ProductId::new("p9")])) },
                |_, canonical: &Wishlist| Some(canonical.clone()),
            )
            .expect("submitted");

        // Optimistic change is visible before the remote call resolves.
        assert!(sync.store().get().contains(&ProductId::new("p1")));

        let canonical = pending.await.expect("remote ok");
        assert_eq!(canonical.len(), 2);
        assert_eq!(sync.store().get(), canonical);
        assert!(!sync.store().is_loading());
    }

    #[tokio::test]
    async fn test_failure_restores_snapshot() {
        let sync = controller();
        sync.start();
        sync.reset(Wishlist::from(vec![ProductId::new("p0")]));
        let before = sync.store().get();

        let result = sync
            .submit(
                "like",
                toggle("p1"),
                |_| async { Err::<Wishlist, _>(ApiError::Timeout) },
                |_, canonical: &Wishlist| Some(canonical.clone()),
            )
            .expect("submitted")
            .await;

        assert!(matches!(result, Err(SyncError::Remote(ApiError::Timeout))));
        assert_eq!(sync.store().get(), before);
        assert!(!sync.store().is_loading());
    }

    fn like(id: &'static str) -> impl Fn(&mut Wishlist) -> Result<(), DomainError> + Send + 'static {
        move |w| {
            w.insert(ProductId::new(id));
            Ok(())
        }
    }

    fn ids(sync: &SyncController<Wishlist>) -> Vec<&'static str> {
        let value = sync.store().get();
        ["p0", "p1", "p2", "p5", "tmp-1", "addr-1"]
            .into_iter()
            .filter(|id| value.contains(&ProductId::new(*id)))
            .collect()
    }

    #[tokio::test]
    async fn test_failure_keeps_earlier_confirmed_change() {
        let sync = controller();
        sync.start();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let first = sync
            .submit(
                "save",
                like("tmp-1"),
                move |()| async move {
                    let _ = release_rx.await;
                    Ok(ProductId::new("addr-1"))
                },
                |local: &Wishlist, saved: &ProductId| {
                    let mut confirmed = local.clone();
                    confirmed.remove(&ProductId::new("tmp-1"));
                    confirmed.insert(saved.clone());
                    Some(confirmed)
                },
            )
            .expect("submitted");
        let second = sync
            .submit(
                "save",
                like("p2"),
                |()| async { Err::<(), _>(ApiError::Timeout) },
                |_, ()| None,
            )
            .expect("submitted");
        assert_eq!(ids(&sync), vec!["p2", "tmp-1"]);

        let _ = release_tx.send(());
        first.await.expect("first confirmed");
        assert!(second.await.is_err());

        assert_eq!(ids(&sync), vec!["addr-1"]);
        assert_eq!(sync.pending(), 0);
    }

    #[tokio::test]
    async fn test_answer_rebuilds_over_pending_changes() {
        let sync = controller();
        sync.start();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let first = sync
            .submit(
                "like",
                like("p1"),
                move |()| async move {
                    let _ = release_rx.await;
                    Ok(Wishlist::from(vec![ProductId::new("p1"), ProductId::new("p5")]))
                },
                |_, canonical: &Wishlist| Some(canonical.clone()),
            )
            .expect("submitted");
        let second = sync
            .submit("like", like("p2"), |()| async { Ok(()) }, |_, ()| None)
            .expect("submitted");

        let _ = release_tx.send(());
        first.await.expect("ok");
        // p2 is still waiting on its call and stays visible.
        assert_eq!(ids(&sync), vec!["p1", "p2", "p5"]);
        second.await.expect("ok");
        assert_eq!(ids(&sync), vec!["p1", "p2", "p5"]);
    }

    #[tokio::test]
    async fn test_reset_ignores_superseded_results() {
        let sync = controller();
        sync.start();
        let mut notes = sync.notifier.subscribe();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let added = sync
            .submit(
                "like",
                like("p1"),
                move |()| async move {
                    let _ = release_rx.await;
                    Ok(Wishlist::from(vec![ProductId::new("p1")]))
                },
                |_, canonical: &Wishlist| Some(canonical.clone()),
            )
            .expect("submitted");
        let failed = sync
            .submit(
                "like",
                like("p2"),
                |()| async { Err::<(), _>(ApiError::Timeout) },
                |_, ()| None,
            )
            .expect("submitted");

        sync.reset(Wishlist::from(vec![ProductId::new("p0")]));
        assert_eq!(sync.pending(), 0);
        assert_eq!(ids(&sync), vec!["p0"]);

        let _ = release_tx.send(());
        // Callers still learn the outcome.
        added.await.expect("server ok");
        assert!(failed.await.is_err());
        assert_eq!(ids(&sync), vec!["p0"]);
        assert!(notes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_clear_ignores_superseded_results() {
        let sync = controller();
        sync.start();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let pending = sync
            .submit(
                "like",
                like("p1"),
                move |()| async move {
                    let _ = release_rx.await;
                    Err::<(), _>(ApiError::Timeout)
                },
                |_, ()| None,
            )
            .expect("submitted");
        sync.clear();

        let _ = release_tx.send(());
        assert!(pending.await.is_err());
        assert!(sync.store().get().is_empty());
    }

    #[tokio::test]
    async fn test_rebase_keeps_pending_changes() {
        let sync = controller();
        sync.start();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let pending = sync
            .submit(
                "like",
                like("p1"),
                move |()| async move {
                    let _ = release_rx.await;
                    Ok(())
                },
                |_, ()| None,
            )
            .expect("submitted");

        sync.rebase(Wishlist::from(vec![ProductId::new("p5")]));
        assert_eq!(ids(&sync), vec!["p1", "p5"]);

        let _ = release_tx.send(());
        pending.await.expect("ok");
        assert_eq!(ids(&sync), vec!["p1", "p5"]);
    }

    #[tokio::test]
    async fn test_domain_error_changes_nothing() {
        let sync = controller();
        sync.start();

        let result = sync.submit(
            "remove",
            |_: &mut Wishlist| Err::<(), _>(DomainError::EmptyCart),
            |()| async { Ok(()) },
            |_, ()| None,
        );
        assert!(matches!(result, Err(SyncError::Domain(DomainError::EmptyCart))));
        assert!(sync.store().get().is_empty());
        assert!(!sync.store().is_loading());
    }

    #[tokio::test]
    async fn test_not_started_is_closed() {
        let sync = controller();
        let result = sync.submit(
            "like",
            toggle("p1"),
            |_| async { Ok(()) },
            |_, ()| None,
        );
        assert!(matches!(result, Err(SyncError::Closed("wishlist"))));
        assert!(sync.store().get().is_empty());
    }

    #[tokio::test]
    async fn test_remote_calls_run_in_submission_order() {
        let sync = controller();
        sync.start();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for (i, delay) in [30u64, 1, 10].into_iter().enumerate() {
            let log = Arc::clone(&log);
            let pending = sync
                .submit(
                    "like",
                    move |w: &mut Wishlist| {
                        w.insert(ProductId::new(format!("p{i}")));
                        Ok(i)
                    },
                    move |i| async move {
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        log.lock().push(i);
                        Ok(())
                    },
                    |_, ()| None,
                )
                .expect("submitted");
            handles.push(pending);
        }

        for pending in handles {
            pending.await.expect("remote ok");
        }
        assert_eq!(*log.lock(), vec![0, 1, 2]);
        assert_eq!(sync.store().get().len(), 3);
    }

    #[tokio::test]
    async fn test_loading_held_until_remote_resolves() {
        let sync = controller();
        sync.start();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let pending = sync
            .submit(
                "like",
                toggle("p1"),
                move |_| async move {
                    let _ = release_rx.await;
                    Ok(())
                },
                |_, ()| None,
            )
            .expect("submitted");

        assert!(sync.store().is_loading());
        let _ = release_tx.send(());
        pending.await.expect("remote ok");
        assert!(!sync.store().is_loading());
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let sync = controller();
        sync.start();
        let pending = sync
            .submit(
                "like",
                toggle("p1"),
                |_| async {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok(())
                },
                |_, ()| None,
            )
            .expect("submitted");

        sync.shutdown().await;
        assert!(!sync.lane().is_running());
        pending.await.expect("completed before shutdown returned");
    }

    #[tokio::test]
    async fn test_dropped_handle_still_runs() {
        let sync = controller();
        sync.start();
        drop(
            sync.submit(
                "like",
                toggle("p1"),
                |_| async { Err::<(), _>(ApiError::NotFound) },
                |_, ()| None,
            )
            .expect("submitted"),
        );
        sync.shutdown().await;
        // Rolled back even though nobody awaited the result.
        assert!(sync.store().get().is_empty());
    }

    #[tokio::test]
    async fn test_ready_handle() {
        let value = Pending::ready(Ok(5)).await;
        assert_eq!(value.expect("ready"), 5);
    }
}

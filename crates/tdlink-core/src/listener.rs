// ── Update fan-out ──
//
// Copy-on-write set of subscriber slots. Writers (subscribe, GC, close)
// swap in a new `Vec`; a broadcast iterates whatever snapshot it loaded,
// so a slot removed by GC stays alive until any in-flight delivery to it
// finishes. Deactivation is owned by the subscriber; removal is lazy.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use arc_swap::ArcSwap;
use futures_core::Stream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendTimeoutError, TryRecvError, TrySendError};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use tdlink_api::Update;

use crate::config::QueueFullPolicy;

struct Slot {
    tx: mpsc::Sender<Arc<Update>>,
    active: Arc<AtomicBool>,
}

impl Slot {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Result of one broadcast pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BroadcastOutcome {
    pub delivered: usize,
    /// Active subscribers whose queue stayed full.
    pub dropped: usize,
    /// At least one slot was inactive or its receiver was gone.
    pub needs_gc: bool,
}

// ── ListenerRegistry ─────────────────────────────────────────────────

/// Growable, shrinkable set of update subscribers.
pub struct ListenerRegistry {
    slots: ArcSwap<Vec<Arc<Slot>>>,
    capacity: usize,
    policy: QueueFullPolicy,
    closed: AtomicBool,
}

impl ListenerRegistry {
    pub fn new(capacity: usize, policy: QueueFullPolicy) -> Self {
        Self {
            slots: ArcSwap::from_pointee(Vec::new()),
            capacity: capacity.max(1),
            policy,
            closed: AtomicBool::new(false),
        }
    }

    /// Add a subscriber. After [`close_all`](Self::close_all) the returned
    /// listener is already closed.
    pub fn subscribe(&self) -> Listener {
        let (tx, rx) = mpsc::channel(self.capacity);
        let active = Arc::new(AtomicBool::new(true));
        let slot = Arc::new(Slot {
            tx,
            active: Arc::clone(&active),
        });

        self.slots.rcu(|slots| {
            let mut next = Vec::with_capacity(slots.len() + 1);
            next.extend(slots.iter().cloned());
            next.push(Arc::clone(&slot));
            next
        });

        // Lost a race with close_all: undo so the listener sees end-of-stream.
        if self.closed.load(Ordering::SeqCst) {
            slot.deactivate();
            self.collect_garbage();
        }
        drop(slot);

        Listener {
            updates: rx,
            active: ActiveGuard(active),
        }
    }

    /// Deliver `update` to every active subscriber, in subscription order.
    pub async fn broadcast(&self, update: Arc<Update>) -> BroadcastOutcome {
        let snapshot = self.slots.load_full();
        let mut outcome = BroadcastOutcome::default();

        for slot in snapshot.iter() {
            if !slot.is_active() {
                outcome.needs_gc = true;
                continue;
            }

            let delivered = match self.policy {
                QueueFullPolicy::Drop => match slot.tx.try_send(Arc::clone(&update)) {
                    Ok(()) => Some(true),
                    Err(TrySendError::Full(_)) => Some(false),
                    Err(TrySendError::Closed(_)) => None,
                },
                QueueFullPolicy::Wait(limit) => {
                    match slot.tx.send_timeout(Arc::clone(&update), limit).await {
                        Ok(()) => Some(true),
                        Err(SendTimeoutError::Timeout(_)) => Some(false),
                        Err(SendTimeoutError::Closed(_)) => None,
                    }
                }
            };

            match delivered {
                Some(true) => outcome.delivered += 1,
                Some(false) => {
                    outcome.dropped += 1;
                    warn!(update = update.type_name(), "listener queue full, update dropped");
                }
                None => {
                    slot.deactivate();
                    outcome.needs_gc = true;
                }
            }
        }

        outcome
    }

    /// Remove inactive slots. Returns how many were removed.
    pub fn collect_garbage(&self) -> usize {
        let previous = self
            .slots
            .rcu(|slots| slots.iter().filter(|slot| slot.is_active()).cloned().collect::<Vec<_>>());
        let removed = previous.len().saturating_sub(self.len());
        if removed > 0 {
            debug!(removed, "collected inactive listeners");
        }
        removed
    }

    /// Deactivate every subscriber and drop its sender; listeners drain
    /// what is queued and then see end-of-stream.
    pub fn close_all(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let previous = self.slots.swap(Arc::new(Vec::new()));
        for slot in previous.iter() {
            slot.deactivate();
        }
    }

    /// Number of slots currently held, active or not.
    pub fn len(&self) -> usize {
        self.slots.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.load().is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

// ── Listener ─────────────────────────────────────────────────────────

/// Marks a subscription inactive when dropped.
struct ActiveGuard(Arc<AtomicBool>);

impl ActiveGuard {
    fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.clear();
    }
}

/// A subscriber's end of the update fan-out.
///
/// Dropping the listener marks it inactive, same as [`close`](Self::close).
pub struct Listener {
    updates: mpsc::Receiver<Arc<Update>>,
    active: ActiveGuard,
}

impl Listener {
    /// Next update, or `None` once the listener is closed and drained.
    pub async fn recv(&mut self) -> Option<Arc<Update>> {
        self.updates.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Arc<Update>, TryRecvError> {
        self.updates.try_recv()
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Stop receiving. Already-queued updates can still be drained.
    pub fn close(&mut self) {
        self.active.clear();
        self.updates.close();
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> ListenerStream {
        let Listener { updates, active } = self;
        ListenerStream {
            inner: ReceiverStream::new(updates),
            _active: active,
        }
    }
}

/// `Stream` adapter over a [`Listener`]. Dropping it marks the
/// subscription inactive.
pub struct ListenerStream {
    inner: ReceiverStream<Arc<Update>>,
    _active: ActiveGuard,
}

impl Stream for ListenerStream {
    type Item = Arc<Update>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use futures_util::StreamExt;
    use serde_json::json;
    use tdlink_api::ConnectionState;

    use super::*;

    fn option(n: i64) -> Arc<Update> {
        Arc::new(Update::OptionValue {
            name: format!("opt{n}"),
            value: json!({"@type": "optionValueInteger", "value": n}),
        })
    }

    fn option_name(update: &Update) -> &str {
        match update {
            Update::OptionValue { name, .. } => name,
            other => panic!("unexpected update {other:?}"),
        }
    }

    #[tokio::test]
    async fn every_listener_sees_every_update_in_order() {
        let registry = ListenerRegistry::new(16, QueueFullPolicy::Drop);
        let mut a = registry.subscribe();
        let mut b = registry.subscribe();

        for n in 0..3 {
            let outcome = registry.broadcast(option(n)).await;
            assert_eq!(outcome.delivered, 2);
        }

        for listener in [&mut a, &mut b] {
            for n in 0..3 {
                let update = listener.recv().await.unwrap();
                assert_eq!(option_name(&update), format!("opt{n}"));
            }
        }
    }

    #[tokio::test]
    async fn closed_listener_is_skipped_then_collected() {
        let registry = ListenerRegistry::new(16, QueueFullPolicy::Drop);
        let mut kept = registry.subscribe();
        let mut gone = registry.subscribe();
        gone.close();

        let outcome = registry.broadcast(option(1)).await;
        assert_eq!(outcome.delivered, 1);
        assert!(outcome.needs_gc);
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.collect_garbage(), 1);
        assert_eq!(registry.len(), 1);
        assert!(kept.recv().await.is_some());
        assert!(gone.recv().await.is_none());
    }

    #[tokio::test]
    async fn dropped_listener_becomes_inactive() {
        let registry = ListenerRegistry::new(16, QueueFullPolicy::Drop);
        drop(registry.subscribe());

        let outcome = registry.broadcast(option(1)).await;
        assert_eq!(outcome.delivered, 0);
        assert!(outcome.needs_gc);
        assert_eq!(registry.collect_garbage(), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn full_queue_drops_for_that_listener_only() {
        let registry = ListenerRegistry::new(1, QueueFullPolicy::Drop);
        let mut slow = registry.subscribe();
        let mut fast = registry.subscribe();

        registry.broadcast(option(1)).await;
        fast.recv().await.unwrap();
        let outcome = registry.broadcast(option(2)).await;

        assert_eq!(outcome, BroadcastOutcome { delivered: 1, dropped: 1, needs_gc: false });
        assert_eq!(option_name(&slow.recv().await.unwrap()), "opt1");
        assert_eq!(option_name(&fast.recv().await.unwrap()), "opt2");
        assert!(slow.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_policy_gives_up_after_limit() {
        let registry =
            ListenerRegistry::new(1, QueueFullPolicy::Wait(Duration::from_millis(50)));
        let _stuck = registry.subscribe();

        registry.broadcast(option(1)).await;
        let started = tokio::time::Instant::now();
        let outcome = registry.broadcast(option(2)).await;

        assert_eq!(outcome.dropped, 1);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn close_all_ends_every_stream() {
        let registry = ListenerRegistry::new(16, QueueFullPolicy::Drop);
        let mut listener = registry.subscribe();
        registry
            .broadcast(Arc::new(Update::ConnectionState {
                state: ConnectionState::Ready,
            }))
            .await;

        registry.close_all();
        assert!(registry.is_closed());
        assert!(!listener.is_active());
        assert!(listener.recv().await.is_some());
        assert!(listener.recv().await.is_none());

        let mut late = registry.subscribe();
        assert!(late.recv().await.is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn stream_adapter_yields_updates() {
        let registry = ListenerRegistry::new(16, QueueFullPolicy::Drop);
        let stream = registry.subscribe().into_stream();
        registry.broadcast(option(1)).await;
        registry.broadcast(option(2)).await;
        registry.close_all();

        let names: Vec<String> = stream
            .map(|update| option_name(&update).to_owned())
            .collect()
            .await;
        assert_eq!(names, ["opt1", "opt2"]);
    }
}

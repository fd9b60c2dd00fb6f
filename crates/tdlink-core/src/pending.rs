// ── Correlation engine ──
//
// Matches tagged replies on the shared inbound stream to the call that
// issued them. Each call registers a one-shot slot under a unique tag
// before the request is submitted, so a reply can never arrive ahead of
// its slot. The slot is removed on every exit path by `PendingSlot`'s
// `Drop`, including when the awaiting future itself is dropped. A slot only
// ever removes its own entry: a caller-chosen tag may be registered again
// as soon as the previous reply has been taken out of the table.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use tdlink_api::{Message, Request};

use crate::config::TagPolicy;
use crate::error::CoreError;

// ── Tag generation ───────────────────────────────────────────────────

struct TagGenerator {
    policy: TagPolicy,
    counter: AtomicU64,
}

impl TagGenerator {
    fn new(policy: TagPolicy) -> Self {
        Self {
            policy,
            counter: AtomicU64::new(1),
        }
    }

    fn next(&self) -> String {
        match &self.policy {
            TagPolicy::Uuid => uuid::Uuid::new_v4().to_string(),
            TagPolicy::Sequential { prefix } => {
                let n = self.counter.fetch_add(1, Ordering::Relaxed);
                format!("{prefix}{n}")
            }
            TagPolicy::Custom(generate) => generate(),
        }
    }
}

// ── Correlator ───────────────────────────────────────────────────────

struct Waiting {
    generation: u64,
    sender: oneshot::Sender<Message>,
}

/// Pending-call table plus the call protocol around it.
pub struct Correlator {
    slots: DashMap<String, Waiting>,
    tags: TagGenerator,
    generations: AtomicU64,
}

impl Correlator {
    pub fn new(policy: TagPolicy) -> Self {
        Self {
            slots: DashMap::new(),
            tags: TagGenerator::new(policy),
            generations: AtomicU64::new(0),
        }
    }

    /// Generate a fresh tag from the configured policy.
    pub fn next_tag(&self) -> String {
        self.tags.next()
    }

    /// Issue `request` and wait for its reply.
    ///
    /// A request that already carries a tag keeps it; otherwise one is
    /// generated. `submit` is invoked exactly once, after the slot exists.
    /// The wait ends on the reply, on `timeout`, or when `cancel` fires.
    pub async fn call<F>(
        &self,
        mut request: Request,
        timeout: Duration,
        cancel: &CancellationToken,
        submit: F,
    ) -> Result<Message, CoreError>
    where
        F: FnOnce(&Request) -> Result<(), tdlink_api::Error>,
    {
        if cancel.is_cancelled() {
            return Err(CoreError::ClientClosed);
        }

        if request.extra().is_empty() {
            request.set_extra(self.next_tag());
        }
        let mut slot = self.register(request.extra().to_owned())?;

        submit(&request)?;
        trace!(kind = request.kind(), tag = slot.tag(), "call submitted");

        tokio::select! {
            biased;
            reply = &mut slot.receiver => reply.map_err(|_| CoreError::ClientClosed),
            () = cancel.cancelled() => Err(CoreError::ClientClosed),
            () = tokio::time::sleep(timeout) => {
                debug!(kind = request.kind(), tag = request.extra(), ?timeout, "call timed out");
                Err(CoreError::Timeout {
                    kind: request.kind().to_owned(),
                    timeout,
                })
            }
        }
    }

    /// Register a one-shot slot for `tag`.
    pub(crate) fn register(&self, tag: String) -> Result<PendingSlot<'_>, CoreError> {
        let (sender, receiver) = oneshot::channel();
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        match self.slots.entry(tag.clone()) {
            Entry::Occupied(_) => return Err(CoreError::DuplicateTag { tag }),
            Entry::Vacant(vacant) => {
                vacant.insert(Waiting { generation, sender });
            }
        }
        Ok(PendingSlot {
            owner: self,
            tag,
            generation,
            receiver,
        })
    }

    /// Deliver a tagged reply. Returns `false` if no call is waiting on it.
    pub fn resolve(&self, message: Message) -> bool {
        let Some(tag) = message.tag() else {
            return false;
        };
        let Some((_, waiting)) = self.slots.remove(tag) else {
            return false;
        };
        // The caller may have given up between removal and send.
        waiting.sender.send(message).is_ok()
    }

    /// Number of calls currently waiting.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop every slot; waiting calls fail with `ClientClosed`.
    pub fn clear(&self) {
        self.slots.clear();
    }
}

/// A registered slot. Removes itself from the table when dropped.
pub(crate) struct PendingSlot<'a> {
    owner: &'a Correlator,
    tag: String,
    generation: u64,
    receiver: oneshot::Receiver<Message>,
}

impl PendingSlot<'_> {
    pub(crate) fn tag(&self) -> &str {
        &self.tag
    }
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        let generation = self.generation;
        self.owner
            .slots
            .remove_if(&self.tag, |_, waiting| waiting.generation == generation);
    }
}

// ── Tests ────────────────────────────────────────────────────────────

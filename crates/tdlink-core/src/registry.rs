// ── Process-wide client registry ──
//
// One transport, many clients. The registry maps each engine client id
// to that client's inbound channel and routes the transport's combined
// stream accordingly. It is an explicit value the application creates and
// passes to every client it starts.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use tdlink_api::{ClientId, Message};

/// Routing table from [`ClientId`] to the owning client's inbound channel.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    routes: Arc<DashMap<ClientId, mpsc::Sender<Message>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id`. A previous route for the same id is replaced.
    pub fn add(&self, id: ClientId, inbound: mpsc::Sender<Message>) {
        if self.routes.insert(id, inbound).is_some() {
            debug!(client_id = %id, "replaced existing route");
        }
    }

    /// Unregister `id`. Returns whether it was present.
    pub fn remove(&self, id: ClientId) -> bool {
        self.routes.remove(&id).is_some()
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.routes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Deliver one message to the client it names. Never waits.
    ///
    /// Messages without a client id, or for an unknown client, are dropped.
    /// A client whose inbound channel is full loses the message so the other
    /// clients keep receiving theirs. A route whose receiver is gone is
    /// removed.
    pub fn route(&self, message: Message) -> bool {
        let Some(id) = message.client_id() else {
            debug!(kind = message.kind(), "dropping message without client id");
            return false;
        };

        let Some(inbound) = self.routes.get(&id).map(|entry| entry.value().clone()) else {
            debug!(client_id = %id, kind = message.kind(), "dropping message for unknown client");
            return false;
        };

        match inbound.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                warn!(
                    client_id = %id,
                    kind = message.kind(),
                    "client inbound full, dropping message"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(client_id = %id, "client inbound closed, removing route");
                self.routes.remove_if(&id, |_, current| current.same_channel(&inbound));
                false
            }
        }
    }

    /// Route every message from `inbound` until it closes, then drop all
    /// routes so each client's dispatch loop sees end-of-stream.
    pub fn spawn_router(&self, mut inbound: mpsc::Receiver<Message>) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                registry.route(message);
            }
            debug!(clients = registry.len(), "transport stream closed");
            registry.routes.clear();
        })
    }
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("clients", &self.routes.len())
            .finish()
    }
}

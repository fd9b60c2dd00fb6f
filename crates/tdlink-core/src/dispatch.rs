// ── Dispatch loop ──
//
// Sole consumer of a client's inbound channel. Tagged messages are replies
// and go to the correlator only; untagged ones are decoded as updates and
// fanned out. Nothing that arrives on the stream can end the loop; it runs
// until every sender is gone.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use tdlink_api::{ClientId, Message, Update};

use crate::listener::ListenerRegistry;
use crate::pending::Correlator;

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Routed {
    Reply,
    UnmatchedReply,
    Broadcast { delivered: usize },
    Undecodable,
}

pub(crate) async fn dispatch_loop(
    client_id: ClientId,
    mut inbound: mpsc::Receiver<Message>,
    correlator: Arc<Correlator>,
    listeners: Arc<ListenerRegistry>,
) {
    debug!(%client_id, "dispatch loop started");

    while let Some(message) = inbound.recv().await {
        if let Routed::Broadcast { delivered: 0 } = route(message, &correlator, &listeners).await {
            trace!(%client_id, "update had no listeners");
        }
    }

    listeners.close_all();
    correlator.clear();
    debug!(%client_id, "dispatch loop finished");
}

pub(crate) async fn route(
    message: Message,
    correlator: &Correlator,
    listeners: &ListenerRegistry,
) -> Routed {
    if let Some(tag) = message.tag() {
        let tag = tag.to_owned();
        return if correlator.resolve(message) {
            Routed::Reply
        } else {
            debug!(%tag, "no pending call for reply");
            Routed::UnmatchedReply
        };
    }

    let update = match message.decode::<Update>() {
        Ok(update) => update,
        Err(err) => {
            trace!(kind = message.kind(), error = %err, "dropping undecodable message");
            return Routed::Undecodable;
        }
    };

    let outcome = listeners.broadcast(Arc::new(update)).await;
    if outcome.needs_gc {
        listeners.collect_garbage();
    }
    Routed::Broadcast {
        delivered: outcome.delivered,
    }
}

// Scripted in-process engine shared by the integration tests.
#![allow(clippy::unwrap_used, dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc;

use tdlink_api::{AuthorizationState, ClientId, Message, Request, Transport};
use tdlink_core::{AuthorizerConfig, ClientConfig, ClientRegistry};

pub type Responder = Box<dyn Fn(ClientId, &Request) -> Option<Value> + Send + Sync>;

// ── MockEngine ──────────────────────────────────────────────────────

/// Records every submission and answers through an optional responder.
/// Replies and pushed updates go through the same channel a real
/// transport would feed.
pub struct MockEngine {
    inbound: mpsc::Sender<Message>,
    submissions: Mutex<Vec<(ClientId, Request)>>,
    responder: Option<Responder>,
    next_id: AtomicI32,
}

impl MockEngine {
    pub fn submissions(&self) -> Vec<Request> {
        self.submissions
            .lock()
            .unwrap()
            .iter()
            .map(|(_, request)| request.clone())
            .collect()
    }

    /// Kinds of all submissions, in order, skipping state polls.
    pub fn actions(&self) -> Vec<String> {
        self.submissions()
            .iter()
            .map(|request| request.kind().to_owned())
            .filter(|kind| kind != "getAuthorizationState")
            .collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.submissions()
            .iter()
            .filter(|request| request.kind() == kind)
            .count()
    }

    /// Wait (yielding) until at least `n` requests have been submitted.
    pub async fn wait_for(&self, n: usize) -> Vec<Request> {
        loop {
            let submitted = self.submissions();
            if submitted.len() >= n {
                return submitted;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    pub fn reply(&self, client_id: ClientId, tag: &str, payload: Value) {
        self.inbound
            .try_send(Message::new(Some(client_id), Some(tag.to_owned()), payload))
            .unwrap();
    }

    pub fn push_update(&self, client_id: ClientId, payload: Value) {
        self.inbound
            .try_send(Message::new(Some(client_id), None, payload))
            .unwrap();
    }
}

impl Transport for MockEngine {
    fn create_client_id(&self) -> ClientId {
        ClientId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn submit(&self, client_id: ClientId, request: &Request) -> Result<(), tdlink_api::Error> {
        self.submissions
            .lock()
            .unwrap()
            .push((client_id, request.clone()));

        if let Some(payload) = self.responder.as_ref().and_then(|r| r(client_id, request)) {
            self.reply(client_id, request.extra(), payload);
        }
        Ok(())
    }
}

// ── Harness ─────────────────────────────────────────────────────────

pub struct Harness {
    pub engine: Arc<MockEngine>,
    pub registry: ClientRegistry,
}

/// An engine that never answers on its own.
pub fn silent() -> Harness {
    build(None)
}

pub fn responding<F>(responder: F) -> Harness
where
    F: Fn(ClientId, &Request) -> Option<Value> + Send + Sync + 'static,
{
    build(Some(Box::new(responder)))
}

fn build(responder: Option<Responder>) -> Harness {
    let (tx, rx) = mpsc::channel(4096);
    let registry = ClientRegistry::new();
    registry.spawn_router(rx);
    Harness {
        engine: Arc::new(MockEngine {
            inbound: tx,
            submissions: Mutex::new(Vec::new()),
            responder,
            next_id: AtomicI32::new(1),
        }),
        registry,
    }
}

pub fn ok() -> Value {
    json!({"@type": "ok"})
}

pub fn engine_error(code: i32, message: &str) -> Value {
    json!({"@type": "error", "code": code, "message": message})
}

// ── Authorization script ────────────────────────────────────────────

/// Authorization state machine of a fake engine.
///
/// The front of `states` is the current state. Any corrective request
/// advances to the next scripted state; `close` moves to `closing`, and
/// the poll after that reports `closed`.
pub struct AuthScript {
    states: Mutex<VecDeque<AuthorizationState>>,
    reject: Option<&'static str>,
}

impl AuthScript {
    pub fn new(states: impl IntoIterator<Item = AuthorizationState>) -> Arc<Self> {
        Arc::new(Self {
            states: Mutex::new(states.into_iter().collect()),
            reject: None,
        })
    }

    /// Answer `kind` with an engine error instead of `ok`.
    pub fn rejecting(
        states: impl IntoIterator<Item = AuthorizationState>,
        kind: &'static str,
    ) -> Arc<Self> {
        Arc::new(Self {
            states: Mutex::new(states.into_iter().collect()),
            reject: Some(kind),
        })
    }

    pub fn current(&self) -> AuthorizationState {
        self.states
            .lock()
            .unwrap()
            .front()
            .cloned()
            .unwrap_or(AuthorizationState::Closed)
    }

    pub fn respond(&self, request: &Request) -> Option<Value> {
        if self.reject == Some(request.kind()) {
            return Some(engine_error(400, "REJECTED"));
        }

        let mut states = self.states.lock().unwrap();
        match request.kind() {
            "getAuthorizationState" => {
                let current = states
                    .front()
                    .cloned()
                    .unwrap_or(AuthorizationState::Closed);
                if current == AuthorizationState::Closing {
                    *states = VecDeque::from([AuthorizationState::Closed]);
                }
                Some(serde_json::to_value(current).unwrap())
            }
            "close" => {
                *states = VecDeque::from([AuthorizationState::Closing]);
                Some(ok())
            }
            "setLogVerbosityLevel" | "addProxy" => Some(ok()),
            _ => {
                if states.len() > 1 {
                    states.pop_front();
                }
                Some(ok())
            }
        }
    }
}

pub fn scripted(script: &Arc<AuthScript>) -> Harness {
    let script = Arc::clone(script);
    responding(move |_, request| script.respond(request))
}

pub fn bot_login_path() -> Vec<AuthorizationState> {
    vec![
        AuthorizationState::WaitTdlibParameters,
        AuthorizationState::WaitEncryptionKey { is_encrypted: false },
        AuthorizationState::WaitPhoneNumber,
        AuthorizationState::Ready,
    ]
}

/// Default timings with a short settle delay.
pub fn auth_config() -> ClientConfig {
    ClientConfig {
        authorizer: AuthorizerConfig {
            settle_delay: Duration::from_millis(200),
            ..AuthorizerConfig::default()
        },
        ..ClientConfig::default()
    }
}

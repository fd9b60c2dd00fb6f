// ── Client facade ──
//
// Owns one correlator, one listener registry, and one dispatch task for a
// single engine client id. Cheaply cloneable; the last clone dropping
// cancels the client and removes its route.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tdlink_api::methods::{self, AddProxy, SetLogVerbosityLevel};
use tdlink_api::{AuthorizationState, ClientId, EngineError, Message, Method, Request, Transport};

use crate::auth::{AuthorizationHandler, authorize};
use crate::config::ClientConfig;
use crate::dispatch::dispatch_loop;
use crate::error::{AuthError, CoreError};
use crate::listener::{Listener, ListenerRegistry};
use crate::pending::Correlator;
use crate::registry::ClientRegistry;

/// Handle to one engine client.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    id: ClientId,
    transport: Arc<dyn Transport>,
    registry: ClientRegistry,
    config: ClientConfig,
    correlator: Arc<Correlator>,
    listeners: Arc<ListenerRegistry>,
    cancel: CancellationToken,
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    // ── Construction ─────────────────────────────────────────────────

    /// Allocate a client id, register it, and start the dispatch loop.
    ///
    /// Configured startup requests (log verbosity, proxy) are sent once the
    /// loop is running; their failures are logged, not returned.
    pub async fn start(
        transport: Arc<dyn Transport>,
        registry: &ClientRegistry,
        config: ClientConfig,
    ) -> Self {
        let id = transport.create_client_id();
        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity.max(1));
        registry.add(id, inbound_tx);

        let correlator = Arc::new(Correlator::new(config.tags.clone()));
        let listeners = Arc::new(ListenerRegistry::new(
            config.listener_capacity,
            config.queue_full,
        ));
        let dispatch = tokio::spawn(dispatch_loop(
            id,
            inbound_rx,
            Arc::clone(&correlator),
            Arc::clone(&listeners),
        ));

        let client = Self {
            inner: Arc::new(ClientInner {
                id,
                transport,
                registry: registry.clone(),
                config,
                correlator,
                listeners,
                cancel: CancellationToken::new(),
                dispatch: Mutex::new(Some(dispatch)),
            }),
        };

        client.apply_startup_options().await;
        info!(client_id = %id, "client started");
        client
    }

    /// Start a client and authorize it before returning.
    ///
    /// On failure the error is reported to `handler.error`, the client is
    /// shut down, and the error is returned.
    pub async fn new<H: AuthorizationHandler>(
        transport: Arc<dyn Transport>,
        registry: &ClientRegistry,
        config: ClientConfig,
        handler: &H,
    ) -> Result<Self, AuthError> {
        let client = Self::start(transport, registry, config).await;
        let authorizer = client.inner.config.authorizer.clone();

        match authorize(&client, handler, &authorizer).await {
            Ok(()) => Ok(client),
            Err(err) => {
                handler.error(&err);
                client.shutdown().await;
                Err(err)
            }
        }
    }

    /// Start a client and authorize it in the background.
    ///
    /// Returns as soon as the client is running. Authorization failures go
    /// only to `handler.error`; the client is not shut down for them.
    pub async fn new_async<H: AuthorizationHandler + 'static>(
        transport: Arc<dyn Transport>,
        registry: &ClientRegistry,
        config: ClientConfig,
        handler: Arc<H>,
    ) -> Self {
        let client = Self::start(transport, registry, config).await;
        let background = client.clone();

        tokio::spawn(async move {
            let authorizer = background.inner.config.authorizer.clone();
            if let Err(err) = authorize(&background, handler.as_ref(), &authorizer).await {
                handler.error(&err);
            }
        });

        client
    }

    async fn apply_startup_options(&self) {
        if let Some(level) = self.inner.config.log_verbosity {
            let method = SetLogVerbosityLevel {
                new_verbosity_level: level,
            };
            if let Err(e) = self.execute(&method).await {
                warn!(client_id = %self.inner.id, error = %e, "failed to set engine log verbosity");
            }
        }

        if let Some(proxy) = self.inner.config.proxy.clone() {
            let server = proxy.server.clone();
            if let Err(e) = self.execute::<AddProxy>(&proxy).await {
                warn!(client_id = %self.inner.id, %server, error = %e, "failed to add proxy");
            }
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn id(&self) -> ClientId {
        self.inner.id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Number of calls waiting for a reply.
    pub fn pending_calls(&self) -> usize {
        self.inner.correlator.len()
    }

    /// Number of listener slots held, including inactive ones not yet collected.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    // ── Calls ────────────────────────────────────────────────────────

    /// Send `request` and wait for its reply, up to the configured timeout.
    ///
    /// An engine `error` reply is returned as a message; use
    /// [`execute`](Self::execute) for typed results with error mapping.
    pub async fn call(&self, request: Request) -> Result<Message, CoreError> {
        self.call_with_timeout(request, self.inner.config.call_timeout)
            .await
    }

    pub async fn call_with_timeout(
        &self,
        request: Request,
        timeout: Duration,
    ) -> Result<Message, CoreError> {
        let inner = &self.inner;
        inner
            .correlator
            .call(request, timeout, &inner.cancel, |request| {
                inner.transport.submit(inner.id, request)
            })
            .await
    }

    /// Call a typed method and decode its result.
    pub async fn execute<M: Method>(&self, method: &M) -> Result<M::Output, CoreError> {
        let reply = self.call(Request::from_method(method)?).await?;

        if reply.is_error() {
            let err: EngineError = reply
                .decode()
                .map_err(|e| unexpected(M::TYPE, &reply, &e))?;
            return Err(err.into());
        }

        reply
            .decode::<M::Output>()
            .map_err(|e| unexpected(M::TYPE, &reply, &e))
    }

    pub async fn authorization_state(&self) -> Result<AuthorizationState, CoreError> {
        self.execute(&methods::GetAuthorizationState {}).await
    }

    // ── Updates ──────────────────────────────────────────────────────

    /// Subscribe to updates. After shutdown the listener is already closed.
    pub fn listener(&self) -> Listener {
        self.inner.listeners.subscribe()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Ask the engine to close this client instance. The engine walks
    /// through `closing` to `closed`; local resources stay up.
    pub async fn close(&self) -> Result<(), CoreError> {
        self.execute(&methods::Close {}).await.map(|_| ())
    }

    /// Send `close` without waiting for the engine's answer. The reply, when
    /// it comes, is tagged and dropped as unmatched.
    pub fn request_close(&self) -> Result<(), CoreError> {
        self.submit(Request::from_method(&methods::Close {})?)
    }

    /// Submit `request` without registering a pending call.
    ///
    /// An untagged request gets a generated tag so its reply is never
    /// mistaken for an update.
    pub fn submit(&self, mut request: Request) -> Result<(), CoreError> {
        let inner = &self.inner;
        if inner.cancel.is_cancelled() {
            return Err(CoreError::ClientClosed);
        }
        if request.extra().is_empty() {
            request.set_extra(inner.correlator.next_tag());
        }
        inner.transport.submit(inner.id, &request)?;
        Ok(())
    }

    /// Ask the engine to close this instance and delete its data.
    pub async fn destroy(&self) -> Result<(), CoreError> {
        self.execute(&methods::Destroy {}).await.map(|_| ())
    }

    /// Log out; the engine then closes the instance.
    pub async fn log_out(&self) -> Result<(), CoreError> {
        self.execute(&methods::LogOut {}).await.map(|_| ())
    }

    /// Release local resources.
    ///
    /// Marks the client closed (new and waiting calls fail with
    /// [`CoreError::ClientClosed`]), removes its route so the inbound
    /// channel closes, then waits for the dispatch loop to drain. The loop
    /// closes every listener and releases the pending table on exit.
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        inner.cancel.cancel();
        inner.registry.remove(inner.id);

        let Some(dispatch) = inner.dispatch.lock().await.take() else {
            return;
        };
        if let Err(e) = dispatch.await {
            warn!(client_id = %inner.id, error = %e, "dispatch task failed");
        }
        info!(client_id = %inner.id, "client shut down");
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.inner.id)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.cancel.cancel();
        if self.registry.remove(self.id) {
            debug!(client_id = %self.id, "client dropped without shutdown");
        }
    }
}

fn unexpected(request: &str, reply: &Message, err: &tdlink_api::Error) -> CoreError {
    CoreError::UnexpectedResponse {
        request: request.to_owned(),
        got: reply.kind().unwrap_or("<untyped>").to_owned(),
        message: err.to_string(),
    }
}

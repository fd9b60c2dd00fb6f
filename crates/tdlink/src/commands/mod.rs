//! Command handlers and the shared bridge connection.

pub mod call;
pub mod config_cmd;
pub mod listen;
pub mod login;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use tdlink_api::{AuthorizationState, Request, StdioTransport, Update};
use tdlink_core::{BotAuthorizer, Client, ClientRegistry, InteractiveAuthorizer, run_interactor};

use crate::cli::{AuthArgs, GlobalOpts};
use crate::config::Session;
use crate::error::CliError;

use self::login::TerminalPrompter;

const INBOUND_CAPACITY: usize = 1024;
const CLOSE_WAIT: Duration = Duration::from_secs(5);
const ROUTER_WAIT: Duration = Duration::from_secs(2);

/// Token cancelled on the first Ctrl-C.
pub fn interrupt_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received");
            trigger.cancel();
        }
    });
    token
}

/// A bridge process, its inbound router, and one client on top.
pub struct Connection {
    pub client: Client,
    transport: Arc<StdioTransport>,
    router: JoinHandle<()>,
}

impl Connection {
    /// Start the bridge and a client without authorizing it.
    pub async fn open(session: &Session, global: &GlobalOpts) -> Result<Self, CliError> {
        let (transport, registry, router) = spawn_bridge(session, global)?;
        let config = session.client_config(global)?;
        let client = Client::start(transport.clone(), &registry, config).await;
        Ok(Self {
            client,
            transport,
            router,
        })
    }

    /// Start the bridge and authorize a client for the selected profile.
    ///
    /// Uses the bot strategy when a token is available, otherwise prompts
    /// on the terminal. `interrupt` aborts authorization.
    pub async fn authorized(
        session: &Session,
        global: &GlobalOpts,
        auth: &AuthArgs,
        interrupt: &CancellationToken,
    ) -> Result<Self, CliError> {
        let parameters = session.parameters()?;
        let config = session.client_config(global)?;
        let (transport, registry, router) = spawn_bridge(session, global)?;

        let authorized = if let Some(token) = session.bot_token(auth) {
            let handler = BotAuthorizer::new(parameters, token).with_cancellation(interrupt.clone());
            Client::new(transport.clone(), &registry, config, &handler)
                .await
                .map_err(CliError::from)
        } else {
            let (handler, operator) = InteractiveAuthorizer::new(parameters);
            let handler = handler.with_cancellation(interrupt.clone());
            let interactor = tokio::spawn(run_interactor(operator, TerminalPrompter));

            let result = Client::new(transport.clone(), &registry, config, &handler).await;
            match result {
                Ok(client) => {
                    interactor.abort();
                    Ok(client)
                }
                // A prompt failure explains the login failure better than
                // the closed operator channel it causes.
                Err(err) if interactor.is_finished() => match interactor.await {
                    Ok(Err(prompt_err)) => Err(prompt_err.into()),
                    _ => Err(err.into()),
                },
                Err(err) => {
                    interactor.abort();
                    Err(err.into())
                }
            }
        };

        match authorized {
            Ok(client) => Ok(Self {
                client,
                transport,
                router,
            }),
            Err(err) => {
                transport.shutdown();
                Err(err)
            }
        }
    }

    /// Ask the engine to close, give it a moment to report `closed`, then
    /// tear everything down.
    pub async fn finish(self) {
        if !self.client.is_shut_down() {
            let mut listener = self.client.listener();
            // Raw call: only a real `ok` means a `closed` update will follow.
            match self.client.call(Request::new("close")).await {
                Ok(reply) if reply.kind() == Some("ok") => {
                    let closed = tokio::time::timeout(CLOSE_WAIT, async {
                        while let Some(update) = listener.recv().await {
                            if let Update::AuthorizationState {
                                authorization_state: AuthorizationState::Closed,
                            } = *update
                            {
                                break;
                            }
                        }
                    })
                    .await;
                    if closed.is_err() {
                        debug!("engine did not report closed in time");
                    }
                }
                Ok(reply) => debug!(kind = ?reply.kind(), "unexpected reply to close"),
                Err(e) => debug!(error = %e, "engine close failed"),
            }
        }

        self.client.shutdown().await;
        self.transport.shutdown();
        if tokio::time::timeout(ROUTER_WAIT, self.router).await.is_err() {
            debug!("router still running at exit");
        }
    }
}

fn spawn_bridge(
    session: &Session,
    global: &GlobalOpts,
) -> Result<(Arc<StdioTransport>, ClientRegistry, JoinHandle<()>), CliError> {
    let (program, args) = session.bridge(global);
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
    let transport = StdioTransport::spawn(&program, &args, inbound_tx, CancellationToken::new())?;

    let registry = ClientRegistry::new();
    let router = registry.spawn_router(inbound_rx);
    Ok((Arc::new(transport), registry, router))
}

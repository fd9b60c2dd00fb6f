//! Authorization state machine.
//!
//! [`authorize`] polls the engine's authorization state and hands each
//! observed state to an [`AuthorizationHandler`], which issues whatever
//! corrective call that state needs. The loop ends when the engine is
//! ready, when it reaches `closed`, or when the handler's cancellation
//! token fires.
//!
//! Two strategies are bundled: [`InteractiveAuthorizer`] (phone number,
//! code, and password supplied by an operator through an [`Operator`])
//! and [`BotAuthorizer`] (a pre-supplied bot token).

mod bot;
mod interactive;
mod interactor;

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tdlink_api::AuthorizationState;

use crate::client::Client;
use crate::config::AuthorizerConfig;
use crate::error::AuthError;

pub use bot::BotAuthorizer;
pub use interactive::{InteractiveAuthorizer, Operator};
pub use interactor::{Prompter, run_interactor};

/// Strategy plugged into [`authorize`].
pub trait AuthorizationHandler: Send + Sync {
    /// Token that aborts the authorization loop when cancelled.
    fn cancellation(&self) -> CancellationToken;

    /// Perform the corrective action for `state`, if any.
    fn handle(
        &self,
        client: &Client,
        state: &AuthorizationState,
    ) -> impl Future<Output = Result<(), AuthError>> + Send;

    /// Error sink. Receives failures of background authorization.
    fn error(&self, err: &AuthError) {
        tracing::error!(error = %err, "authorization failed");
    }

    /// Called once when [`authorize`] returns, whatever the outcome.
    fn close(&self) {}
}

struct CloseOnDrop<'a, H: AuthorizationHandler>(&'a H);

impl<H: AuthorizationHandler> Drop for CloseOnDrop<'_, H> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Drive `client` to the ready state using `handler`.
///
/// A handler error is remembered (the first one wins), the engine is asked
/// to close, and polling continues without the handler until the engine
/// reports `closed`; the remembered error is then returned. Cancellation
/// interrupts any step of a tick, including a handler waiting on input.
pub async fn authorize<H: AuthorizationHandler>(
    client: &Client,
    handler: &H,
    config: &AuthorizerConfig,
) -> Result<(), AuthError> {
    let _close = CloseOnDrop(handler);
    let cancel = handler.cancellation();

    let deadline = async {
        match config.deadline {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut failure: Option<AuthError> = None;

    loop {
        let consult_handler = failure.is_none();
        let tick = async {
            tokio::time::sleep(config.poll_interval).await;
            let state = client.authorization_state().await?;
            let handled = if consult_handler {
                handler.handle(client, &state).await
            } else {
                Ok(())
            };
            Ok::<_, AuthError>((state, handled))
        };

        let (state, handled) = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!(client_id = %client.id(), "authorization cancelled");
                tear_down(client);
                return Err(AuthError::Cancelled);
            }
            () = &mut deadline => {
                info!(client_id = %client.id(), "authorization deadline passed");
                tear_down(client);
                return Err(AuthError::Cancelled);
            }
            tick = tick => tick?,
        };

        if let Err(err) = handled {
            if failure.is_none() {
                warn!(client_id = %client.id(), %state, error = %err, "authorization step failed, closing");
                tear_down(client);
                failure = Some(err);
            }
        }

        match state {
            AuthorizationState::Closed => {
                return Err(failure.unwrap_or(AuthError::Closed));
            }
            AuthorizationState::Ready if failure.is_none() => {
                debug!(client_id = %client.id(), delay = ?config.settle_delay, "authorized, settling");
                tokio::time::sleep(config.settle_delay).await;
                info!(client_id = %client.id(), "authorized");
                return Ok(());
            }
            _ => {}
        }
    }
}

/// Ask the engine to close. Never waits for the reply: an engine that is
/// not answering must not hold up cancellation.
fn tear_down(client: &Client) {
    if let Err(e) = client.request_close() {
        warn!(client_id = %client.id(), error = %e, "close request failed");
    }
}

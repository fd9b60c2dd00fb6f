// Operator loop for the interactive strategy.

use std::future::Future;

use secrecy::SecretString;
use tracing::debug;

use tdlink_api::AuthorizationState;

use super::Operator;
use crate::error::AuthError;

/// Source of the data an interactive login asks for (a terminal, a UI, a
/// test script).
pub trait Prompter: Send {
    fn phone_number(&mut self) -> impl Future<Output = Result<SecretString, AuthError>> + Send;

    fn code(&mut self) -> impl Future<Output = Result<SecretString, AuthError>> + Send;

    fn password(
        &mut self,
        hint: &str,
    ) -> impl Future<Output = Result<SecretString, AuthError>> + Send;
}

/// Answer the states published by an
/// [`InteractiveAuthorizer`](super::InteractiveAuthorizer) until the engine
/// is ready, an unsupported state shows up, or the state stream ends.
///
/// Every published wait state is answered, repeats included: the authorizer
/// publishes once per poll and then waits for exactly one datum.
pub async fn run_interactor<P: Prompter>(
    mut operator: Operator,
    mut prompter: P,
) -> Result<(), AuthError> {
    while let Some(state) = operator.states.recv().await {
        match &state {
            AuthorizationState::WaitPhoneNumber => {
                let phone_number = prompter.phone_number().await?;
                send(&operator.phone_number, phone_number).await?;
            }
            AuthorizationState::WaitCode { .. } => {
                let code = prompter.code().await?;
                send(&operator.code, code).await?;
            }
            AuthorizationState::WaitPassword { password_hint } => {
                let password = prompter.password(password_hint).await?;
                send(&operator.password, password).await?;
            }
            AuthorizationState::Ready
            | AuthorizationState::WaitEmailAddress
            | AuthorizationState::WaitEmailCode
            | AuthorizationState::WaitOtherDeviceConfirmation { .. }
            | AuthorizationState::WaitRegistration => {
                debug!(%state, "interactor done");
                return Ok(());
            }
            _ => {}
        }
    }

    Ok(())
}

async fn send(
    channel: &tokio::sync::mpsc::Sender<SecretString>,
    value: SecretString,
) -> Result<(), AuthError> {
    channel
        .send(value)
        .await
        .map_err(|_| AuthError::Interaction("authorizer stopped listening".into()))
}

// Interactive (user account) authorization strategy.

use std::sync::Mutex;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use tdlink_api::methods::{
    CheckAuthenticationCode, CheckAuthenticationPassword, CheckDatabaseEncryptionKey,
    SetAuthenticationPhoneNumber, SetTdlibParameters,
};
use tdlink_api::types::PhoneNumberAuthenticationSettings;
use tdlink_api::{AuthorizationState, TdlibParameters};

use super::AuthorizationHandler;
use crate::client::Client;
use crate::error::AuthError;

const STATE_BUFFER: usize = 10;

/// Operator side of an [`InteractiveAuthorizer`].
///
/// Observed states arrive on `states`; the phone number, code, and
/// password are sent back on the matching channel when the engine asks for
/// them.
pub struct Operator {
    pub states: mpsc::Receiver<AuthorizationState>,
    pub phone_number: mpsc::Sender<SecretString>,
    pub code: mpsc::Sender<SecretString>,
    pub password: mpsc::Sender<SecretString>,
}

/// Strategy for user accounts. Each datum the engine asks for is read from
/// the operator; the handler waits until it arrives.
pub struct InteractiveAuthorizer {
    parameters: TdlibParameters,
    states: Mutex<Option<mpsc::Sender<AuthorizationState>>>,
    phone_number: AsyncMutex<mpsc::Receiver<SecretString>>,
    code: AsyncMutex<mpsc::Receiver<SecretString>>,
    password: AsyncMutex<mpsc::Receiver<SecretString>>,
    cancel: CancellationToken,
}

impl InteractiveAuthorizer {
    pub fn new(parameters: TdlibParameters) -> (Self, Operator) {
        let (states_tx, states_rx) = mpsc::channel(STATE_BUFFER);
        let (phone_tx, phone_rx) = mpsc::channel(1);
        let (code_tx, code_rx) = mpsc::channel(1);
        let (password_tx, password_rx) = mpsc::channel(1);

        let authorizer = Self {
            parameters,
            states: Mutex::new(Some(states_tx)),
            phone_number: AsyncMutex::new(phone_rx),
            code: AsyncMutex::new(code_rx),
            password: AsyncMutex::new(password_rx),
            cancel: CancellationToken::new(),
        };
        let operator = Operator {
            states: states_rx,
            phone_number: phone_tx,
            code: code_tx,
            password: password_tx,
        };
        (authorizer, operator)
    }

    /// Use `cancel` instead of a private token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn publish(&self, state: &AuthorizationState) {
        let Ok(guard) = self.states.lock() else {
            return;
        };
        if let Some(states) = guard.as_ref() {
            if states.try_send(state.clone()).is_err() {
                debug!(%state, "state not published, operator not keeping up");
            }
        }
    }
}

async fn read(
    source: &AsyncMutex<mpsc::Receiver<SecretString>>,
    what: &str,
) -> Result<SecretString, AuthError> {
    source
        .lock()
        .await
        .recv()
        .await
        .ok_or_else(|| AuthError::Interaction(format!("{what} channel closed")))
}

impl AuthorizationHandler for InteractiveAuthorizer {
    fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn handle(&self, client: &Client, state: &AuthorizationState) -> Result<(), AuthError> {
        self.publish(state);

        match state {
            AuthorizationState::WaitTdlibParameters => {
                client
                    .execute(&SetTdlibParameters {
                        parameters: self.parameters.clone(),
                    })
                    .await?;
            }
            AuthorizationState::WaitEncryptionKey { .. } => {
                client
                    .execute(&CheckDatabaseEncryptionKey {
                        encryption_key: self.parameters.database_encryption_key.clone(),
                    })
                    .await?;
            }
            AuthorizationState::WaitPhoneNumber => {
                let phone_number = read(&self.phone_number, "phone number").await?;
                client
                    .execute(&SetAuthenticationPhoneNumber {
                        phone_number: phone_number.expose_secret().to_owned(),
                        settings: Some(PhoneNumberAuthenticationSettings::default()),
                    })
                    .await?;
            }
            AuthorizationState::WaitCode { .. } => {
                let code = read(&self.code, "code").await?;
                client
                    .execute(&CheckAuthenticationCode {
                        code: code.expose_secret().to_owned(),
                    })
                    .await?;
            }
            AuthorizationState::WaitPassword { .. } => {
                let password = read(&self.password, "password").await?;
                client
                    .execute(&CheckAuthenticationPassword {
                        password: password.expose_secret().to_owned(),
                    })
                    .await?;
            }
            AuthorizationState::Ready
            | AuthorizationState::Closing
            | AuthorizationState::Closed => {}
            AuthorizationState::WaitEmailAddress
            | AuthorizationState::WaitEmailCode
            | AuthorizationState::WaitOtherDeviceConfirmation { .. }
            | AuthorizationState::WaitRegistration
            | AuthorizationState::LoggingOut => return Err(AuthError::unsupported(state)),
        }
        Ok(())
    }

    /// Ends the published state stream.
    fn close(&self) {
        if let Ok(mut states) = self.states.lock() {
            states.take();
        }
    }
}

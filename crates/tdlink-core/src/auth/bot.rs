// Bot-token authorization strategy.

use secrecy::{ExposeSecret, SecretString};
use tokio_util::sync::CancellationToken;

use tdlink_api::methods::{
    CheckAuthenticationBotToken, CheckDatabaseEncryptionKey, SetTdlibParameters,
};
use tdlink_api::{AuthorizationState, TdlibParameters};

use super::AuthorizationHandler;
use crate::client::Client;
use crate::error::AuthError;

/// Strategy for bot accounts: everything needed is known up front.
///
/// Only the states on the bot login path are handled; any other state,
/// including `closing` and `closed`, is unsupported.
pub struct BotAuthorizer {
    parameters: TdlibParameters,
    token: SecretString,
    cancel: CancellationToken,
}

impl BotAuthorizer {
    pub fn new(parameters: TdlibParameters, token: SecretString) -> Self {
        Self {
            parameters,
            token,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl AuthorizationHandler for BotAuthorizer {
    fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn handle(&self, client: &Client, state: &AuthorizationState) -> Result<(), AuthError> {
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
                client
                    .execute(&CheckAuthenticationBotToken {
                        token: self.token.expose_secret().to_owned(),
                    })
                    .await?;
            }
            AuthorizationState::Ready => {}
            other => return Err(AuthError::unsupported(other)),
        }
        Ok(())
    }
}

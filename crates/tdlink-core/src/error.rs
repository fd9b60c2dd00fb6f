// ── Core error types ──
//
// Call-level and authorization-level failures. Transport and envelope
// errors from `tdlink-api` are wrapped, never exposed raw; decode
// failures and unmatched replies on the inbound stream never surface here.

use std::time::Duration;

use thiserror::Error;

use tdlink_api::EngineError;

/// Unified error type for calls made through a [`Client`](crate::Client).
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Call errors ──────────────────────────────────────────────────
    /// No reply arrived for the call within the configured window.
    #[error("No reply to `{kind}` within {timeout:?}")]
    Timeout { kind: String, timeout: Duration },

    /// The client is shut down (or shut down while the call was waiting).
    #[error("Client is shut down")]
    ClientClosed,

    /// A caller-supplied tag collides with a call still in flight.
    #[error("Correlation tag `{tag}` is already in flight")]
    DuplicateTag { tag: String },

    // ── Engine errors ────────────────────────────────────────────────
    /// The engine answered with an `error` object.
    #[error("Engine error {code}: {message}")]
    Engine { code: i32, message: String },

    /// The reply could not be decoded into the method's result type.
    #[error("Unexpected `{got}` reply to `{request}`: {message}")]
    UnexpectedResponse {
        request: String,
        got: String,
        message: String,
    },

    // ── Transport errors (wrapped) ───────────────────────────────────
    #[error("Transport error: {0}")]
    Transport(#[from] tdlink_api::Error),
}

impl CoreError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The engine error code, if the engine rejected the call.
    pub fn engine_code(&self) -> Option<i32> {
        match self {
            Self::Engine { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<EngineError> for CoreError {
    fn from(err: EngineError) -> Self {
        Self::Engine {
            code: err.code,
            message: err.message,
        }
    }
}

/// Failure of the authorization state machine.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The strategy has no corrective action for this remote state.
    #[error("Authorization state `{state}` is not supported")]
    UnsupportedState { state: &'static str },

    /// The handler's cancellation context fired (explicit stop or deadline).
    #[error("Authorization cancelled")]
    Cancelled,

    /// The engine reached `closed` without a recorded failure.
    #[error("Engine closed before authorization completed")]
    Closed,

    /// A call made while authorizing failed.
    #[error(transparent)]
    Call(#[from] CoreError),

    /// The operator side of an interactive strategy went away or failed.
    #[error("Operator input unavailable: {0}")]
    Interaction(String),
}

impl AuthError {
    pub fn unsupported(state: &tdlink_api::AuthorizationState) -> Self {
        Self::UnsupportedState {
            state: state.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

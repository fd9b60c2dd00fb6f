//! CLI error types with miette diagnostics.
//!
//! Maps config, call, and authorization failures into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use tdlink_config::ConfigError;
use tdlink_core::{AuthError, CoreError};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const BRIDGE: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Bridge ───────────────────────────────────────────────────────
    #[error("Could not start bridge `{program}`")]
    #[diagnostic(
        code(tdlink::bridge),
        help(
            "Check that the bridge executable is installed and on PATH.\n\
             Reason: {reason}\n\
             Override it with --bridge or `bridge` in the config file."
        )
    )]
    Bridge { program: String, reason: String },

    #[error("Bridge connection closed")]
    #[diagnostic(code(tdlink::closed))]
    Closed,

    // ── Authorization ────────────────────────────────────────────────
    #[error("Authorization needs `{state}`, which this tool cannot provide")]
    #[diagnostic(
        code(tdlink::auth_unsupported),
        help("Complete this step with an official client, then retry.")
    )]
    AuthUnsupported { state: &'static str },

    #[error("Authorization failed: {reason}")]
    #[diagnostic(code(tdlink::auth_failed))]
    AuthFailed { reason: String },

    #[error("Interrupted")]
    #[diagnostic(code(tdlink::interrupted))]
    Interrupted,

    // ── Calls ────────────────────────────────────────────────────────
    #[error("Engine error {code}: {message}")]
    #[diagnostic(code(tdlink::engine))]
    Engine { code: i32, message: String },

    #[error("No reply to `{kind}` within {seconds}s")]
    #[diagnostic(
        code(tdlink::timeout),
        help("Increase the timeout with --timeout or check the bridge.")
    )]
    Timeout { kind: String, seconds: u64 },

    #[error(transparent)]
    #[diagnostic(code(tdlink::call))]
    Call(CoreError),

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(tdlink::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(tdlink::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: tdlink config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(tdlink::config))]
    Config(#[from] ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(tdlink::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Bridge { .. } | Self::Closed => exit_code::BRIDGE,
            Self::AuthUnsupported { .. } | Self::AuthFailed { .. } => exit_code::AUTH,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Interrupted => exit_code::INTERRUPTED,
            Self::Validation { .. } | Self::ProfileNotFound { .. } | Self::Json(_) => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── Library errors → CliError ────────────────────────────────────────

impl From<tdlink_api::Error> for CliError {
    fn from(err: tdlink_api::Error) -> Self {
        match err {
            tdlink_api::Error::Spawn { program, reason } => Self::Bridge { program, reason },
            tdlink_api::Error::Closed => Self::Closed,
            tdlink_api::Error::Deserialization { message, .. } => Self::Validation {
                field: "request".into(),
                reason: message,
            },
            other => Self::Call(CoreError::Transport(other)),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Timeout { kind, timeout } => Self::Timeout {
                kind,
                seconds: timeout.as_secs(),
            },
            CoreError::Engine { code, message } => Self::Engine { code, message },
            CoreError::Transport(err) => err.into(),
            other => Self::Call(other),
        }
    }
}

impl From<AuthError> for CliError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UnsupportedState { state } => Self::AuthUnsupported { state },
            AuthError::Cancelled => Self::Interrupted,
            AuthError::Call(err) => match Self::from(err) {
                Self::Engine { code, message } => Self::AuthFailed {
                    reason: format!("engine error {code}: {message}"),
                },
                other => other,
            },
            other => Self::AuthFailed {
                reason: other.to_string(),
            },
        }
    }
}

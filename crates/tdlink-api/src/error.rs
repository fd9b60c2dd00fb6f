use thiserror::Error;

/// Top-level error type for the `tdlink-api` crate.
///
/// Covers the transport boundary and the JSON envelope. `tdlink-core`
/// maps these into call-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// The bridge process could not be started.
    #[error("Failed to spawn bridge `{program}`: {reason}")]
    Spawn { program: String, reason: String },

    /// The outbound path is gone (transport shut down or bridge exited).
    #[error("Transport closed")]
    Closed,

    // ── Data ────────────────────────────────────────────────────────
    /// A request payload could not be turned into a JSON object.
    #[error("Failed to encode `{kind}` request: {message}")]
    Encode { kind: String, message: String },

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the transport can no longer carry requests.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

//! Coordination layer between application code and the engine's single
//! JSON event stream.
//!
//! - **[`Client`]**: facade owning one correlation engine, one listener
//!   registry, and one dispatch task. [`Client::new`] authorizes before
//!   returning; [`Client::new_async`] authorizes in the background.
//!
//! - **[`Correlator`]**: turns fire-and-forget submits into awaited calls:
//!   each request gets a unique `@extra` tag and a one-shot slot that the
//!   dispatch loop fills when the tagged reply arrives.
//!
//! - **[`ListenerRegistry`]** / **[`Listener`]**: fan-out of decoded
//!   [`Update`](tdlink_api::Update)s to any number of subscribers, with lazy
//!   removal of subscribers that stopped listening.
//!
//! - **[`ClientRegistry`]**: explicit process-wide routing table from
//!   engine client id to the owning client's inbound channel.
//!
//! - **[`auth`]**: authorization state machine and the bundled
//!   interactive and bot-token strategies.

pub mod auth;
pub mod client;
pub mod config;
mod dispatch;
pub mod error;
pub mod listener;
pub mod pending;
pub mod registry;

// ── Primary re-exports ──────────────────────────────────────────────
pub use auth::{
    AuthorizationHandler, BotAuthorizer, InteractiveAuthorizer, Operator, Prompter, authorize,
    run_interactor,
};
pub use client::Client;
pub use config::{AuthorizerConfig, ClientConfig, QueueFullPolicy, TagPolicy};
pub use error::{AuthError, CoreError};
pub use listener::{BroadcastOutcome, Listener, ListenerRegistry};
pub use pending::Correlator;
pub use registry::ClientRegistry;

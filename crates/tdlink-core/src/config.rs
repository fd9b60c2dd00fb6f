// ── Runtime client configuration ──
//
// These types describe how a client correlates, fans out, and authorizes.
// They never touch disk; `tdlink-config` builds them from profiles.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tdlink_api::methods::AddProxy;

/// What the listener registry does when a subscriber's queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueFullPolicy {
    /// Drop the update for that subscriber and move on.
    #[default]
    Drop,
    /// Wait up to the given duration for room, then drop.
    Wait(Duration),
}

/// How correlation tags are generated.
#[derive(Clone, Default)]
pub enum TagPolicy {
    /// Random v4 UUIDs.
    #[default]
    Uuid,
    /// `{prefix}{n}` with a per-client counter starting at 1.
    Sequential { prefix: String },
    /// Caller-provided generator. Must not repeat while a tag is in flight.
    Custom(Arc<dyn Fn() -> String + Send + Sync>),
}

impl fmt::Debug for TagPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuid => f.write_str("Uuid"),
            Self::Sequential { prefix } => {
                f.debug_struct("Sequential").field("prefix", prefix).finish()
            }
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Timing of the authorization loop.
#[derive(Debug, Clone)]
pub struct AuthorizerConfig {
    /// Delay between two `getAuthorizationState` polls. Default: 1ms.
    pub poll_interval: Duration,
    /// Grace period after `ready` before returning. The engine flushes its
    /// database after authorization without signalling completion; this only
    /// approximates that flush. Default: 1s.
    pub settle_delay: Duration,
    /// Give up (as cancelled) after this long. `None` waits forever.
    pub deadline: Option<Duration>,
}

impl Default for AuthorizerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            settle_delay: Duration::from_secs(1),
            deadline: None,
        }
    }
}

/// Configuration for a single client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long a call waits for its reply. Default: 60s.
    pub call_timeout: Duration,
    /// Capacity of the client's inbound message channel. Default: 1000.
    pub inbound_capacity: usize,
    /// Capacity of each listener's update queue. Default: 1000.
    pub listener_capacity: usize,
    pub queue_full: QueueFullPolicy,
    pub tags: TagPolicy,
    /// `setLogVerbosityLevel` sent once the client starts.
    pub log_verbosity: Option<i32>,
    /// `addProxy` sent once the client starts.
    pub proxy: Option<AddProxy>,
    pub authorizer: AuthorizerConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(60),
            inbound_capacity: 1000,
            listener_capacity: 1000,
            queue_full: QueueFullPolicy::default(),
            tags: TagPolicy::default(),
            log_verbosity: None,
            proxy: None,
            authorizer: AuthorizerConfig::default(),
        }
    }
}

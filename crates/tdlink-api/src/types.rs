// ── Engine object types ──
//
// The subset of engine objects the client layer itself interprets:
// authorization states, the closed set of updates it broadcasts,
// engine errors, and the parameters needed to open a database.
// Everything else stays an opaque `serde_json::Value`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── AuthorizationState ───────────────────────────────────────────────

/// Remote authorization state, as reported by `getAuthorizationState`
/// and `updateAuthorizationState`.
///
/// `Display` renders the short kebab-case state name used in logs and errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::IntoStaticStr)]
#[serde(tag = "@type")]
pub enum AuthorizationState {
    #[serde(rename = "authorizationStateWaitTdlibParameters")]
    #[strum(serialize = "wait-parameters")]
    WaitTdlibParameters,

    #[serde(rename = "authorizationStateWaitEncryptionKey")]
    #[strum(serialize = "wait-encryption-key")]
    WaitEncryptionKey {
        #[serde(default)]
        is_encrypted: bool,
    },

    #[serde(rename = "authorizationStateWaitPhoneNumber")]
    #[strum(serialize = "wait-phone-number")]
    WaitPhoneNumber,

    #[serde(rename = "authorizationStateWaitEmailAddress")]
    #[strum(serialize = "wait-email-address")]
    WaitEmailAddress,

    #[serde(rename = "authorizationStateWaitEmailCode")]
    #[strum(serialize = "wait-email-code")]
    WaitEmailCode,

    #[serde(rename = "authorizationStateWaitCode")]
    #[strum(serialize = "wait-code")]
    WaitCode {
        #[serde(default)]
        code_info: Option<Value>,
    },

    #[serde(rename = "authorizationStateWaitOtherDeviceConfirmation")]
    #[strum(serialize = "wait-other-device-confirmation")]
    WaitOtherDeviceConfirmation {
        #[serde(default)]
        link: String,
    },

    #[serde(rename = "authorizationStateWaitRegistration")]
    #[strum(serialize = "wait-registration")]
    WaitRegistration,

    #[serde(rename = "authorizationStateWaitPassword")]
    #[strum(serialize = "wait-password")]
    WaitPassword {
        #[serde(default)]
        password_hint: String,
    },

    #[serde(rename = "authorizationStateReady")]
    #[strum(serialize = "ready")]
    Ready,

    #[serde(rename = "authorizationStateLoggingOut")]
    #[strum(serialize = "logging-out")]
    LoggingOut,

    #[serde(rename = "authorizationStateClosing")]
    #[strum(serialize = "closing")]
    Closing,

    #[serde(rename = "authorizationStateClosed")]
    #[strum(serialize = "closed")]
    Closed,
}

impl AuthorizationState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

// ── ConnectionState ──────────────────────────────────────────────────

/// Network connection state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(tag = "@type")]
#[strum(serialize_all = "kebab-case")]
pub enum ConnectionState {
    #[serde(rename = "connectionStateWaitingForNetwork")]
    WaitingForNetwork,
    #[serde(rename = "connectionStateConnectingToProxy")]
    ConnectingToProxy,
    #[serde(rename = "connectionStateConnecting")]
    Connecting,
    #[serde(rename = "connectionStateUpdating")]
    Updating,
    #[serde(rename = "connectionStateReady")]
    Ready,
}

// ── Update ───────────────────────────────────────────────────────────

/// An unsolicited event broadcast to listeners.
///
/// Closed set: payloads whose `@type` is not listed here fail to decode
/// and are dropped by the dispatch loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum Update {
    #[serde(rename = "updateAuthorizationState")]
    AuthorizationState {
        authorization_state: AuthorizationState,
    },

    #[serde(rename = "updateConnectionState")]
    ConnectionState { state: ConnectionState },

    #[serde(rename = "updateOption")]
    OptionValue { name: String, value: Value },

    #[serde(rename = "updateNewMessage")]
    NewMessage { message: Value },

    #[serde(rename = "updateMessageSendSucceeded")]
    MessageSendSucceeded { message: Value, old_message_id: i64 },

    #[serde(rename = "updateNewChat")]
    NewChat { chat: Value },

    #[serde(rename = "updateChatLastMessage")]
    ChatLastMessage {
        chat_id: i64,
        #[serde(default)]
        last_message: Option<Value>,
    },

    #[serde(rename = "updateUser")]
    User { user: Value },

    #[serde(rename = "updateFile")]
    File { file: Value },
}

impl Update {
    /// The wire `@type` name of this update.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::AuthorizationState { .. } => "updateAuthorizationState",
            Self::ConnectionState { .. } => "updateConnectionState",
            Self::OptionValue { .. } => "updateOption",
            Self::NewMessage { .. } => "updateNewMessage",
            Self::MessageSendSucceeded { .. } => "updateMessageSendSucceeded",
            Self::NewChat { .. } => "updateNewChat",
            Self::ChatLastMessage { .. } => "updateChatLastMessage",
            Self::User { .. } => "updateUser",
            Self::File { .. } => "updateFile",
        }
    }
}

// ── EngineError ──────────────────────────────────────────────────────

/// The engine's `error` object, returned in place of a method result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineError {
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// The engine's `ok` object: success without a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Acknowledged {}

// ── TdlibParameters ──────────────────────────────────────────────────

/// Parameters the engine needs before it can open its database.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TdlibParameters {
    /// Use the test environment instead of production.
    pub use_test_dc: bool,
    /// Directory for the persistent database; empty means the working directory.
    pub database_directory: String,
    /// Directory for downloaded files; empty means `database_directory`.
    pub files_directory: String,
    /// Base64-encoded database encryption key.
    pub database_encryption_key: String,
    pub use_file_database: bool,
    pub use_chat_info_database: bool,
    pub use_message_database: bool,
    pub use_secret_chats: bool,
    pub api_id: i32,
    pub api_hash: String,
    /// IETF language tag; must be non-empty.
    pub system_language_code: String,
    /// Must be non-empty.
    pub device_model: String,
    pub system_version: String,
    /// Must be non-empty.
    pub application_version: String,
    pub enable_storage_optimizer: bool,
    pub ignore_file_names: bool,
}

// ── Proxy ────────────────────────────────────────────────────────────

/// Proxy protocol accepted by `addProxy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum ProxyType {
    #[serde(rename = "proxyTypeSocks5")]
    Socks5 {
        #[serde(default)]
        username: String,
        #[serde(default)]
        password: String,
    },
    #[serde(rename = "proxyTypeHttp")]
    Http {
        #[serde(default)]
        username: String,
        #[serde(default)]
        password: String,
        #[serde(default)]
        http_only: bool,
    },
    #[serde(rename = "proxyTypeMtproto")]
    Mtproto { secret: String },
}

/// Phone number login options sent with `setAuthenticationPhoneNumber`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PhoneNumberAuthenticationSettings {
    pub allow_flash_call: bool,
    pub is_current_phone_number: bool,
    pub allow_sms_retriever_api: bool,
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_unit_state_ignores_extra_fields() {
        let state: AuthorizationState = serde_json::from_value(json!({
            "@type": "authorizationStateWaitPhoneNumber",
            "@extra": "ignored"
        }))
        .unwrap();
        assert_eq!(state, AuthorizationState::WaitPhoneNumber);
    }

    #[test]
    fn decode_password_state_with_hint() {
        let state: AuthorizationState = serde_json::from_value(json!({
            "@type": "authorizationStateWaitPassword",
            "password_hint": "pet name",
            "has_recovery_email_address": false
        }))
        .unwrap();
        assert_eq!(
            state,
            AuthorizationState::WaitPassword {
                password_hint: "pet name".into()
            }
        );
    }

    #[test]
    fn state_display_names() {
        assert_eq!(AuthorizationState::WaitTdlibParameters.to_string(), "wait-parameters");
        assert_eq!(AuthorizationState::WaitRegistration.to_string(), "wait-registration");
        assert_eq!(
            AuthorizationState::WaitCode { code_info: None }.to_string(),
            "wait-code"
        );
        assert_eq!(ConnectionState::WaitingForNetwork.to_string(), "waiting-for-network");
    }

    #[test]
    fn unknown_update_type_fails_to_decode() {
        let result = serde_json::from_value::<Update>(json!({
            "@type": "updateSomethingNew",
            "whatever": 1
        }));
        assert!(result.is_err());
    }

    #[test]
    fn decode_authorization_state_update() {
        let update: Update = serde_json::from_value(json!({
            "@type": "updateAuthorizationState",
            "authorization_state": { "@type": "authorizationStateReady" }
        }))
        .unwrap();
        assert_eq!(
            update,
            Update::AuthorizationState {
                authorization_state: AuthorizationState::Ready
            }
        );
        assert_eq!(update.type_name(), "updateAuthorizationState");
    }

    #[test]
    fn decode_option_update() {
        let update: Update = serde_json::from_value(json!({
            "@type": "updateOption",
            "name": "version",
            "value": { "@type": "optionValueString", "value": "1.8.0" }
        }))
        .unwrap();
        assert!(matches!(update, Update::OptionValue { ref name, .. } if name == "version"));
    }

    #[test]
    fn decode_engine_error() {
        let err: EngineError =
            serde_json::from_value(json!({"@type": "error", "code": 400, "message": "PHONE_NUMBER_INVALID"}))
                .unwrap();
        assert_eq!(err.code, 400);
        assert_eq!(err.message, "PHONE_NUMBER_INVALID");
    }
}

// ── Typed engine methods ──
//
// Each method is a serializable payload paired with its wire name and
// the type of its successful result. Only the methods the client layer
// needs for its own lifecycle and authorization live here; anything else
// goes through `Request::new` / `Request::from_payload` directly.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{
    Acknowledged, AuthorizationState, PhoneNumberAuthenticationSettings, ProxyType,
    TdlibParameters,
};

/// A typed engine method.
pub trait Method: Serialize {
    /// Wire `@type` of the request.
    const TYPE: &'static str;

    /// Decoded result on success.
    type Output: DeserializeOwned;
}

macro_rules! method {
    ($ty:ident, $name:literal, $output:ty) => {
        impl Method for $ty {
            const TYPE: &'static str = $name;
            type Output = $output;
        }
    };
}

// ── Authorization ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GetAuthorizationState {}
method!(GetAuthorizationState, "getAuthorizationState", AuthorizationState);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetTdlibParameters {
    #[serde(flatten)]
    pub parameters: TdlibParameters,
}
method!(SetTdlibParameters, "setTdlibParameters", Acknowledged);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckDatabaseEncryptionKey {
    pub encryption_key: String,
}
method!(CheckDatabaseEncryptionKey, "checkDatabaseEncryptionKey", Acknowledged);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAuthenticationPhoneNumber {
    pub phone_number: String,
    pub settings: Option<PhoneNumberAuthenticationSettings>,
}
method!(SetAuthenticationPhoneNumber, "setAuthenticationPhoneNumber", Acknowledged);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckAuthenticationCode {
    pub code: String,
}
method!(CheckAuthenticationCode, "checkAuthenticationCode", Acknowledged);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckAuthenticationPassword {
    pub password: String,
}
method!(CheckAuthenticationPassword, "checkAuthenticationPassword", Acknowledged);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckAuthenticationBotToken {
    pub token: String,
}
method!(CheckAuthenticationBotToken, "checkAuthenticationBotToken", Acknowledged);

// ── Lifecycle ────────────────────────────────────────────────────────

/// Close the engine instance; the state moves to `closing`, then `closed`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Close {}
method!(Close, "close", Acknowledged);

/// Close the instance without a proper shutdown, destroying local data.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Destroy {}
method!(Destroy, "destroy", Acknowledged);

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LogOut {}
method!(LogOut, "logOut", Acknowledged);

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GetMe {}
method!(GetMe, "getMe", Value);

// ── Engine options ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SetLogVerbosityLevel {
    pub new_verbosity_level: i32,
}
method!(SetLogVerbosityLevel, "setLogVerbosityLevel", Acknowledged);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddProxy {
    pub server: String,
    pub port: u16,
    pub enable: bool,
    #[serde(rename = "type")]
    pub proxy_type: ProxyType,
}
method!(AddProxy, "addProxy", Value);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::message::{ClientId, Request};

    #[test]
    fn set_tdlib_parameters_flattens_fields() {
        let method = SetTdlibParameters {
            parameters: TdlibParameters {
                api_id: 94575,
                api_hash: "a3406de8d171bb422bb6ddf3bbd800e2".into(),
                system_language_code: "en".into(),
                device_model: "Server".into(),
                application_version: "1.0.0".into(),
                database_directory: "./db".into(),
                ..TdlibParameters::default()
            },
        };
        let request = Request::from_method(&method).unwrap().with_extra("t");

        insta::with_settings!({ sort_maps => true }, {
            insta::assert_json_snapshot!(request.to_value(ClientId::new(1)), @r###"
            {
              "@client_id": 1,
              "@extra": "t",
              "@type": "setTdlibParameters",
              "api_hash": "a3406de8d171bb422bb6ddf3bbd800e2",
              "api_id": 94575,
              "application_version": "1.0.0",
              "database_directory": "./db",
              "database_encryption_key": "",
              "device_model": "Server",
              "enable_storage_optimizer": false,
              "files_directory": "",
              "ignore_file_names": false,
              "system_language_code": "en",
              "system_version": "",
              "use_chat_info_database": false,
              "use_file_database": false,
              "use_message_database": false,
              "use_secret_chats": false,
              "use_test_dc": false
            }
            "###);
        });
    }

    #[test]
    fn add_proxy_uses_type_field() {
        let method = AddProxy {
            server: "127.0.0.1".into(),
            port: 1080,
            enable: true,
            proxy_type: ProxyType::Socks5 {
                username: String::new(),
                password: String::new(),
            },
        };
        let request = Request::from_method(&method).unwrap();
        assert_eq!(request.kind(), "addProxy");
        assert_eq!(request.fields()["type"]["@type"], "proxyTypeSocks5");
    }

    #[test]
    fn empty_methods_have_no_fields() {
        let request = Request::from_method(&GetAuthorizationState {}).unwrap();
        assert_eq!(request.kind(), "getAuthorizationState");
        assert!(request.fields().is_empty());
    }
}

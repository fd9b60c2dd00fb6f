//! Shared configuration for tdlink tools.
//!
//! TOML profiles, secret resolution (env var indirection + plaintext),
//! and translation to `tdlink_core::ClientConfig` and engine
//! `TdlibParameters`. The CLI layers its flag overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tdlink_api::TdlibParameters;
use tdlink_api::methods::AddProxy;
use tdlink_api::types::ProxyType;
use tdlink_core::{AuthorizerConfig, ClientConfig};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("no {what} configured for profile '{profile}'")]
    MissingSecret { what: &'static str, profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is given on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Resolve the active profile name: explicit choice, then
    /// `default_profile`, then `"default"`.
    pub fn active_profile_name(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

/// Settings shared by every profile unless a profile overrides them.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    /// Bridge executable speaking JSON lines on stdin/stdout.
    #[serde(default = "default_bridge")]
    pub bridge: String,

    #[serde(default)]
    pub bridge_args: Vec<String>,

    /// Call timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Engine log verbosity sent at startup.
    pub log_verbosity: Option<i32>,

    #[serde(default = "default_listener_capacity")]
    pub listener_capacity: usize,

    /// Grace period after authorization, in milliseconds.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            bridge: default_bridge(),
            bridge_args: Vec::new(),
            timeout: default_timeout(),
            log_verbosity: None,
            listener_capacity: default_listener_capacity(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

fn default_bridge() -> String {
    "tdjson-bridge".into()
}
fn default_timeout() -> u64 {
    60
}
fn default_listener_capacity() -> usize {
    1000
}
fn default_settle_delay_ms() -> u64 {
    1000
}

/// A named account profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Profile {
    /// Application id from my.telegram.org.
    pub api_id: i32,

    /// Application hash (plaintext; prefer `api_hash_env`).
    pub api_hash: Option<String>,

    /// Environment variable holding the application hash.
    pub api_hash_env: Option<String>,

    /// Bot token (plaintext; prefer `bot_token_env`). Profiles without one
    /// log in interactively.
    pub bot_token: Option<String>,

    pub bot_token_env: Option<String>,

    pub database_encryption_key: Option<String>,

    pub database_encryption_key_env: Option<String>,

    pub database_directory: Option<PathBuf>,

    pub files_directory: Option<PathBuf>,

    pub use_test_dc: bool,
    pub use_file_database: bool,
    pub use_chat_info_database: bool,
    pub use_message_database: bool,
    pub use_secret_chats: bool,

    /// Defaults to `"en"`.
    pub system_language_code: Option<String>,

    /// Defaults to `"Server"`.
    pub device_model: Option<String>,

    pub system_version: Option<String>,

    /// Defaults to this crate's version.
    pub application_version: Option<String>,

    /// Override the bridge executable.
    pub bridge: Option<String>,

    /// Override the call timeout (seconds).
    pub timeout: Option<u64>,

    /// Override the engine log verbosity.
    pub log_verbosity: Option<i32>,

    pub proxy: Option<ProxyProfile>,
}

/// Proxy added to the engine at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyProfile {
    pub server: String,
    pub port: u16,

    /// "socks5", "http", or "mtproto".
    #[serde(default = "default_proxy_kind")]
    pub kind: String,

    pub username: Option<String>,
    pub password: Option<String>,

    /// MTProto secret.
    pub secret: Option<String>,
}

fn default_proxy_kind() -> String {
    "socks5".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "tdlink", "tdlink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("tdlink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path`, layered as defaults → file → `TDLINK_*` env vars.
///
/// Nested keys use a double underscore: `TDLINK_DEFAULTS__TIMEOUT=30`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("TDLINK_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Secret resolution ───────────────────────────────────────────────

/// Env var named by the profile first, then the plaintext value.
fn resolve_secret(env_name: Option<&String>, plaintext: Option<&String>) -> Option<SecretString> {
    if let Some(env_name) = env_name {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }
    plaintext.map(|val| SecretString::from(val.clone()))
}

pub fn resolve_api_hash(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_secret(profile.api_hash_env.as_ref(), profile.api_hash.as_ref()).ok_or_else(|| {
        ConfigError::MissingSecret {
            what: "api_hash",
            profile: profile_name.into(),
        }
    })
}

/// Bot token, if the profile is a bot profile.
pub fn resolve_bot_token(profile: &Profile) -> Option<SecretString> {
    resolve_secret(profile.bot_token_env.as_ref(), profile.bot_token.as_ref())
}

pub fn resolve_database_key(profile: &Profile) -> Option<SecretString> {
    resolve_secret(
        profile.database_encryption_key_env.as_ref(),
        profile.database_encryption_key.as_ref(),
    )
}

// ── Translation ─────────────────────────────────────────────────────

/// Build the engine's database parameters from a profile.
pub fn profile_to_parameters(
    profile: &Profile,
    profile_name: &str,
) -> Result<TdlibParameters, ConfigError> {
    if profile.api_id <= 0 {
        return Err(ConfigError::Validation {
            field: "api_id".into(),
            reason: format!("profile '{profile_name}' needs a positive api_id"),
        });
    }
    let api_hash = resolve_api_hash(profile, profile_name)?;

    let path_string = |path: Option<&PathBuf>| {
        path.map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    };

    Ok(TdlibParameters {
        use_test_dc: profile.use_test_dc,
        database_directory: path_string(profile.database_directory.as_ref()),
        files_directory: path_string(profile.files_directory.as_ref()),
        database_encryption_key: resolve_database_key(profile)
            .map(|key| key.expose_secret().to_owned())
            .unwrap_or_default(),
        use_file_database: profile.use_file_database,
        use_chat_info_database: profile.use_chat_info_database,
        use_message_database: profile.use_message_database,
        use_secret_chats: profile.use_secret_chats,
        api_id: profile.api_id,
        api_hash: api_hash.expose_secret().to_owned(),
        system_language_code: profile
            .system_language_code
            .clone()
            .unwrap_or_else(|| "en".into()),
        device_model: profile
            .device_model
            .clone()
            .unwrap_or_else(|| "Server".into()),
        system_version: profile.system_version.clone().unwrap_or_default(),
        application_version: profile
            .application_version
            .clone()
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").into()),
        enable_storage_optimizer: false,
        ignore_file_names: false,
    })
}

/// Build runtime client settings from defaults plus profile overrides.
pub fn profile_to_client_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ClientConfig, ConfigError> {
    let proxy = profile.proxy.as_ref().map(proxy_request).transpose()?;

    Ok(ClientConfig {
        call_timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
        listener_capacity: defaults.listener_capacity,
        log_verbosity: profile.log_verbosity.or(defaults.log_verbosity),
        proxy,
        authorizer: AuthorizerConfig {
            settle_delay: Duration::from_millis(defaults.settle_delay_ms),
            ..AuthorizerConfig::default()
        },
        ..ClientConfig::default()
    })
}

fn proxy_request(proxy: &ProxyProfile) -> Result<AddProxy, ConfigError> {
    let proxy_type = match proxy.kind.as_str() {
        "socks5" => ProxyType::Socks5 {
            username: proxy.username.clone().unwrap_or_default(),
            password: proxy.password.clone().unwrap_or_default(),
        },
        "http" => ProxyType::Http {
            username: proxy.username.clone().unwrap_or_default(),
            password: proxy.password.clone().unwrap_or_default(),
            http_only: false,
        },
        "mtproto" => ProxyType::Mtproto {
            secret: proxy.secret.clone().ok_or_else(|| ConfigError::Validation {
                field: "proxy.secret".into(),
                reason: "mtproto proxies need a secret".into(),
            })?,
        },
        other => {
            return Err(ConfigError::Validation {
                field: "proxy.kind".into(),
                reason: format!("expected 'socks5', 'http', or 'mtproto', got '{other}'"),
            });
        }
    };

    Ok(AddProxy {
        server: proxy.server.clone(),
        port: proxy.port,
        enable: true,
        proxy_type,
    })
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const SAMPLE: &str = r#"
default_profile = "work"

[defaults]
bridge = "/opt/tdjson-bridge"
timeout = 30

[profiles.work]
api_id = 94575
api_hash = "a3406de8d171bb422bb6ddf3bbd800e2"
database_directory = "/var/lib/tdlink/work"
use_message_database = true
log_verbosity = 2

[profiles.bot]
api_id = 94575
api_hash = "a3406de8d171bb422bb6ddf3bbd800e2"
bot_token = "123:abc"
timeout = 5

[profiles.bot.proxy]
server = "127.0.0.1"
port = 1080
"#;

    fn sample() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = load_config_from(&path).unwrap();
        (dir, config)
    }

    #[test]
    fn load_layers_file_over_defaults() {
        let (_dir, config) = sample();

        assert_eq!(config.default_profile.as_deref(), Some("work"));
        assert_eq!(config.defaults.bridge, "/opt/tdjson-bridge");
        assert_eq!(config.defaults.timeout, 30);
        assert_eq!(config.defaults.listener_capacity, 1000);
        assert_eq!(config.profiles.len(), 2);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.default_profile.as_deref(), Some("default"));
        assert_eq!(config.defaults.timeout, 60);
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn active_profile_prefers_explicit_choice() {
        let (_dir, config) = sample();
        assert_eq!(config.active_profile_name(Some("bot")), "bot");
        assert_eq!(config.active_profile_name(None), "work");
        assert!(matches!(
            config.profile("nope"),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn parameters_from_profile() {
        let (_dir, config) = sample();
        let params = profile_to_parameters(config.profile("work").unwrap(), "work").unwrap();

        assert_eq!(params.api_id, 94575);
        assert_eq!(params.database_directory, "/var/lib/tdlink/work");
        assert!(params.use_message_database);
        assert_eq!(params.system_language_code, "en");
        assert_eq!(params.device_model, "Server");
        assert!(!params.application_version.is_empty());
    }

    #[test]
    fn parameters_need_api_credentials() {
        let profile = Profile::default();
        assert!(matches!(
            profile_to_parameters(&profile, "empty"),
            Err(ConfigError::Validation { ref field, .. }) if field == "api_id"
        ));

        let profile = Profile {
            api_id: 1,
            api_hash_env: Some("TDLINK_TEST_SURELY_UNSET_HASH".into()),
            ..Profile::default()
        };
        assert!(matches!(
            profile_to_parameters(&profile, "empty"),
            Err(ConfigError::MissingSecret { what: "api_hash", .. })
        ));
    }

    #[test]
    fn unset_env_falls_back_to_plaintext() {
        let profile = Profile {
            bot_token: Some("123:abc".into()),
            bot_token_env: Some("TDLINK_TEST_SURELY_UNSET_TOKEN".into()),
            ..Profile::default()
        };
        assert_eq!(resolve_bot_token(&profile).unwrap().expose_secret(), "123:abc");
        assert!(resolve_database_key(&profile).is_none());
    }

    #[test]
    fn client_config_applies_overrides() {
        let (_dir, config) = sample();

        let work = profile_to_client_config(config.profile("work").unwrap(), &config.defaults)
            .unwrap();
        assert_eq!(work.call_timeout, Duration::from_secs(30));
        assert_eq!(work.log_verbosity, Some(2));
        assert!(work.proxy.is_none());

        let bot = profile_to_client_config(config.profile("bot").unwrap(), &config.defaults)
            .unwrap();
        assert_eq!(bot.call_timeout, Duration::from_secs(5));
        let proxy = bot.proxy.unwrap();
        assert_eq!(proxy.server, "127.0.0.1");
        assert_eq!(proxy.port, 1080);
        assert!(matches!(proxy.proxy_type, ProxyType::Socks5 { .. }));
    }

    #[test]
    fn mtproto_proxy_needs_secret() {
        let profile = Profile {
            proxy: Some(ProxyProfile {
                server: "proxy.example".into(),
                port: 443,
                kind: "mtproto".into(),
                username: None,
                password: None,
                secret: None,
            }),
            ..Profile::default()
        };
        assert!(matches!(
            profile_to_client_config(&profile, &Defaults::default()),
            Err(ConfigError::Validation { ref field, .. }) if field == "proxy.secret"
        ));
    }

    #[test]
    fn save_then_load_preserves_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.profiles.insert(
            "default".into(),
            Profile {
                api_id: 7,
                api_hash_env: Some("MY_HASH".into()),
                ..Profile::default()
            },
        );
        save_config_to(&config, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        let profile = loaded.profile("default").unwrap();
        assert_eq!(profile.api_id, 7);
        assert_eq!(profile.api_hash_env.as_deref(), Some("MY_HASH"));
    }
}

//! Profile resolution for commands that talk to the engine.
//!
//! The file format and loading live in `tdlink-config`; this module layers
//! the command-line overrides on top.

use std::time::Duration;

use secrecy::SecretString;

use tdlink_api::TdlibParameters;
use tdlink_config::{Config, ConfigError, Profile};
use tdlink_core::ClientConfig;

use crate::cli::{AuthArgs, GlobalOpts};
use crate::error::CliError;

/// Loaded configuration plus the profile selected for this invocation.
pub struct Session {
    pub config: Config,
    pub profile_name: String,
}

impl Session {
    pub fn load(global: &GlobalOpts) -> Result<Self, CliError> {
        let config = tdlink_config::load_config()?;
        let profile_name = config.active_profile_name(global.profile.as_deref());
        Ok(Self {
            config,
            profile_name,
        })
    }

    /// The selected profile, if the config file defines it.
    pub fn profile(&self) -> Option<&Profile> {
        self.config.profiles.get(&self.profile_name)
    }

    /// The selected profile, or an error listing the ones that exist.
    pub fn require_profile(&self) -> Result<&Profile, CliError> {
        match self.config.profile(&self.profile_name) {
            Ok(profile) => Ok(profile),
            Err(ConfigError::UnknownProfile { profile }) => Err(CliError::ProfileNotFound {
                name: profile,
                available: self.available_profiles(),
            }),
            Err(other) => Err(other.into()),
        }
    }

    pub fn available_profiles(&self) -> String {
        let mut names: Vec<&str> = self.config.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        if names.is_empty() {
            "(none)".into()
        } else {
            names.join(", ")
        }
    }

    /// Bridge program and arguments: flag, then profile, then defaults.
    pub fn bridge(&self, global: &GlobalOpts) -> (String, Vec<String>) {
        let program = global
            .bridge
            .clone()
            .or_else(|| self.profile().and_then(|p| p.bridge.clone()))
            .unwrap_or_else(|| self.config.defaults.bridge.clone());
        (program, self.config.defaults.bridge_args.clone())
    }

    /// Runtime client settings. Works without a profile for `--no-auth`.
    pub fn client_config(&self, global: &GlobalOpts) -> Result<ClientConfig, CliError> {
        let fallback = Profile::default();
        let profile = self.profile().unwrap_or(&fallback);
        let mut config = tdlink_config::profile_to_client_config(profile, &self.config.defaults)?;
        if let Some(seconds) = global.timeout {
            config.call_timeout = Duration::from_secs(seconds);
        }
        Ok(config)
    }

    pub fn parameters(&self) -> Result<TdlibParameters, CliError> {
        let profile = self.require_profile()?;
        Ok(tdlink_config::profile_to_parameters(
            profile,
            &self.profile_name,
        )?)
    }

    /// Bot token from the flag, then from the profile.
    pub fn bot_token(&self, args: &AuthArgs) -> Option<SecretString> {
        args.bot_token
            .clone()
            .map(SecretString::from)
            .or_else(|| self.profile().and_then(tdlink_config::resolve_bot_token))
    }
}

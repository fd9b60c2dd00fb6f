//! Config subcommand handlers.

use dialoguer::{Confirm, Input, Select};

use tdlink_config::{Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::Session;
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&tdlink_config::config_path().display().to_string())?;
            Ok(())
        }

        ConfigCommand::Show => {
            let session = Session::load(global)?;
            if global.profile.is_some() {
                session.require_profile()?;
            }
            let redacted = redact(session.config);
            let rendered = toml::to_string_pretty(&redacted)
                .map_err(tdlink_config::ConfigError::from)?;
            output::print_output(rendered.trim_end())?;
            Ok(())
        }

        ConfigCommand::Init => init(global),
    }
}

/// Replace plaintext secrets so the output is safe to paste.
fn redact(mut config: Config) -> Config {
    let hide = |value: &mut Option<String>| {
        if value.is_some() {
            *value = Some(REDACTED.into());
        }
    };
    for profile in config.profiles.values_mut() {
        hide(&mut profile.api_hash);
        hide(&mut profile.bot_token);
        hide(&mut profile.database_encryption_key);
        if let Some(proxy) = profile.proxy.as_mut() {
            hide(&mut proxy.password);
            hide(&mut proxy.secret);
        }
    }
    config
}

// ── Init: interactive wizard ─────────────────────────────────────────

fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let mut config = tdlink_config::load_config()?;
    eprintln!("tdlink configuration wizard");
    eprintln!("   Config path: {}\n", tdlink_config::config_path().display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default(config.active_profile_name(global.profile.as_deref()))
        .interact_text()
        .map_err(prompt_err)?;

    if config.profiles.contains_key(&profile_name)
        && !Confirm::new()
            .with_prompt(format!("Profile '{profile_name}' exists. Overwrite?"))
            .default(false)
            .interact()
            .map_err(prompt_err)?
    {
        return Ok(());
    }

    let api_id: i32 = Input::new()
        .with_prompt("API id")
        .validate_with(|id: &i32| {
            if *id > 0 {
                Ok(())
            } else {
                Err("must be a positive number")
            }
        })
        .interact_text()
        .map_err(prompt_err)?;

    let mut profile = Profile {
        api_id,
        ..Profile::default()
    };

    let hash_choices = &[
        "Read from an environment variable (recommended)",
        "Save to config file (plaintext)",
    ];
    let hash_selection = Select::new()
        .with_prompt("Where should the API hash come from?")
        .items(hash_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if hash_selection == 0 {
        let var: String = Input::new()
            .with_prompt("Environment variable")
            .default("TDLINK_API_HASH".into())
            .interact_text()
            .map_err(prompt_err)?;
        profile.api_hash_env = Some(var);
    } else {
        let hash = rpassword::prompt_password("API hash: ").map_err(prompt_err)?;
        if hash.trim().is_empty() {
            return Err(CliError::Validation {
                field: "api_hash".into(),
                reason: "API hash cannot be empty".into(),
            });
        }
        profile.api_hash = Some(hash.trim().to_owned());
    }

    let login_choices = &["User account (phone number)", "Bot (token)"];
    let login_selection = Select::new()
        .with_prompt("Account type")
        .items(login_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;
    if login_selection == 1 {
        let var: String = Input::new()
            .with_prompt("Environment variable holding the bot token")
            .default("TDLINK_BOT_TOKEN".into())
            .interact_text()
            .map_err(prompt_err)?;
        profile.bot_token_env = Some(var);
    }

    let database: String = Input::new()
        .with_prompt("Database directory")
        .default(format!("tdlib-{profile_name}"))
        .interact_text()
        .map_err(prompt_err)?;
    profile.database_directory = Some(database.into());
    profile.use_file_database = true;
    profile.use_chat_info_database = true;
    profile.use_message_database = true;

    if config.profiles.is_empty() {
        config.default_profile = Some(profile_name.clone());
    }
    config.profiles.insert(profile_name.clone(), profile);

    let path = tdlink_config::save_config(&config)?;
    output::print_success(
        &format!("Saved profile '{profile_name}' to {}", path.display()),
        global.color,
    );
    Ok(())
}

//! `tdlink login`: authorize the selected profile and report who we are.

use dialoguer::Input;
use secrecy::SecretString;

use tdlink_api::methods::GetMe;
use tdlink_core::{AuthError, Prompter};

use super::{Connection, interrupt_on_ctrl_c};
use crate::cli::{AuthArgs, GlobalOpts};
use crate::config::Session;
use crate::error::CliError;
use crate::output;

pub async fn handle(args: AuthArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let session = Session::load(global)?;
    let interrupt = interrupt_on_ctrl_c();

    let connection = Connection::authorized(&session, global, &args, &interrupt).await?;
    let me = connection.client.execute(&GetMe {}).await;
    connection.finish().await;

    let me = me?;
    output::print_success(
        &format!("Logged in with profile '{}'", session.profile_name),
        global.color,
    );
    output::print_output(&output::render_json(&me, global.output))?;
    Ok(())
}

// ── Terminal prompter ────────────────────────────────────────────────

/// Reads login data from the controlling terminal.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    async fn phone_number(&mut self) -> Result<SecretString, AuthError> {
        prompt_line("Phone number (international format)").await
    }

    async fn code(&mut self) -> Result<SecretString, AuthError> {
        prompt_line("Login code").await
    }

    async fn password(&mut self, hint: &str) -> Result<SecretString, AuthError> {
        let prompt = if hint.is_empty() {
            "Password: ".to_owned()
        } else {
            format!("Password (hint: {hint}): ")
        };
        blocking(move || rpassword::prompt_password(prompt).map_err(prompt_err)).await
    }
}

async fn prompt_line(prompt: &'static str) -> Result<SecretString, AuthError> {
    blocking(move || {
        Input::<String>::new()
            .with_prompt(prompt)
            .interact_text()
            .map_err(prompt_err)
    })
    .await
}

async fn blocking<F>(read: F) -> Result<SecretString, AuthError>
where
    F: FnOnce() -> Result<String, AuthError> + Send + 'static,
{
    let value = tokio::task::spawn_blocking(read)
        .await
        .map_err(prompt_err)??;
    Ok(SecretString::from(value.trim().to_owned()))
}

fn prompt_err(e: impl std::fmt::Display) -> AuthError {
    AuthError::Interaction(format!("prompt failed: {e}"))
}

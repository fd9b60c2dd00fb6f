//! Clap derive structures for the `tdlink` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tdlink -- drive a TDLib-style JSON engine from the command line
#[derive(Debug, Parser)]
#[command(
    name = "tdlink",
    version,
    about = "Log in, listen to updates, and call methods on a TDLib-style engine",
    long_about = "Talks to the engine through a bridge process that exchanges one JSON\n\
        object per line on stdin/stdout. Account settings live in named\n\
        profiles; see `tdlink config init`.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Account profile to use
    #[arg(long, short = 'p', env = "TDLINK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Bridge executable (overrides profile and defaults)
    #[arg(long, short = 'b', env = "TDLINK_BRIDGE", global = true)]
    pub bridge: Option<String>,

    /// Call timeout in seconds (overrides profile and defaults)
    #[arg(long, env = "TDLINK_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Output format for replies
    #[arg(long, short = 'o', default_value = "json", global = true)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Authorize the profile's account (interactively or with a bot token)
    Login(AuthArgs),

    /// Print incoming updates as JSON lines until interrupted
    Listen(ListenArgs),

    /// Send one raw JSON request and print the reply
    Call(CallArgs),

    /// Manage configuration profiles
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct AuthArgs {
    /// Log in as a bot with this token instead of the profile's
    #[arg(long, env = "TDLINK_BOT_TOKEN", hide_env_values = true)]
    pub bot_token: Option<String>,
}

#[derive(Debug, Args)]
pub struct ListenArgs {
    #[command(flatten)]
    pub auth: AuthArgs,

    /// Stop after this many updates
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

#[derive(Debug, Args)]
pub struct CallArgs {
    /// Request object, e.g. '{"@type":"getMe"}'
    pub request: String,

    /// Skip authorization (for methods that work before login)
    #[arg(long)]
    pub no_auth: bool,

    #[command(flatten)]
    pub auth: AuthArgs,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display the resolved configuration (secrets redacted)
    Show,

    /// Create a profile with guided setup
    Init,
}

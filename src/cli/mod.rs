//! CLI entry point for keyward.

pub mod auth;

use clap::{Parser, Subcommand};

/// Keyward session CLI
#[derive(Parser, Debug)]
#[command(name = "keyward", version, about = "Keyward session CLI")]
pub struct Cli {
    /// API base URL (overrides KEYWARD_BASE_URL)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Directory holding credentials.toml (overrides KEYWARD_CREDENTIALS_DIR)
    #[arg(long, global = true)]
    pub credentials_dir: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Session management
    Auth(AuthArgs),
}

/// Arguments for the `auth` subcommand group.
#[derive(Parser, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommands,
}

/// Auth subcommands.
#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Sign in with email and password
    Login(LoginArgs),
    /// Create an account
    Register(RegisterArgs),
    /// Show the stored session
    Status,
    /// Sign out and clear stored credentials
    Logout,
    /// Request a password reset email
    ForgotPassword(ForgotPasswordArgs),
    /// Set a new password with a reset token
    ResetPassword(ResetPasswordArgs),
    /// Fetch the signed-in profile from the server
    Whoami,
}

/// Arguments for `keyward auth login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Account email
    pub email: String,

    /// Password (prompted on stdin when omitted)
    #[arg(long)]
    pub password: Option<String>,
}

/// Arguments for `keyward auth register`.
#[derive(Parser, Debug)]
pub struct RegisterArgs {
    /// Display name
    #[arg(long)]
    pub name: String,

    /// Account email
    pub email: String,

    /// Password (prompted on stdin when omitted)
    #[arg(long)]
    pub password: Option<String>,
}

/// Arguments for `keyward auth forgot-password`.
#[derive(Parser, Debug)]
pub struct ForgotPasswordArgs {
    pub email: String,
}

/// Arguments for `keyward auth reset-password`.
#[derive(Parser, Debug)]
pub struct ResetPasswordArgs {
    /// Token from the reset email
    pub token: String,

    /// New password (prompted on stdin when omitted)
    #[arg(long)]
    pub password: Option<String>,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

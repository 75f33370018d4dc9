//! Keyward CLI binary entry point.

use clap::Parser;
use keyward::auth::Session;
use keyward::cli::{AuthCommands, Cli, Commands};
use keyward::config::KeywardConfig;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let session = match build_session(&cli) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Auth(auth_args) => match auth_args.command {
            AuthCommands::Login(args) => {
                keyward::cli::auth::handle_login(&session, &args.email, args.password).await
            }
            AuthCommands::Register(args) => {
                keyward::cli::auth::handle_register(&session, &args.name, &args.email, args.password)
                    .await
            }
            AuthCommands::Status => keyward::cli::auth::handle_status(&session).await,
            AuthCommands::Logout => keyward::cli::auth::handle_logout(&session).await,
            AuthCommands::ForgotPassword(args) => {
                keyward::cli::auth::handle_forgot_password(&session, &args.email).await
            }
            AuthCommands::ResetPassword(args) => {
                keyward::cli::auth::handle_reset_password(&session, &args.token, args.password)
                    .await
            }
            AuthCommands::Whoami => keyward::cli::auth::handle_whoami(&session).await,
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn build_session(cli: &Cli) -> keyward::error::Result<Session> {
    let mut config = KeywardConfig::from_env()?;
    if let Some(url) = &cli.base_url {
        config = config.with_base_url(url.clone());
    }
    if let Some(dir) = &cli.credentials_dir {
        config = config.with_credentials_dir(dir.clone());
    }
    Ok(Session::new(config)?)
}

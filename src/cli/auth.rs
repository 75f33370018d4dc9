//! CLI auth command handlers.

use std::io::Write;

use chrono::Utc;

use crate::auth::validation::validate_password_confirmation;
use crate::auth::Session;
use crate::error::KeywardError;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Handle `keyward auth login <email>`.
pub async fn handle_login(session: &Session, email: &str, password: Option<String>) -> CliResult {
    let password = password_or_prompt(password, "Password")?;
    let user = session
        .service
        .login(email, &password)
        .await
        .map_err(|err| KeywardError::InvalidArgument(err.user_message()))?;
    println!("✅ Logged in as {} <{}>", user.name, user.email);
    Ok(())
}

/// Handle `keyward auth register --name <name> <email>`.
pub async fn handle_register(
    session: &Session,
    name: &str,
    email: &str,
    password: Option<String>,
) -> CliResult {
    let password = match password {
        Some(password) => password,
        None => {
            let password = prompt("Password")?;
            let confirmation = prompt("Confirm password")?;
            validate_password_confirmation(&password, &confirmation)?;
            password
        }
    };
    let user = session
        .service
        .register(name, email, &password)
        .await
        .map_err(|err| KeywardError::InvalidArgument(err.user_message()))?;
    println!("✅ Registered and logged in as {} <{}>", user.name, user.email);
    Ok(())
}

/// Handle `keyward auth status`.
pub async fn handle_status(session: &Session) -> CliResult {
    println!("🔐 Session Status\n");
    println!("  API: {}", session.config.base_url);

    let Some(credentials) = session.vault.load() else {
        println!("  Session: ❌ Not logged in");
        return Ok(());
    };

    let status = match credentials.expires_at {
        Some(expires) if expires > Utc::now() => format!(
            "✅ Logged in (token expires {})",
            expires.format("%Y-%m-%d %H:%M")
        ),
        Some(_) => "⚠️  Token expired (will refresh on next request)".to_string(),
        None => "✅ Logged in".to_string(),
    };
    println!("  Session: {status}");
    println!(
        "  User: {} <{}>",
        credentials.user.name, credentials.user.email
    );
    println!(
        "  Last login: {}",
        credentials.last_login_at.format("%Y-%m-%d %H:%M")
    );
    if session.vault.push_token().is_some() {
        println!("  Push token: registered");
    }
    Ok(())
}

/// Handle `keyward auth logout`.
pub async fn handle_logout(session: &Session) -> CliResult {
    session.service.logout().await?;
    println!("✅ Logged out");
    Ok(())
}

/// Handle `keyward auth forgot-password <email>`.
pub async fn handle_forgot_password(session: &Session, email: &str) -> CliResult {
    session
        .service
        .forgot_password(email)
        .await
        .map_err(|err| KeywardError::InvalidArgument(err.user_message()))?;
    println!("📧 If an account exists for {email}, a reset link is on its way");
    Ok(())
}

/// Handle `keyward auth reset-password <token>`.
pub async fn handle_reset_password(
    session: &Session,
    token: &str,
    password: Option<String>,
) -> CliResult {
    let password = password_or_prompt(password, "New password")?;
    session
        .service
        .reset_password(token, &password)
        .await
        .map_err(|err| KeywardError::InvalidArgument(err.user_message()))?;
    println!("✅ Password updated; log in with the new password");
    Ok(())
}

/// Handle `keyward auth whoami`.
pub async fn handle_whoami(session: &Session) -> CliResult {
    let user = session
        .service
        .fetch_profile()
        .await
        .map_err(|err| KeywardError::InvalidArgument(err.user_message()))?;
    println!("{} <{}>", user.name, user.email);
    println!("  id: {}", user.id);
    if let Some(role) = &user.role {
        println!("  role: {role}");
    }
    println!(
        "  email verified: {}",
        if user.is_email_verified() { "yes" } else { "no" }
    );
    Ok(())
}

fn password_or_prompt(password: Option<String>, label: &str) -> Result<String, std::io::Error> {
    match password {
        Some(password) => Ok(password),
        None => prompt(label),
    }
}

fn prompt(label: &str) -> Result<String, std::io::Error> {
    print!("{label}: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

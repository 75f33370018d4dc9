use std::sync::Arc;

use super::api::{AuthApi, LoginRequest};
use super::error::AuthError;
use super::manager::{TokenManager, TokenState};
use super::token::{AuthGrant, UserProfile};
use super::validation;
use crate::config::KeywardConfig;
use crate::error::ErrorKind;

/// Account flows built on the token manager.
///
/// All I/O decisions (printing, prompting, exit codes) belong to the caller.
/// `AuthService` validates input, talks to the [`AuthApi`] and records the
/// outcome through the [`TokenManager`].
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use keyward::auth::{AuthService, CredentialVault, HttpAuthApi, InMemoryCredentialStore, TokenManager};
/// use keyward::config::KeywardConfig;
///
/// # async fn example() -> Result<(), keyward::auth::AuthError> {
/// let config = KeywardConfig::new();
/// let vault = Arc::new(CredentialVault::new(Arc::new(InMemoryCredentialStore::new())));
/// let api = Arc::new(HttpAuthApi::new(config.clone())?);
/// let manager = TokenManager::new(vault, api.clone(), &config);
/// let svc = AuthService::new(manager, api, config);
/// let user = svc.login("ada@example.com", "Secret123").await?;
/// println!("welcome {}", user.name);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AuthService {
    manager: TokenManager,
    api: Arc<dyn AuthApi>,
    config: KeywardConfig,
}

impl AuthService {
    pub fn new(manager: TokenManager, api: Arc<dyn AuthApi>, config: KeywardConfig) -> Self {
        Self {
            manager,
            api,
            config,
        }
    }

    pub fn manager(&self) -> &TokenManager {
        &self.manager
    }

    /// Sign in and start a session.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, AuthError> {
        validation::validate_login_form(email, password)?;
        let request = self.credentials_request(email, password, None)?;
        let grant = self.api.login(&request).await?;
        self.start_session(grant).await
    }

    /// Create an account and start a session.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, AuthError> {
        validation::validate_name(name)?;
        validation::validate_email(email)?;
        validation::validate_password(password)?;
        let request = self.credentials_request(email, password, Some(name.trim().to_string()))?;
        let grant = self.api.register(&request).await?;
        self.start_session(grant).await
    }

    /// End the session. The server is told on a best-effort basis; local
    /// credentials are cleared regardless.
    pub async fn logout(&self) -> Result<(), AuthError> {
        if let Some(token) = self.manager.vault().access_token() {
            if let Err(err) = self.api.logout(&token).await {
                tracing::warn!(error = %err, "remote logout failed; clearing local session anyway");
            }
        }
        self.manager.clear_tokens()
    }

    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        validation::validate_email(email)?;
        self.api.forgot_password(email.trim()).await
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::Validation("Reset token is required".to_string()));
        }
        validation::validate_password(new_password)?;
        self.api.reset_password(token.trim(), new_password).await
    }

    /// Profile stored with the session, without a network call.
    pub fn current_user(&self) -> Option<UserProfile> {
        self.manager.vault().user()
    }

    /// Profile fetched from the server. A rejected token is refreshed once.
    pub async fn fetch_profile(&self) -> Result<UserProfile, AuthError> {
        let token = self.manager.valid_token().await.ok_or(AuthError::NotLoggedIn)?;
        match self.api.current_user(&token).await {
            Err(err) if err.kind() == ErrorKind::Unauthorized => {
                self.manager.refresh().await?;
                let token = self.manager.valid_token().await.ok_or(AuthError::NotLoggedIn)?;
                self.api.current_user(&token).await
            }
            other => other,
        }
    }

    /// Remember the device push token and upload it when signed in.
    pub async fn save_push_token(&self, push_token: &str) -> Result<(), AuthError> {
        self.manager.vault().set_push_token(push_token)?;
        if let Some(access) = self.manager.valid_token().await {
            self.upload_push_token(&access, push_token).await;
        }
        Ok(())
    }

    pub fn is_logged_in(&self) -> bool {
        self.manager.state() == TokenState::Authenticated && self.manager.vault().is_authenticated()
    }

    async fn start_session(&self, grant: AuthGrant) -> Result<UserProfile, AuthError> {
        self.manager.update_tokens(&grant)?;
        if let Some(push_token) = self.manager.vault().push_token() {
            self.upload_push_token(&grant.access_token, &push_token).await;
        }
        tracing::info!(user_id = %grant.user.id, "session started");
        Ok(grant.user)
    }

    async fn upload_push_token(&self, access_token: &str, push_token: &str) {
        if let Err(err) = self.api.update_push_token(access_token, push_token).await {
            tracing::warn!(error = %err, "push token upload failed");
        }
    }

    fn credentials_request(
        &self,
        email: &str,
        password: &str,
        name: Option<String>,
    ) -> Result<LoginRequest, AuthError> {
        let device_id = match &self.config.device_id {
            Some(id) => id.clone(),
            None => self.manager.vault().device_id()?,
        };
        Ok(LoginRequest::builder()
            .email(email.trim().to_string())
            .password(password.to_string())
            .maybe_name(name)
            .device_name(self.config.device_name.clone())
            .device_id(device_id)
            .maybe_push_token(self.manager.vault().push_token())
            .build())
    }
}

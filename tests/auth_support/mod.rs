#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use keyward::auth::{
    AuthApi, AuthError, AuthGrant, CredentialVault, Credentials, InMemoryCredentialStore,
    LoginRequest, TokenManager, UserProfile,
};
use keyward::config::KeywardConfig;

pub fn user() -> UserProfile {
    UserProfile::new("user-1", "ada@example.com", "Ada")
}

pub fn grant(access_token: &str, expires_in: Option<i64>) -> AuthGrant {
    AuthGrant {
        access_token: access_token.to_string(),
        refresh_token: format!("{access_token}-refresh"),
        token_type: "Bearer".to_string(),
        expires_in,
        user: user(),
    }
}

pub fn credentials(access_token: &str) -> Credentials {
    Credentials::from_grant(&grant(access_token, Some(3600)), Utc::now())
}

/// Fake [`AuthApi`] with per-call scripts and counters.
///
/// Unscripted refreshes answer with `access-<n>` where `n` counts refresh
/// calls; unscripted profile fetches answer with [`user`].
#[derive(Default)]
pub struct ScriptedAuthApi {
    refresh_delay: Mutex<Duration>,
    refresh_panics: Mutex<bool>,
    refresh_script: Mutex<VecDeque<Result<AuthGrant, AuthError>>>,
    login_script: Mutex<VecDeque<Result<AuthGrant, AuthError>>>,
    profile_script: Mutex<VecDeque<Result<UserProfile, AuthError>>>,
    logout_error: Mutex<Option<AuthError>>,
    pub refresh_calls: AtomicUsize,
    pub login_calls: AtomicUsize,
    pub register_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
    pub refresh_tokens_seen: Mutex<Vec<String>>,
    pub profile_tokens_seen: Mutex<Vec<String>>,
    pub login_requests: Mutex<Vec<LoginRequest>>,
    pub pushed_tokens: Mutex<Vec<(String, String)>>,
    pub forgot_emails: Mutex<Vec<String>>,
    pub resets: Mutex<Vec<(String, String)>>,
}

impl ScriptedAuthApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_refresh_delay(self, delay: Duration) -> Self {
        *self.refresh_delay.lock().expect("lock") = delay;
        self
    }

    pub fn with_panicking_refresh(self) -> Self {
        *self.refresh_panics.lock().expect("lock") = true;
        self
    }

    pub fn script_refresh(&self, result: Result<AuthGrant, AuthError>) {
        self.refresh_script.lock().expect("lock").push_back(result);
    }

    pub fn script_login(&self, result: Result<AuthGrant, AuthError>) {
        self.login_script.lock().expect("lock").push_back(result);
    }

    pub fn script_profile(&self, result: Result<UserProfile, AuthError>) {
        self.profile_script.lock().expect("lock").push_back(result);
    }

    pub fn fail_logout(&self, error: AuthError) {
        *self.logout_error.lock().expect("lock") = Some(error);
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn next_grant(&self, script: &Mutex<VecDeque<Result<AuthGrant, AuthError>>>, fallback: &str)
        -> Result<AuthGrant, AuthError>
    {
        script
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| Ok(grant(fallback, Some(3600))))
    }
}

#[async_trait]
impl AuthApi for ScriptedAuthApi {
    async fn login(&self, request: &LoginRequest) -> Result<AuthGrant, AuthError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.login_requests.lock().expect("lock").push(request.clone());
        self.next_grant(&self.login_script, "login-access")
    }

    async fn register(&self, request: &LoginRequest) -> Result<AuthGrant, AuthError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        self.login_requests.lock().expect("lock").push(request.clone());
        self.next_grant(&self.login_script, "register-access")
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthGrant, AuthError> {
        let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.refresh_tokens_seen
            .lock()
            .expect("lock")
            .push(refresh_token.to_string());
        let delay = *self.refresh_delay.lock().expect("lock");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if *self.refresh_panics.lock().expect("lock") {
            panic!("refresh backend exploded");
        }
        self.next_grant(&self.refresh_script, &format!("access-{call}"))
    }

    async fn logout(&self, _access_token: &str) -> Result<(), AuthError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        match self.logout_error.lock().expect("lock").clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        self.forgot_emails.lock().expect("lock").push(email.to_string());
        Ok(())
    }

    async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        self.resets
            .lock()
            .expect("lock")
            .push((token.to_string(), new_password.to_string()));
        Ok(())
    }

    async fn current_user(&self, access_token: &str) -> Result<UserProfile, AuthError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.profile_tokens_seen
            .lock()
            .expect("lock")
            .push(access_token.to_string());
        self.profile_script
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| Ok(user()))
    }

    async fn update_push_token(&self, access_token: &str, push_token: &str) -> Result<(), AuthError> {
        self.pushed_tokens
            .lock()
            .expect("lock")
            .push((access_token.to_string(), push_token.to_string()));
        Ok(())
    }
}

/// Manager over an in-memory vault, optionally pre-seeded with a session.
pub fn manager_with(
    api: Arc<ScriptedAuthApi>,
    seeded: Option<Credentials>,
    config: &KeywardConfig,
) -> TokenManager {
    let store = match seeded {
        Some(credentials) => InMemoryCredentialStore::with_credentials(credentials),
        None => InMemoryCredentialStore::new(),
    };
    let vault = Arc::new(CredentialVault::new(Arc::new(store)));
    let manager = TokenManager::new(vault, api, config);
    manager.initialize();
    manager
}

pub fn logged_in_manager(api: Arc<ScriptedAuthApi>, access_token: &str) -> TokenManager {
    manager_with(api, Some(credentials(access_token)), &KeywardConfig::new())
}

//! Token state machine and single-flight refresh coordination.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use strum::Display;
use tokio::sync::{oneshot, watch};

use super::api::AuthApi;
use super::error::AuthError;
use super::token::{AuthGrant, Credentials};
use super::vault::CredentialVault;
use crate::config::KeywardConfig;

/// Whether a usable access token exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TokenState {
    Loading,
    Authenticated,
    Unauthenticated,
}

/// Result shared by every waiter of one refresh round.
pub type RefreshOutcome = Result<(), AuthError>;

/// Single source of truth for the access token and sole owner of refresh.
///
/// Cloning is cheap; clones share state.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use keyward::auth::{CredentialVault, HttpAuthApi, InMemoryCredentialStore, TokenManager};
/// use keyward::config::KeywardConfig;
///
/// # async fn example() -> Result<(), keyward::auth::AuthError> {
/// let config = KeywardConfig::new();
/// let vault = Arc::new(CredentialVault::new(Arc::new(InMemoryCredentialStore::new())));
/// let api = Arc::new(HttpAuthApi::new(config.clone())?);
/// let manager = TokenManager::new(vault, api, &config);
/// manager.initialize();
/// if let Some(token) = manager.valid_token().await {
///     println!("bearer {token}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<Inner>,
}

struct Inner {
    vault: Arc<CredentialVault>,
    api: Arc<dyn AuthApi>,
    state: watch::Sender<TokenState>,
    refresh: Mutex<RefreshSlot>,
    /// Bumped by every login and logout; serializes session-level writes.
    session: Mutex<u64>,
    rounds: AtomicU64,
    refresh_buffer: chrono::Duration,
    proactive_refresh: bool,
}

/// In-flight flag plus the waiters registered for the current round.
#[derive(Default)]
struct RefreshSlot {
    in_flight: bool,
    next_waiter: u64,
    waiters: Vec<(u64, oneshot::Sender<RefreshOutcome>)>,
}

impl TokenManager {
    pub fn new(vault: Arc<CredentialVault>, api: Arc<dyn AuthApi>, config: &KeywardConfig) -> Self {
        let (state, _) = watch::channel(TokenState::Loading);
        let refresh_buffer =
            chrono::Duration::from_std(config.refresh_buffer).unwrap_or(chrono::Duration::MAX);
        Self {
            inner: Arc::new(Inner {
                vault,
                api,
                state,
                refresh: Mutex::new(RefreshSlot::default()),
                session: Mutex::new(0),
                rounds: AtomicU64::new(0),
                refresh_buffer,
                proactive_refresh: config.proactive_refresh,
            }),
        }
    }

    /// Resolve `Loading` from whatever the vault holds.
    pub fn initialize(&self) -> TokenState {
        let _session = self.inner.session();
        let state = if self.inner.vault.is_authenticated() {
            TokenState::Authenticated
        } else {
            TokenState::Unauthenticated
        };
        self.inner.set_state(state);
        state
    }

    pub fn state(&self) -> TokenState {
        *self.inner.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<TokenState> {
        self.inner.state.subscribe()
    }

    pub fn vault(&self) -> &Arc<CredentialVault> {
        &self.inner.vault
    }

    pub fn api(&self) -> &Arc<dyn AuthApi> {
        &self.inner.api
    }

    /// Number of refresh rounds that have reached the network.
    pub fn refresh_count(&self) -> u64 {
        self.inner.rounds.load(Ordering::SeqCst)
    }

    /// The stored access token when authenticated, otherwise `None`.
    ///
    /// With proactive refresh enabled, a token inside the refresh buffer of
    /// its known expiry is refreshed first (joining any round in flight).
    pub async fn valid_token(&self) -> Option<String> {
        if self.state() != TokenState::Authenticated {
            return None;
        }
        let credentials = self.inner.vault.load()?;
        if self.inner.proactive_refresh
            && credentials.needs_refresh(Utc::now(), self.inner.refresh_buffer)
        {
            tracing::debug!("access token inside refresh buffer; refreshing before use");
            self.refresh().await.ok()?;
            return self.inner.vault.access_token();
        }
        Some(credentials.access_token)
    }

    /// Refresh the access token, sharing one network call across callers.
    ///
    /// The first caller starts a round in a background task so it runs to
    /// completion even if that caller is dropped. Every caller, the first
    /// included, waits on its own channel and receives the same outcome.
    /// Dropping a waiter removes it from the round without affecting it.
    pub async fn refresh(&self) -> RefreshOutcome {
        let (id, receiver) = {
            let mut slot = self.inner.slot();
            let start = !slot.in_flight;
            slot.in_flight = true;
            let id = slot.next_waiter;
            slot.next_waiter += 1;
            let (sender, receiver) = oneshot::channel();
            slot.waiters.push((id, sender));
            if start {
                let inner = self.inner.clone();
                tokio::spawn(async move { inner.run_round().await });
            }
            (id, receiver)
        };

        let _guard = WaiterGuard {
            inner: &self.inner,
            id,
        };
        receiver
            .await
            .unwrap_or_else(|_| Err(AuthError::Unknown("refresh round abandoned".to_string())))
    }

    /// Persist a fresh grant (login or registration) and mark authenticated.
    ///
    /// Starts a new session: a refresh round already in flight will not
    /// overwrite or clear it.
    pub fn update_tokens(&self, grant: &AuthGrant) -> Result<(), AuthError> {
        let credentials = Credentials::from_grant(grant, Utc::now());
        let mut session = self.inner.session();
        self.inner.vault.save(&credentials)?;
        *session += 1;
        self.inner.set_state(TokenState::Authenticated);
        Ok(())
    }

    /// Drop the session. Idempotent; the state is unauthenticated even if
    /// the store could not be written. A refresh round in flight is
    /// discarded when it completes.
    pub fn clear_tokens(&self) -> Result<(), AuthError> {
        let mut session = self.inner.session();
        *session += 1;
        let result = self.inner.vault.clear();
        self.inner.set_state(TokenState::Unauthenticated);
        drop(session);
        if let Err(err) = &result {
            tracing::warn!(error = %err, "failed to clear stored credentials");
        }
        result
    }
}

impl Inner {
    fn slot(&self) -> MutexGuard<'_, RefreshSlot> {
        self.refresh
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn session(&self) -> MutexGuard<'_, u64> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: TokenState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            tracing::debug!(from = %current, to = %state, "token state changed");
            *current = state;
            true
        });
    }

    async fn run_round(self: Arc<Self>) {
        let (generation, current) = {
            let session = self.session();
            (*session, self.vault.load())
        };
        let attempt = AssertUnwindSafe(self.request_refresh(current))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(AuthError::Unknown("refresh panicked".to_string())));
        let outcome = self.commit(generation, attempt);

        let waiters = {
            let mut slot = self.slot();
            slot.in_flight = false;
            std::mem::take(&mut slot.waiters)
        };
        tracing::debug!(waiters = waiters.len(), ok = outcome.is_ok(), "refresh round finished");
        for (_, sender) in waiters {
            let _ = sender.send(outcome.clone());
        }
    }

    async fn request_refresh(&self, current: Option<Credentials>) -> Result<Credentials, AuthError> {
        let current = current.ok_or(AuthError::NotLoggedIn)?;
        self.rounds.fetch_add(1, Ordering::SeqCst);
        tracing::info!("refreshing access token");
        let grant = self.api.refresh(&current.refresh_token).await?;
        Ok(current.refreshed(&grant, Utc::now()))
    }

    /// Apply a finished round, unless a login or logout started a new
    /// session while it ran. A superseded round reports the new session:
    /// success when it is logged in, `NotLoggedIn` otherwise.
    fn commit(&self, generation: u64, attempt: Result<Credentials, AuthError>) -> RefreshOutcome {
        let session = self.session();
        if *session != generation {
            let authenticated = self.vault.is_authenticated();
            tracing::debug!(authenticated, "session changed during refresh; discarding result");
            return if authenticated {
                Ok(())
            } else {
                Err(AuthError::NotLoggedIn)
            };
        }

        match attempt.and_then(|refreshed| self.vault.save(&refreshed)) {
            Ok(()) => {
                self.set_state(TokenState::Authenticated);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, kind = %err.kind(), "token refresh failed; ending session");
                if let Err(clear_err) = self.vault.clear() {
                    tracing::warn!(error = %clear_err, "failed to clear credentials after refresh failure");
                }
                self.set_state(TokenState::Unauthenticated);
                Err(err)
            }
        }
    }
}

/// Removes a cancelled waiter from the current round.
struct WaiterGuard<'a> {
    inner: &'a Inner,
    id: u64,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self.inner.slot();
        slot.waiters.retain(|(waiter, _)| *waiter != self.id);
    }
}

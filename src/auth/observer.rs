//! UI-facing projection of the session.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;

use super::api::AuthApi;
use super::error::AuthError;
use super::manager::{TokenManager, TokenState};
use super::token::UserProfile;
use super::vault::CredentialVault;
use crate::error::ErrorKind;

/// Authentication state as presented to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum AuthState {
    Initial,
    Loading,
    Authenticated(UserProfile),
    Unauthenticated,
    Error(String),
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    pub fn current_user(&self) -> Option<&UserProfile> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

/// Publishes [`AuthState`] updates driven by vault and token-state changes.
///
/// A background task re-evaluates the session whenever the token state
/// moves, the stored access token changes, or [`refresh`](Self::refresh) is
/// called. A rejected profile fetch triggers at most one token refresh per
/// evaluation. The task stops when the observer is dropped.
pub struct AuthStateObserver {
    state: Arc<watch::Sender<AuthState>>,
    reevaluate: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
}

impl AuthStateObserver {
    /// Start observing. Must be called inside a tokio runtime.
    pub fn spawn(
        manager: TokenManager,
        vault: Arc<CredentialVault>,
        api: Arc<dyn AuthApi>,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::Initial);
        let state = Arc::new(state);
        let (reevaluate, requests) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_observer(
            Projection {
                manager,
                vault,
                api,
                state: state.clone(),
            },
            requests,
        ));
        Self {
            state,
            reevaluate,
            task,
        }
    }

    pub fn current(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Stream of states, starting with the current one.
    pub fn stream(&self) -> WatchStream<AuthState> {
        WatchStream::new(self.subscribe())
    }

    /// Emit `Loading` and re-check the session.
    pub fn refresh(&self) {
        publish(&self.state, AuthState::Loading);
        let _ = self.reevaluate.send(());
    }

    /// Emit `Unauthenticated` without touching storage.
    pub fn clear(&self) {
        publish(&self.state, AuthState::Unauthenticated);
    }

    pub fn set_error(&self, message: impl Into<String>) {
        publish(&self.state, AuthState::Error(message.into()));
    }
}

impl Drop for AuthStateObserver {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Projection {
    manager: TokenManager,
    vault: Arc<CredentialVault>,
    api: Arc<dyn AuthApi>,
    state: Arc<watch::Sender<AuthState>>,
}

async fn run_observer(projection: Projection, mut requests: mpsc::UnboundedReceiver<()>) {
    let mut tokens = projection.manager.subscribe();
    let mut stored = projection.vault.subscribe();
    let _ = tokens.borrow_and_update();
    let _ = stored.borrow_and_update();

    let mut evaluated = projection.evaluate().await;
    loop {
        tokio::select! {
            changed = tokens.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = stored.changed() => {
                if changed.is_err() {
                    break;
                }
                // Writes that leave the access token alone (push token, a
                // rotation this task already evaluated) need no new fetch.
                let _ = stored.borrow_and_update();
                if projection.vault.access_token() == evaluated {
                    continue;
                }
            }
            request = requests.recv() => {
                if request.is_none() {
                    break;
                }
            }
        }
        let _ = tokens.borrow_and_update();
        let _ = stored.borrow_and_update();
        evaluated = projection.evaluate().await;
    }
}

impl Projection {
    /// Publish the current projection and return the access token it was
    /// built from.
    async fn evaluate(&self) -> Option<String> {
        let (next, token) = match self.manager.state() {
            TokenState::Loading => (AuthState::Loading, None),
            TokenState::Unauthenticated => (AuthState::Unauthenticated, None),
            TokenState::Authenticated => self.authenticated_state().await,
        };
        publish(&self.state, next);
        token
    }

    async fn authenticated_state(&self) -> (AuthState, Option<String>) {
        let Some(token) = self.manager.valid_token().await else {
            return (AuthState::Unauthenticated, None);
        };
        match self.api.current_user(&token).await {
            Ok(user) => (AuthState::Authenticated(user), Some(token)),
            Err(err) if err.kind() == ErrorKind::Unauthorized => self.retry_after_refresh().await,
            Err(err) => (failure(err), Some(token)),
        }
    }

    /// One refresh-and-retry for a rejected profile fetch.
    async fn retry_after_refresh(&self) -> (AuthState, Option<String>) {
        if self.manager.refresh().await.is_err() {
            return (AuthState::Unauthenticated, None);
        }
        let Some(token) = self.manager.valid_token().await else {
            return (AuthState::Unauthenticated, None);
        };
        match self.api.current_user(&token).await {
            Ok(user) => (AuthState::Authenticated(user), Some(token)),
            Err(err) => (failure(err), Some(token)),
        }
    }
}

fn failure(err: AuthError) -> AuthState {
    tracing::debug!(error = %err, kind = %err.kind(), "profile fetch failed");
    AuthState::Error(err.user_message())
}

fn publish(state: &watch::Sender<AuthState>, next: AuthState) {
    state.send_if_modified(|current| {
        if *current == next {
            return false;
        }
        *current = next;
        true
    });
}

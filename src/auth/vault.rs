//! Fail-closed façade over a [`CredentialStore`].

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::error::AuthError;
use super::store::{CredentialStore, StoredCredentials};
use super::token::{Credentials, UserProfile};

/// Secure credential access for the session layer.
///
/// Reads never fail: if the backing store cannot be read (missing key,
/// corrupt file) the vault reports "no credentials" and logs a warning.
/// After the first successful load, reads are served from an in-memory copy
/// that every write through the vault keeps current, so the request path
/// does not touch the store. Every read-modify-write runs under one lock,
/// so concurrent readers never observe a half-written record. Subscribers
/// are told whenever the authenticated flag may have changed.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use keyward::auth::{CredentialVault, InMemoryCredentialStore};
///
/// let vault = CredentialVault::new(Arc::new(InMemoryCredentialStore::new()));
/// assert!(vault.load().is_none());
/// ```
pub struct CredentialVault {
    store: Arc<dyn CredentialStore>,
    cache: Mutex<Option<StoredCredentials>>,
    changes: watch::Sender<bool>,
}

impl CredentialVault {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        let cached = match store.load() {
            Ok(stored) => Some(stored),
            Err(err) => {
                tracing::warn!(error = %err, "credential store unreadable; treating as empty");
                None
            }
        };
        let authenticated = cached
            .as_ref()
            .is_some_and(|stored| stored.credentials.is_some());
        let (changes, _) = watch::channel(authenticated);
        Self {
            store,
            cache: Mutex::new(cached),
            changes,
        }
    }

    /// Persist a full credential record, keeping device-scoped fields.
    pub fn save(&self, credentials: &Credentials) -> Result<(), AuthError> {
        self.update(|stored| stored.credentials = Some(credentials.clone()))
    }

    /// Current credential record, or `None` when logged out or unreadable.
    pub fn load(&self) -> Option<Credentials> {
        let mut cache = self.guard();
        self.read(&mut cache).credentials
    }

    /// Remove the credential record. The push token and device id survive.
    pub fn clear(&self) -> Result<(), AuthError> {
        self.update(|stored| stored.credentials = None)
    }

    /// Remove everything, including device-scoped fields.
    pub fn wipe(&self) -> Result<(), AuthError> {
        let mut cache = self.guard();
        if let Err(err) = self.store.clear() {
            *cache = None;
            return Err(err);
        }
        *cache = Some(StoredCredentials::default());
        drop(cache);
        self.changes.send_replace(false);
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.load().is_some()
    }

    pub fn access_token(&self) -> Option<String> {
        self.load().map(|creds| creds.access_token)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.load().map(|creds| creds.refresh_token)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.load().and_then(|creds| creds.expires_at)
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.load().map(|creds| creds.user)
    }

    pub fn last_login_at(&self) -> Option<DateTime<Utc>> {
        self.load().map(|creds| creds.last_login_at)
    }

    pub fn push_token(&self) -> Option<String> {
        let mut cache = self.guard();
        self.read(&mut cache).push_token
    }

    pub fn set_push_token(&self, token: impl Into<String>) -> Result<(), AuthError> {
        let token = token.into();
        self.update(|stored| stored.push_token = Some(token))
    }

    /// Stable per-installation identifier, created on first use.
    pub fn device_id(&self) -> Result<String, AuthError> {
        let mut cache = self.guard();
        let mut stored = self.read(&mut cache);
        if let Some(id) = stored.device_id.clone() {
            return Ok(id);
        }
        let id = uuid::Uuid::new_v4().to_string();
        stored.device_id = Some(id.clone());
        self.write(&mut cache, stored)?;
        Ok(id)
    }

    /// Receiver for the authenticated flag; updated after every write.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.changes.subscribe()
    }

    fn update(&self, apply: impl FnOnce(&mut StoredCredentials)) -> Result<(), AuthError> {
        let mut cache = self.guard();
        let mut stored = self.read(&mut cache);
        apply(&mut stored);
        let authenticated = stored.credentials.is_some();
        self.write(&mut cache, stored)?;
        drop(cache);
        // Always notify: a token rotation keeps the flag but still changes the record.
        self.changes.send_replace(authenticated);
        Ok(())
    }

    /// Cached record, loading it from the store on a miss. Failed loads are
    /// not cached so the next read tries the store again.
    fn read(&self, cache: &mut Option<StoredCredentials>) -> StoredCredentials {
        if let Some(stored) = cache.as_ref() {
            return stored.clone();
        }
        match self.store.load() {
            Ok(stored) => {
                *cache = Some(stored.clone());
                stored
            }
            Err(err) => {
                tracing::warn!(error = %err, "credential store unreadable; treating as empty");
                StoredCredentials::default()
            }
        }
    }

    fn write(
        &self,
        cache: &mut Option<StoredCredentials>,
        stored: StoredCredentials,
    ) -> Result<(), AuthError> {
        match self.store.save(&stored) {
            Ok(()) => {
                *cache = Some(stored);
                Ok(())
            }
            Err(err) => {
                *cache = None;
                Err(err)
            }
        }
    }

    fn guard(&self) -> MutexGuard<'_, Option<StoredCredentials>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

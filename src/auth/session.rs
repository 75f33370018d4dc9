use std::sync::Arc;

use super::api::{AuthApi, HttpAuthApi};
use super::authorizer::Authorizer;
use super::error::AuthError;
use super::manager::TokenManager;
use super::observer::AuthStateObserver;
use super::service::AuthService;
use super::store::{CredentialStore, FileCredentialStore};
use super::vault::CredentialVault;
use crate::config::KeywardConfig;

/// Every session component wired from one [`KeywardConfig`].
///
/// # Example
/// ```no_run
/// use keyward::auth::Session;
/// use keyward::config::KeywardConfig;
///
/// # async fn example() -> keyward::error::Result<()> {
/// let session = Session::new(KeywardConfig::from_env()?)?;
/// if session.service.is_logged_in() {
///     let response = session.authorizer.send(session.authorizer.get("journal/entries")).await?;
///     println!("{}", response.status());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Session {
    pub config: KeywardConfig,
    pub vault: Arc<CredentialVault>,
    pub api: Arc<dyn AuthApi>,
    pub manager: TokenManager,
    pub authorizer: Authorizer,
    pub service: AuthService,
}

impl Session {
    /// File-backed credentials under `config.credentials_dir`, HTTP auth client.
    pub fn new(config: KeywardConfig) -> Result<Self, AuthError> {
        let store = Arc::new(FileCredentialStore::new(config.store_config()));
        let api = Arc::new(HttpAuthApi::new(config.clone())?);
        Self::with_parts(config, store, api)
    }

    /// Wire custom backends; the manager is initialized from the store.
    pub fn with_parts(
        config: KeywardConfig,
        store: Arc<dyn CredentialStore>,
        api: Arc<dyn AuthApi>,
    ) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| AuthError::Unknown(format!("failed to build HTTP client: {err}")))?;
        let vault = Arc::new(CredentialVault::new(store));
        let manager = TokenManager::new(vault.clone(), api.clone(), &config);
        manager.initialize();
        let authorizer = Authorizer::new(client, manager.clone(), config.clone());
        let service = AuthService::new(manager.clone(), api.clone(), config.clone());
        Ok(Self {
            config,
            vault,
            api,
            manager,
            authorizer,
            service,
        })
    }

    /// Start an [`AuthStateObserver`] for this session.
    pub fn observe(&self) -> AuthStateObserver {
        AuthStateObserver::spawn(self.manager.clone(), self.vault.clone(), self.api.clone())
    }
}

//! Credential storage, token refresh and request authorization.

pub mod api;
pub mod authorizer;
pub mod error;
pub mod manager;
pub mod observer;
pub mod service;
pub mod session;
pub mod store;
pub mod token;
pub mod validation;
pub mod vault;

pub use api::{AuthApi, HttpAuthApi, LoginRequest};
pub use authorizer::Authorizer;
pub use error::AuthError;
pub use manager::{RefreshOutcome, TokenManager, TokenState};
pub use observer::{AuthState, AuthStateObserver};
pub use service::AuthService;
pub use session::Session;
pub use store::{
    CredentialStore, CredentialStoreConfig, FileCredentialStore, InMemoryCredentialStore,
    StoredCredentials,
};
pub use token::{AuthGrant, Credentials, UserProfile};
pub use vault::CredentialVault;

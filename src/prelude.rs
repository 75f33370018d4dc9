//! Convenience re-exports for common use.

pub use crate::auth::{
    AuthError, AuthService, AuthState, AuthStateObserver, Authorizer, CredentialVault,
    Session, TokenManager, TokenState, UserProfile,
};
pub use crate::config::KeywardConfig;
pub use crate::error::{ErrorKind, KeywardError, Result};

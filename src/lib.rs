//! Keyward: client-side session core.
//!
//! Persists credentials, keeps the access token fresh with a single shared
//! refresh per expiry, and authorizes outgoing requests (retrying once after
//! a 401). A watch-based observable projects the session for UI code.
//!
//! # Quick Start
//!
//! ```no_run
//! use keyward::prelude::*;
//!
//! # async fn example() -> keyward::error::Result<()> {
//! let session = Session::new(KeywardConfig::from_env()?)?;
//! session.service.login("ada@example.com", "Secret123").await?;
//! let response = session.authorizer.send(session.authorizer.get("auth/me")).await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod prelude;

#[cfg(feature = "cli")]
pub mod cli;

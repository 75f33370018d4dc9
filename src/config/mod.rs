//! Session configuration (explicit context object; code > env > defaults).

use std::path::PathBuf;
use std::time::Duration;

use crate::auth::store::CredentialStoreConfig;
use crate::error::KeywardError;

pub const DEFAULT_BASE_URL: &str = "https://api.mindshield.app/api/v1/";

/// Endpoints that must never carry a bearer token.
pub const DEFAULT_UNAUTHENTICATED_PATHS: &[&str] = &[
    "auth/login",
    "auth/register",
    "auth/refresh",
    "auth/password/forgot",
    "auth/password/reset",
];

/// Configuration passed to every session component at construction.
///
/// There is no global instance; build one (usually via [`KeywardConfig::from_env`])
/// and hand it to [`crate::auth::Session::new`] or the individual components.
#[derive(Debug, Clone)]
pub struct KeywardConfig {
    pub base_url: String,
    pub credentials_dir: PathBuf,
    pub request_timeout: Duration,
    pub refresh_buffer: Duration,
    pub proactive_refresh: bool,
    pub device_name: String,
    /// Fixed device identifier; when unset one is generated and persisted.
    pub device_id: Option<String>,
    pub unauthenticated_paths: Vec<String>,
}

impl Default for KeywardConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywardConfig {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            credentials_dir: CredentialStoreConfig::default_dir(),
            request_timeout: Duration::from_secs(30),
            refresh_buffer: Duration::from_secs(5 * 60),
            proactive_refresh: true,
            device_name: "keyward".to_string(),
            device_id: None,
            unauthenticated_paths: DEFAULT_UNAUTHENTICATED_PATHS
                .iter()
                .map(|path| path.to_string())
                .collect(),
        }
    }

    /// Load overrides from environment variables (and `.env` if present).
    ///
    /// Unparseable numeric or boolean values are reported rather than
    /// silently ignored.
    pub fn from_env() -> Result<Self, KeywardError> {
        let _ = dotenvy::dotenv();
        let mut config = Self::new();

        if let Ok(url) = std::env::var("KEYWARD_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(dir) = std::env::var("KEYWARD_CREDENTIALS_DIR") {
            config.credentials_dir = PathBuf::from(dir);
        }
        if let Some(secs) = env_parse::<u64>("KEYWARD_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("KEYWARD_REFRESH_BUFFER_SECS")? {
            let buffer = Duration::from_secs(secs);
            if chrono::Duration::from_std(buffer).is_err() {
                return Err(KeywardError::Configuration(format!(
                    "KEYWARD_REFRESH_BUFFER_SECS is out of range: {secs}"
                )));
            }
            config.refresh_buffer = buffer;
        }
        if let Some(enabled) = env_parse::<bool>("KEYWARD_PROACTIVE_REFRESH")? {
            config.proactive_refresh = enabled;
        }
        if let Ok(name) = std::env::var("KEYWARD_DEVICE_NAME") {
            config.device_name = name;
        }
        if let Ok(id) = std::env::var("KEYWARD_DEVICE_ID") {
            config.device_id = Some(id);
        }

        Ok(config)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_credentials_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.credentials_dir = dir.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_refresh_buffer(mut self, buffer: Duration) -> Self {
        self.refresh_buffer = buffer;
        self
    }

    pub fn with_proactive_refresh(mut self, enabled: bool) -> Self {
        self.proactive_refresh = enabled;
        self
    }

    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    pub fn with_device_id(mut self, id: impl Into<String>) -> Self {
        self.device_id = Some(id.into());
        self
    }

    pub fn with_unauthenticated_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unauthenticated_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Resolve a relative endpoint path against the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Whether the URL path targets an endpoint that must stay unauthenticated.
    pub fn is_unauthenticated_path(&self, path: &str) -> bool {
        let path = path.trim_end_matches('/').to_ascii_lowercase();
        self.unauthenticated_paths.iter().any(|allowed| {
            let allowed = allowed.trim_matches('/').to_ascii_lowercase();
            path == allowed || path.ends_with(&format!("/{allowed}"))
        })
    }

    pub fn store_config(&self) -> CredentialStoreConfig {
        CredentialStoreConfig::new(self.credentials_dir.clone())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, KeywardError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| KeywardError::Configuration(format!("{key} has invalid value {raw:?}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slashes() {
        let config = KeywardConfig::new().with_base_url("http://localhost:8080/api/");
        assert_eq!(
            config.endpoint("/auth/login"),
            "http://localhost:8080/api/auth/login"
        );
        let config = KeywardConfig::new().with_base_url("http://localhost:8080");
        assert_eq!(config.endpoint("auth/me"), "http://localhost:8080/auth/me");
    }

    #[test]
    fn allowlist_matches_whole_trailing_segments() {
        let config = KeywardConfig::new();
        assert!(config.is_unauthenticated_path("/api/v1/auth/login"));
        assert!(config.is_unauthenticated_path("/auth/refresh/"));
        assert!(config.is_unauthenticated_path("/API/AUTH/REGISTER"));
        assert!(config.is_unauthenticated_path("/auth/password/reset"));
        assert!(!config.is_unauthenticated_path("/auth/me"));
        assert!(!config.is_unauthenticated_path("/journal/login-history"));
        assert!(!config.is_unauthenticated_path("/auth/logout"));
    }

    #[test]
    fn custom_allowlist_replaces_default() {
        let config = KeywardConfig::new().with_unauthenticated_paths(["public/status"]);
        assert!(config.is_unauthenticated_path("/v2/public/status"));
        assert!(!config.is_unauthenticated_path("/auth/login"));
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = KeywardConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.refresh_buffer, Duration::from_secs(300));
        assert!(config.proactive_refresh);
        assert_eq!(config.unauthenticated_paths.len(), 5);
    }

    #[test]
    fn env_parse_reports_bad_values() {
        std::env::set_var("KEYWARD_TEST_BAD_BOOL", "maybe");
        let result = env_parse::<bool>("KEYWARD_TEST_BAD_BOOL");
        assert!(matches!(result, Err(KeywardError::Configuration(msg)) if msg.contains("maybe")));
        std::env::remove_var("KEYWARD_TEST_BAD_BOOL");
        assert!(env_parse::<bool>("KEYWARD_TEST_BAD_BOOL").unwrap().is_none());
    }
}

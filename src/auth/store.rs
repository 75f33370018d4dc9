use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::token::Credentials;

const CREDENTIAL_FILE_NAME: &str = "credentials.toml";
const CREDENTIAL_FILE_VERSION: u32 = 1;

/// Everything the session layer persists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

/// Storage abstraction for the persisted credential set.
///
/// Implementations replace the whole set on `save`; partial writes must
/// never be visible to `load`.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<StoredCredentials, AuthError>;
    fn save(&self, stored: &StoredCredentials) -> Result<(), AuthError>;
    fn clear(&self) -> Result<(), AuthError>;
}

/// Configuration for file-backed credential storage.
#[derive(Debug, Clone)]
pub struct CredentialStoreConfig {
    pub base_dir: PathBuf,
}

impl CredentialStoreConfig {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn default_dir() -> PathBuf {
        default_keyward_dir()
    }
}

/// File-backed credential store using a single TOML file.
///
/// Writes go to a temporary sibling and are renamed into place, so a
/// crash mid-write leaves the previous record intact. On Unix the file is
/// created with mode `0600`.
///
/// # Example
/// ```no_run
/// use keyward::auth::{CredentialStore, FileCredentialStore, StoredCredentials};
///
/// let store = FileCredentialStore::new_default();
/// store.save(&StoredCredentials::default())?;
/// # Ok::<(), keyward::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    base_dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(config: CredentialStoreConfig) -> Self {
        Self {
            base_dir: config.base_dir,
        }
    }

    pub fn new_default() -> Self {
        Self {
            base_dir: default_keyward_dir(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.base_dir.join(CREDENTIAL_FILE_NAME)
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<StoredCredentials, AuthError> {
        let path = self.path();
        let raw = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoredCredentials::default())
            }
            Err(err) => return Err(AuthError::Storage(err.to_string())),
        };
        let file: CredentialFile = toml::from_str(&raw)?;
        if file.version != CREDENTIAL_FILE_VERSION {
            return Err(AuthError::Storage(format!(
                "unsupported credential file version {} at {}",
                file.version,
                path.display()
            )));
        }
        Ok(file.stored)
    }

    fn save(&self, stored: &StoredCredentials) -> Result<(), AuthError> {
        let file = CredentialFile {
            version: CREDENTIAL_FILE_VERSION,
            saved_at: Utc::now(),
            stored: stored.clone(),
        };
        let serialized = toml::to_string(&file)?;
        atomic_write(&self.path(), serialized.as_bytes())
    }

    fn clear(&self) -> Result<(), AuthError> {
        match fs::remove_file(self.path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthError::Storage(err.to_string())),
        }
    }
}

/// Process-local credential store.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    stored: Mutex<StoredCredentials>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            stored: Mutex::new(StoredCredentials {
                credentials: Some(credentials),
                ..Default::default()
            }),
        }
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn load(&self) -> Result<StoredCredentials, AuthError> {
        self.stored
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| AuthError::Storage("credential lock poisoned".to_string()))
    }

    fn save(&self, stored: &StoredCredentials) -> Result<(), AuthError> {
        let mut guard = self
            .stored
            .lock()
            .map_err(|_| AuthError::Storage("credential lock poisoned".to_string()))?;
        *guard = stored.clone();
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        self.save(&StoredCredentials::default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CredentialFile {
    version: u32,
    saved_at: DateTime<Utc>,
    #[serde(flatten)]
    stored: StoredCredentials,
}

fn default_keyward_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".keyward"))
        .unwrap_or_else(|| PathBuf::from(".keyward"))
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), AuthError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path.file_name().ok_or_else(|| {
        AuthError::Storage(format!("credential path {} has no file name", path.display()))
    })?;
    let temp_name = format!(
        ".{}.tmp-{}-{}",
        file_name.to_string_lossy(),
        std::process::id(),
        uuid::Uuid::new_v4().simple()
    );
    let temp_path = path.with_file_name(temp_name);

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let write_result = (|| -> std::io::Result<()> {
        let mut temp_file = options.open(&temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()?;
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}

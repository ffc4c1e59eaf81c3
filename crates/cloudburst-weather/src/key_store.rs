//! Persistence for the OpenWeatherMap API key.
//!
//! The key lives under a fixed entry name. Absence means the free provider is
//! the only source.

use cloudburst_core::{AppError, Config, KeyBackendKind};
use parking_lot::{Mutex, RwLock};
use std::fs;
use std::path::PathBuf;

/// Fixed name the key is stored under in every backend
pub const KEY_ENTRY_NAME: &str = "openweather_api_key";

const KEYRING_SERVICE: &str = "cloudburst";

#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("Keyring error: {0}")]
    Keyring(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<KeyStoreError> for AppError {
    fn from(e: KeyStoreError) -> Self {
        AppError::KeyStore(e.to_string())
    }
}

/// Where a key is persisted
pub trait KeyBackend: Send + Sync + std::fmt::Debug {
    fn load(&self) -> Result<Option<String>, KeyStoreError>;
    fn save(&self, key: &str) -> Result<(), KeyStoreError>;
    fn clear(&self) -> Result<(), KeyStoreError>;
}

/// System keyring (Secret Service, Keychain, Credential Manager)
#[derive(Debug)]
pub struct KeyringBackend {
    service: String,
}

impl Default for KeyringBackend {
    fn default() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
        }
    }
}

impl KeyringBackend {
    fn entry(&self) -> Result<keyring::Entry, KeyStoreError> {
        keyring::Entry::new(&self.service, KEY_ENTRY_NAME)
            .map_err(|e| KeyStoreError::Keyring(e.to_string()))
    }
}

impl KeyBackend for KeyringBackend {
    fn load(&self) -> Result<Option<String>, KeyStoreError> {
        match self.entry()?.get_password() {
            Ok(key) => Ok(Some(key)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(KeyStoreError::Keyring(e.to_string())),
        }
    }

    fn save(&self, key: &str) -> Result<(), KeyStoreError> {
        self.entry()?
            .set_password(key)
            .map_err(|e| KeyStoreError::Keyring(e.to_string()))
    }

    fn clear(&self) -> Result<(), KeyStoreError> {
        match self.entry()?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(KeyStoreError::Keyring(e.to_string())),
        }
    }
}

/// Plain file `<config_dir>/keys/openweather_api_key`
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(config_dir: &std::path::Path) -> Self {
        Self {
            path: config_dir.join("keys").join(KEY_ENTRY_NAME),
        }
    }
}

impl KeyBackend for FileBackend {
    fn load(&self) -> Result<Option<String>, KeyStoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&self.path)?.trim().to_string()))
    }

    fn save(&self, key: &str) -> Result<(), KeyStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, key)?;
        tracing::info!("Stored API key at {:?}", self.path);
        Ok(())
    }

    fn clear(&self) -> Result<(), KeyStoreError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            tracing::info!("Removed API key at {:?}", self.path);
        }
        Ok(())
    }
}

/// Volatile backend, for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryBackend {
    value: Mutex<Option<String>>,
}

impl KeyBackend for MemoryBackend {
    fn load(&self) -> Result<Option<String>, KeyStoreError> {
        Ok(self.value.lock().clone())
    }

    fn save(&self, key: &str) -> Result<(), KeyStoreError> {
        *self.value.lock() = Some(key.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), KeyStoreError> {
        *self.value.lock() = None;
        Ok(())
    }
}

/// Backend selected by configuration
pub fn backend_for(config: &Config) -> Box<dyn KeyBackend> {
    match config.keys.backend {
        KeyBackendKind::Keyring => Box::new(KeyringBackend::default()),
        KeyBackendKind::File => Box::new(FileBackend::new(&config.config_dir)),
    }
}

/// The current OpenWeatherMap key, mirrored from its backend.
#[derive(Debug)]
pub struct ApiKey {
    backend: Box<dyn KeyBackend>,
    current: RwLock<Option<String>>,
}

impl ApiKey {
    /// Read the stored key once. A backend failure is logged and treated as
    /// "no key" so the free provider keeps working.
    pub fn load(backend: Box<dyn KeyBackend>) -> Self {
        let current = match backend.load() {
            Ok(key) => key.filter(|k| !k.trim().is_empty()),
            Err(e) => {
                tracing::warn!("Could not read stored API key: {}", e);
                None
            }
        };
        if current.is_some() {
            tracing::info!("OpenWeatherMap API key configured");
        }
        Self {
            backend,
            current: RwLock::new(current),
        }
    }

    pub fn in_memory(key: Option<&str>) -> Self {
        let backend = MemoryBackend::default();
        *backend.value.lock() = key.map(str::to_string);
        Self::load(Box::new(backend))
    }

    pub fn get(&self) -> Option<String> {
        self.current.read().clone()
    }

    pub fn is_configured(&self) -> bool {
        self.current.read().is_some()
    }

    /// Store or clear the key. Blank input clears it.
    pub fn set(&self, key: Option<&str>) -> Result<(), KeyStoreError> {
        match key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => {
                self.backend.save(key)?;
                *self.current.write() = Some(key.to_string());
            }
            None => {
                self.backend.clear()?;
                *self.current.write() = None;
            }
        }
        Ok(())
    }
}

//! Support for library configuration options

use std::error::Error;
use std::path::Path;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::provider::flavor::{GenericCalDav, Nextcloud, ServerFlavor, Vikunja};

/// Part of the ProdID string that describes the organization (example of a ProdID string: `-//ABC Corporation//My Product//EN`).
/// Feel free to override it when initing this library.
pub static ORG_NAME: Lazy<Arc<Mutex<String>>> = Lazy::new(|| Arc::new(Mutex::new("Errands".to_string())));

/// Part of the ProdID string that describes the product name (example of a ProdID string: `-//ABC Corporation//My Product//EN`).
/// Feel free to override it when initing this library.
pub static PRODUCT_NAME: Lazy<Arc<Mutex<String>>> = Lazy::new(|| Arc::new(Mutex::new("Errands Sync".to_string())));


/// The kind of server tasks are synced with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Disabled,
    CalDav,
    Nextcloud,
    Vikunja,
}

impl Default for ProviderKind {
    fn default() -> Self {
        ProviderKind::Disabled
    }
}

impl ProviderKind {
    /// Map the index of the provider selector of the settings UI. `0` means sync is disabled.
    pub fn from_index(index: u32) -> Self {
        match index {
            1 => ProviderKind::Nextcloud,
            2 => ProviderKind::CalDav,
            3 => ProviderKind::Vikunja,
            _ => ProviderKind::Disabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        *self != ProviderKind::Disabled
    }

    /// The server flavor for this kind, or `None` if sync is disabled
    pub fn flavor(&self) -> Option<Box<dyn ServerFlavor>> {
        match self {
            ProviderKind::Disabled => None,
            ProviderKind::CalDav => Some(Box::new(GenericCalDav)),
            ProviderKind::Nextcloud => Some(Box::new(Nextcloud)),
            ProviderKind::Vikunja => Some(Box::new(Vikunja)),
        }
    }
}


/// Everything needed to log in to a server
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Somewhere passwords are kept (a keyring, an environment variable...)
pub trait SecretStore {
    /// The secret for this account, if any
    fn get_secret(&self, account: &str) -> Option<String>;
}


/// Sync settings, as they are saved on disk
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub username: String,
}

impl SyncSettings {
    /// Load settings from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let data = match std::fs::read_to_string(path.as_ref()) {
            Err(err) => {
                return Err(format!("Unable to read file {:?}: {}", path.as_ref(), err).into());
            },
            Ok(data) => data,
        };

        let settings = serde_json::from_str(&data)?;
        Ok(settings)
    }

    /// Store settings to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error>> {
        log::debug!("Saving sync settings to {:?}", path.as_ref());
        if let Some(folder) = path.as_ref().parent() {
            std::fs::create_dir_all(folder)?;
        }
        let file = std::fs::File::create(path.as_ref())?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Build credentials, with the password looked up in `secrets` under the username.
    ///
    /// Returns `None` when sync is disabled or any field is missing.
    pub fn credentials(&self, secrets: &dyn SecretStore) -> Option<Credentials> {
        if !self.provider.is_enabled() || self.url.trim().is_empty() || self.username.trim().is_empty() {
            return None;
        }
        let password = secrets.get_secret(&self.username)?;
        if password.is_empty() {
            return None;
        }
        Some(Credentials {
            url: self.url.trim().to_string(),
            username: self.username.trim().to_string(),
            password,
        })
    }
}

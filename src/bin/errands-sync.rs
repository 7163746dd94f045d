//! Run a single sync of the local task database, and print its content
//!
//! Usage: `errands-sync [SETTINGS_FILE]`. The password is read from the `ERRANDS_SYNC_PASSWORD` environment variable.

use std::path::PathBuf;
use std::sync::Arc;

use errands_sync::config::{SecretStore, SyncSettings};
use errands_sync::orchestrator::SyncTarget;
use errands_sync::provider::CalDavProvider;
use errands_sync::{Orchestrator, TaskStore};

const PASSWORD_VARIABLE: &str = "ERRANDS_SYNC_PASSWORD";

struct EnvSecrets;

impl SecretStore for EnvSecrets {
    fn get_secret(&self, _account: &str) -> Option<String> {
        std::env::var(PASSWORD_VARIABLE).ok()
    }
}

fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("errands").join("sync.json"))
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let settings_path = match std::env::args().nth(1).map(PathBuf::from).or_else(default_settings_path) {
        Some(path) => path,
        None => {
            log::error!("Unable to find a settings file, please give its path");
            std::process::exit(1);
        },
    };
    let settings = match SyncSettings::from_file(&settings_path) {
        Ok(settings) => settings,
        Err(err) => {
            log::warn!("Invalid settings file: {}. Sync is disabled", err);
            SyncSettings::default()
        },
    };

    let db_path = match TaskStore::default_path() {
        Some(path) => path,
        None => {
            log::error!("Unable to find the data directory");
            std::process::exit(1);
        },
    };
    let store = match TaskStore::open(&db_path) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            log::error!("Unable to open {:?}: {}", db_path, err);
            std::process::exit(1);
        },
    };

    let credentials = settings.credentials(&EnvSecrets);
    let provider = CalDavProvider::connect(Arc::clone(&store), credentials, settings.provider, false).await;
    if let Some(err) = provider.error() {
        eprintln!("Unable to sync ({:?} error): {}", err.kind(), err);
    }
    let target: Option<Box<dyn SyncTarget>> = if settings.provider.is_enabled() {
        Some(Box::new(provider))
    } else {
        None
    };

    let orchestrator = Orchestrator::spawn(Arc::clone(&store), target);
    orchestrator.sync();
    orchestrator.wait_for_cycles(1).await;

    if let Err(err) = errands_sync::utils::print_lists(&store) {
        log::error!("Unable to read the task database: {}", err);
    }
}

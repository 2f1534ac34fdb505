pub mod cas_fs;
pub mod http_client;
pub mod pinata;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::app::ports::{EvidencePinner, HttpClientPort};
use crate::config::{Config, PinningProvider, StorageBackend};
use crate::db::SqliteStorage;
use crate::error::{PhishError, Result};
use crate::storage::{InMemoryStorage, Storage};

pub fn storage_from_config(config: &Config) -> Result<Arc<dyn Storage>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage; reports are lost on restart");
            Ok(Arc::new(InMemoryStorage::new()))
        }
        StorageBackend::Sqlite => Ok(Arc::new(SqliteStorage::open(&config.storage.path)?)),
    }
}

pub fn http_from_config(config: &Config) -> Result<Arc<dyn HttpClientPort>> {
    let http = http_client::ReqwestHttp::new(&config.resolver.user_agent)
        .map_err(|e| PhishError::Config(format!("failed to build HTTP client: {}", e)))?;
    Ok(Arc::new(http))
}

pub fn pinner_from_config(config: &Config) -> Result<Arc<dyn EvidencePinner>> {
    match config.pinning.provider {
        PinningProvider::Pinata => {
            let credentials = pinata::PinataCredentials::from_env();
            if credentials.is_none() {
                warn!("Pinata credentials missing; reports will be stored without evidence");
            }
            let pinner = pinata::PinataPinner::new(
                &config.pinning.endpoint,
                credentials,
                Duration::from_secs(config.pinning.timeout_seconds),
            )?;
            Ok(Arc::new(pinner))
        }
        PinningProvider::Local => {
            info!(
                "Pinning evidence to local store at {}",
                config.pinning.local_root.display()
            );
            Ok(Arc::new(cas_fs::LocalCasPinner::new(
                config.pinning.local_root.clone(),
            )))
        }
    }
}

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app::ports::EvidencePinner;
use crate::error::PinError;

/// Write bytes under `root/sha256/ab/cd/<hex>` and return `cas:sha256:<hex>`.
pub fn write_cas(root: &Path, bytes: &[u8]) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let hex = hex::encode(digest);
    let dir = root.join("sha256").join(&hex[0..2]).join(&hex[2..4]);
    fs::create_dir_all(&dir)?;
    let path = dir.join(&hex);
    if !path.exists() {
        fs::write(&path, bytes)?;
    }
    Ok(format!("cas:sha256:{}", hex))
}

/// Evidence pinner backed by a local content-addressed directory.
pub struct LocalCasPinner {
    root: PathBuf,
}

impl LocalCasPinner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl EvidencePinner for LocalCasPinner {
    async fn pin(&self, document: &serde_json::Value) -> Result<String, PinError> {
        let bytes = serde_json::to_vec(document)
            .map_err(|e| PinError::Protocol(format!("unserializable document: {}", e)))?;
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || write_cas(&root, &bytes))
            .await
            .map_err(|e| PinError::Upstream(format!("CAS writer task failed: {}", e)))?
            .map_err(|e| PinError::Upstream(format!("CAS write failed: {}", e)))
    }
}

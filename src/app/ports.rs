use async_trait::async_trait;

use crate::error::PinError;

/// A single non-following GET against a URL
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    async fn get_no_follow(&self, url: &str) -> Result<HttpHop, String>;
}

#[derive(Clone, Debug)]
pub struct HttpHop {
    pub status: u16,
    pub location: Option<String>,
}

impl HttpHop {
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

/// Anchors an evidence document in a content-addressed store
#[async_trait]
pub trait EvidencePinner: Send + Sync {
    /// Returns the content identifier. One attempt, no retries.
    async fn pin(&self, document: &serde_json::Value) -> Result<String, PinError>;
}

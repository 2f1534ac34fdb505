use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::app::ports::EvidencePinner;
use crate::constants::{PINATA_API_KEY_ENV, PINATA_API_SECRET_ENV};
use crate::error::PinError;

/// The two out-of-band credential values Pinata expects
#[derive(Clone)]
pub struct PinataCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl PinataCredentials {
    /// Read `PINATA_API_KEY` / `PINATA_API_SECRET`. Blank values count as missing.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var(PINATA_API_KEY_ENV).ok().filter(|v| !v.is_empty())?;
        let api_secret = std::env::var(PINATA_API_SECRET_ENV)
            .ok()
            .filter(|v| !v.is_empty())?;
        Some(Self { api_key, api_secret })
    }
}

#[derive(Deserialize)]
struct PinJsonResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: Option<String>,
}

/// Pins JSON documents through Pinata's `pinJSONToIPFS` endpoint.
///
/// Missing credentials are not a construction error; every `pin` call reports
/// them as a configuration failure so report intake keeps working unpinned.
pub struct PinataPinner {
    client: reqwest::Client,
    endpoint: String,
    credentials: Option<PinataCredentials>,
}

impl PinataPinner {
    pub fn new(
        endpoint: &str,
        credentials: Option<PinataCredentials>,
        timeout: Duration,
    ) -> Result<Self, PinError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PinError::Configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            credentials,
        })
    }
}

#[async_trait]
impl EvidencePinner for PinataPinner {
    async fn pin(&self, document: &serde_json::Value) -> Result<String, PinError> {
        let creds = self.credentials.as_ref().ok_or_else(|| {
            PinError::Configuration(format!(
                "{} or {} not set in environment",
                PINATA_API_KEY_ENV, PINATA_API_SECRET_ENV
            ))
        })?;

        let body = serde_json::to_vec(document)
            .map_err(|e| PinError::Protocol(format!("unserializable document: {}", e)))?;

        let resp = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("pinata_api_key", &creds.api_key)
            .header("pinata_secret_api_key", &creds.api_secret)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PinError::Upstream(format!("request timed out: {}", e))
                } else {
                    PinError::Upstream(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PinError::Upstream(format!(
                "Pinata upload failed: {} {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or(""),
                text
            )));
        }

        let parsed: PinJsonResponse = resp
            .json()
            .await
            .map_err(|e| PinError::Protocol(format!("unreadable response body: {}", e)))?;
        let cid = parsed
            .ipfs_hash
            .filter(|h| !h.is_empty())
            .ok_or_else(|| PinError::Protocol("response missing IpfsHash".to_string()))?;

        debug!(%cid, "Pinned evidence document");
        Ok(cid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use serde_json::json;
    use std::net::{SocketAddr, TcpListener};

    fn spawn(app: Router) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = axum::Server::from_tcp(listener)
            .unwrap()
            .serve(app.into_make_service());
        tokio::spawn(server);
        addr
    }

    fn creds() -> Option<PinataCredentials> {
        Some(PinataCredentials {
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
        })
    }

    fn pinner(addr: SocketAddr, credentials: Option<PinataCredentials>) -> PinataPinner {
        PinataPinner::new(
            &format!("http://{}/pinning/pinJSONToIPFS", addr),
            credentials,
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_pin_success_sends_credentials() {
        let app = Router::new().route(
            "/pinning/pinJSONToIPFS",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                let header = |name: &str| {
                    headers
                        .get(name)
                        .and_then(|v| v.to_str().ok())
                        .map(|s| s.to_string())
                };
                let authed = header("pinata_api_key").as_deref() == Some("key")
                    && header("pinata_secret_api_key").as_deref() == Some("secret");
                if !authed || body["reportId"] != "r-1" {
                    return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad"})));
                }
                (StatusCode::OK, Json(json!({"IpfsHash": "QmTest", "PinSize": 10})))
            }),
        );
        let addr = spawn(app);

        let cid = pinner(addr, creds())
            .pin(&json!({"reportId": "r-1"}))
            .await
            .unwrap();
        assert_eq!(cid, "QmTest");
    }

    #[tokio::test]
    async fn test_missing_credentials_is_configuration_error() {
        let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let err = pinner(addr, None).pin(&json!({})).await.unwrap_err();
        assert!(matches!(err, PinError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_server_error_includes_status_and_body() {
        let app = Router::new().route(
            "/pinning/pinJSONToIPFS",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "pinning backend down") }),
        );
        let addr = spawn(app);

        let err = pinner(addr, creds()).pin(&json!({})).await.unwrap_err();
        match err {
            PinError::Upstream(msg) => {
                assert!(msg.contains("500"));
                assert!(msg.contains("Internal Server Error"));
                assert!(msg.contains("pinning backend down"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_hash_is_protocol_error() {
        let app = Router::new().route(
            "/pinning/pinJSONToIPFS",
            post(|| async { Json(json!({"PinSize": 10})) }),
        );
        let addr = spawn(app);

        let err = pinner(addr, creds()).pin(&json!({})).await.unwrap_err();
        assert!(matches!(err, PinError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let app = Router::new().route(
            "/pinning/pinJSONToIPFS",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"IpfsHash": "QmLate"}))
            }),
        );
        let addr = spawn(app);

        let slow = PinataPinner::new(
            &format!("http://{}/pinning/pinJSONToIPFS", addr),
            creds(),
            Duration::from_millis(200),
        )
        .unwrap();
        let err = slow.pin(&json!({})).await.unwrap_err();
        assert!(matches!(err, PinError::Upstream(_)));
    }
}

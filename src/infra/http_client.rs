use crate::app::ports::{HttpClientPort, HttpHop};
use async_trait::async_trait;
use reqwest::header::{LOCATION, USER_AGENT};
use reqwest::redirect::Policy;

/// reqwest-backed hop client. Redirects are never followed automatically.
pub struct ReqwestHttp {
    client: reqwest::Client,
    user_agent: String,
}

impl ReqwestHttp {
    pub fn new(user_agent: &str) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
        })
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    async fn get_no_follow(&self, url: &str) -> Result<HttpHop, String> {
        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = resp.status().as_u16();
        let location = match resp.headers().get(LOCATION) {
            Some(value) => Some(
                value
                    .to_str()
                    .map_err(|e| format!("Unreadable Location header from {}: {}", url, e))?
                    .to_string(),
            ),
            None => None,
        };
        Ok(HttpHop { status, location })
    }
}

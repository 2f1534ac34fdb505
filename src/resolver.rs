use std::sync::Arc;

use reqwest::Url;
use tracing::{debug, warn};

use crate::app::ports::HttpClientPort;
use crate::constants::DEFAULT_MAX_HOPS;

/// Outcome of following a target URL's redirects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub final_url: String,
    /// Visited URLs, oldest first
    pub chain: Vec<String>,
}

/// Follows redirects one hop at a time with a hard hop bound.
///
/// Resolution never fails: transport errors and malformed URLs end the walk and
/// report the original input as the final URL along with whatever chain was
/// collected before the failure.
pub struct RedirectResolver {
    http: Arc<dyn HttpClientPort>,
    max_hops: usize,
}

impl RedirectResolver {
    pub fn new(http: Arc<dyn HttpClientPort>) -> Self {
        Self::with_max_hops(http, DEFAULT_MAX_HOPS)
    }

    pub fn with_max_hops(http: Arc<dyn HttpClientPort>, max_hops: usize) -> Self {
        Self { http, max_hops }
    }

    pub async fn resolve(&self, start_url: &str) -> Resolution {
        let mut chain: Vec<String> = Vec::new();
        let mut current = start_url.to_string();

        for _ in 0..self.max_hops {
            let hop = match self.http.get_no_follow(&current).await {
                Ok(hop) => hop,
                Err(e) => {
                    warn!(url = %current, error = %e, "Redirect resolution aborted");
                    return Self::abandoned(start_url, chain);
                }
            };
            chain.push(current.clone());

            if !hop.is_redirect() {
                return Resolution { final_url: current, chain };
            }
            let Some(location) = hop.location else {
                debug!(url = %current, status = hop.status, "Redirect without Location");
                return Resolution { final_url: current, chain };
            };

            let next = match Url::parse(&current).and_then(|base| base.join(&location)) {
                Ok(next) => next.to_string(),
                Err(e) => {
                    warn!(url = %current, location = %location, error = %e, "Unresolvable redirect target");
                    return Self::abandoned(start_url, chain);
                }
            };

            if chain.contains(&next) {
                debug!(url = %current, next = %next, "Redirect loop detected");
                return Resolution { final_url: current, chain };
            }
            debug!(from = %current, to = %next, status = hop.status, "Following redirect");
            current = next;
        }

        // Hop bound reached: the last visited URL stands as final
        let final_url = chain.last().cloned().unwrap_or_else(|| start_url.to_string());
        Resolution { final_url, chain }
    }

    fn abandoned(start_url: &str, chain: Vec<String>) -> Resolution {
        Resolution {
            final_url: start_url.to_string(),
            chain,
        }
    }
}

/// Strip exactly one trailing slash, if present.
pub fn canonicalize(final_url: &str) -> String {
    final_url
        .strip_suffix('/')
        .unwrap_or(final_url)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::HttpHop;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted responses keyed by URL; unknown URLs fail like a dead host.
    struct ScriptedHttp {
        responses: HashMap<String, HttpHop>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedHttp {
        fn new(responses: Vec<(&str, u16, Option<&str>)>) -> Self {
            Self {
                responses: responses
                    .into_iter()
                    .map(|(url, status, location)| {
                        (
                            url.to_string(),
                            HttpHop {
                                status,
                                location: location.map(|l| l.to_string()),
                            },
                        )
                    })
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HttpClientPort for ScriptedHttp {
        async fn get_no_follow(&self, url: &str) -> Result<HttpHop, String> {
            self.calls.lock().unwrap().push(url.to_string());
            self.responses
                .get(url)
                .cloned()
                .ok_or_else(|| format!("connection refused: {}", url))
        }
    }

    fn resolver(responses: Vec<(&str, u16, Option<&str>)>) -> RedirectResolver {
        RedirectResolver::new(Arc::new(ScriptedHttp::new(responses)))
    }

    #[tokio::test]
    async fn test_no_redirect_yields_single_entry() {
        let r = resolver(vec![("https://example.com/", 200, None)]);
        let res = r.resolve("https://example.com/").await;
        assert_eq!(res.final_url, "https://example.com/");
        assert_eq!(res.chain, vec!["https://example.com/"]);
    }

    #[tokio::test]
    async fn test_follows_relative_and_absolute_locations() {
        let r = resolver(vec![
            ("https://short.example/a", 301, Some("https://landing.example/start")),
            ("https://landing.example/start", 302, Some("/login?next=1")),
            ("https://landing.example/login?next=1", 200, None),
        ]);
        let res = r.resolve("https://short.example/a").await;
        assert_eq!(res.final_url, "https://landing.example/login?next=1");
        assert_eq!(
            res.chain,
            vec![
                "https://short.example/a",
                "https://landing.example/start",
                "https://landing.example/login?next=1",
            ]
        );
    }

    #[tokio::test]
    async fn test_self_redirect_at_third_hop_stops() {
        let r = resolver(vec![
            ("https://a.example/", 301, Some("https://b.example/")),
            ("https://b.example/", 301, Some("https://c.example/")),
            ("https://c.example/", 301, Some("https://c.example/")),
        ]);
        let res = r.resolve("https://a.example/").await;
        assert_eq!(res.chain.len(), 3);
        assert_eq!(res.final_url, "https://c.example/");
    }

    #[tokio::test]
    async fn test_redirect_without_location_stops() {
        let r = resolver(vec![
            ("https://a.example/", 302, Some("https://b.example/")),
            ("https://b.example/", 307, None),
        ]);
        let res = r.resolve("https://a.example/").await;
        assert_eq!(res.final_url, "https://b.example/");
        assert_eq!(res.chain.len(), 2);
    }

    #[tokio::test]
    async fn test_hop_bound_returns_last_visited() {
        let responses: Vec<(String, u16, Option<String>)> = (0..20)
            .map(|i| {
                (
                    format!("https://hop.example/{}", i),
                    302,
                    Some(format!("https://hop.example/{}", i + 1)),
                )
            })
            .collect();
        let http = ScriptedHttp::new(
            responses
                .iter()
                .map(|(u, s, l)| (u.as_str(), *s, l.as_deref()))
                .collect(),
        );
        let r = RedirectResolver::new(Arc::new(http));

        let res = r.resolve("https://hop.example/0").await;
        assert_eq!(res.chain.len(), DEFAULT_MAX_HOPS);
        assert_eq!(res.final_url, "https://hop.example/7");
    }

    #[tokio::test]
    async fn test_transport_failure_returns_original_url() {
        let r = resolver(vec![("https://a.example/", 301, Some("https://dead.example/"))]);
        let res = r.resolve("https://a.example/").await;
        assert_eq!(res.final_url, "https://a.example/");
        assert_eq!(res.chain, vec!["https://a.example/"]);
    }

    #[tokio::test]
    async fn test_malformed_start_url_is_absorbed() {
        let r = resolver(vec![]);
        let res = r.resolve("not a url").await;
        assert_eq!(res.final_url, "not a url");
        assert!(res.chain.is_empty());
    }

    #[test]
    fn test_canonicalize_strips_one_slash() {
        assert_eq!(canonicalize("https://example.com/phish/"), "https://example.com/phish");
        assert_eq!(canonicalize("https://example.com/phish//"), "https://example.com/phish/");
        assert_eq!(canonicalize("https://example.com/phish"), "https://example.com/phish");
    }
}

//! Outbound fetch seam.
//!
//! Every provider pipeline goes through [`Fetch`], so the service can run
//! against live providers ([`HttpFetcher`]) or canned payloads
//! ([`MockFetcher`], behind the `mock` feature).

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SyncError;

#[async_trait]
pub trait Fetch: Send + Sync {
    /// GET `url` and return the body. Non-2xx responses are errors.
    async fn get_text(&self, url: &str) -> Result<String, SyncError>;

    /// GET `url` and parse the body as JSON.
    async fn get_json(&self, url: &str) -> Result<Value, SyncError> {
        let body = self.get_text(url).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(feature = "http")]
pub use http::HttpFetcher;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use capitol_core::urls::redact_query;
    use tracing::{debug, warn};

    use super::Fetch;
    use crate::error::SyncError;

    /// `reqwest` client with a per-request timeout and a fixed user agent.
    pub struct HttpFetcher {
        client: reqwest::Client,
    }

    impl HttpFetcher {
        pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, SyncError> {
            let client = reqwest::Client::builder()
                .user_agent(user_agent)
                .timeout(timeout)
                .build()?;
            Ok(Self { client })
        }
    }

    #[async_trait]
    impl Fetch for HttpFetcher {
        async fn get_text(&self, url: &str) -> Result<String, SyncError> {
            let shown = redact_query(url);
            debug!(url = shown, "GET");
            let resp = self.client.get(url).send().await.map_err(|e| {
                if e.is_timeout() {
                    SyncError::Timeout {
                        label: shown.to_string(),
                    }
                } else {
                    // reqwest errors carry the full URL, key included.
                    SyncError::Http(e.without_url())
                }
            })?;
            let status = resp.status();
            if !status.is_success() {
                warn!(url = shown, status = status.as_u16(), "provider returned an error status");
                return Err(SyncError::Status {
                    status: status.as_u16(),
                    url: shown.to_string(),
                });
            }
            resp.text().await.map_err(|e| SyncError::Http(e.without_url()))
        }
    }
}

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockFetcher, MockResponse};

#[cfg(any(test, feature = "mock"))]
mod mock {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use capitol_core::urls::redact_query;
    use serde_json::Value;

    use super::Fetch;
    use crate::error::SyncError;

    #[derive(Debug, Clone)]
    pub enum MockResponse {
        Body(String),
        Status(u16),
        /// Respond with the body after a delay (tokio time, so tests can pause it).
        Delayed(Duration, String),
    }

    #[derive(Default)]
    struct Routes {
        responses: HashMap<String, MockResponse>,
        hits: HashMap<String, usize>,
    }

    /// Canned responses keyed by URL.
    ///
    /// A request matches its exact URL first, then the longest registered
    /// prefix. Unmatched URLs answer 404. Every request is counted under the
    /// URL it was made with.
    #[derive(Default)]
    pub struct MockFetcher {
        routes: Mutex<Routes>,
    }

    impl MockFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(&self, url: impl Into<String>, response: MockResponse) -> &Self {
            self.lock().responses.insert(url.into(), response);
            self
        }

        pub fn text(&self, url: impl Into<String>, body: impl Into<String>) -> &Self {
            self.respond(url, MockResponse::Body(body.into()))
        }

        pub fn json(&self, url: impl Into<String>, body: &Value) -> &Self {
            self.respond(url, MockResponse::Body(body.to_string()))
        }

        pub fn status(&self, url: impl Into<String>, status: u16) -> &Self {
            self.respond(url, MockResponse::Status(status))
        }

        /// Requests made for exactly `url`.
        pub fn hits(&self, url: &str) -> usize {
            self.lock().hits.get(url).copied().unwrap_or(0)
        }

        /// Requests made for any URL starting with `prefix`.
        pub fn hits_with_prefix(&self, prefix: &str) -> usize {
            self.lock()
                .hits
                .iter()
                .filter(|(url, _)| url.starts_with(prefix))
                .map(|(_, n)| n)
                .sum()
        }

        pub fn total_hits(&self) -> usize {
            self.lock().hits.values().sum()
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, Routes> {
            self.routes.lock().unwrap_or_else(|e| e.into_inner())
        }

        fn lookup(&self, url: &str) -> Option<MockResponse> {
            let mut routes = self.lock();
            *routes.hits.entry(url.to_string()).or_default() += 1;
            if let Some(exact) = routes.responses.get(url) {
                return Some(exact.clone());
            }
            routes
                .responses
                .iter()
                .filter(|(route, _)| url.starts_with(route.as_str()))
                .max_by_key(|(route, _)| route.len())
                .map(|(_, resp)| resp.clone())
        }
    }

    #[async_trait]
    impl Fetch for MockFetcher {
        async fn get_text(&self, url: &str) -> Result<String, SyncError> {
            let status = |status| SyncError::Status {
                status,
                url: redact_query(url).to_string(),
            };
            match self.lookup(url) {
                Some(MockResponse::Body(body)) => Ok(body),
                Some(MockResponse::Delayed(delay, body)) => {
                    tokio::time::sleep(delay).await;
                    Ok(body)
                }
                Some(MockResponse::Status(code)) => Err(status(code)),
                None => Err(status(404)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn mock_matches_exact_then_longest_prefix() {
        let mock = MockFetcher::new();
        mock.text("https://clerk.house.gov/evs/", "generic")
            .text("https://clerk.house.gov/evs/2025/", "year")
            .text("https://clerk.house.gov/evs/2025/roll042.xml", "roll");

        assert_eq!(mock.get_text("https://clerk.house.gov/evs/2025/roll042.xml").await.unwrap(), "roll");
        assert_eq!(mock.get_text("https://clerk.house.gov/evs/2025/roll043.xml").await.unwrap(), "year");
        assert_eq!(mock.get_text("https://clerk.house.gov/evs/2024/index.asp").await.unwrap(), "generic");
        assert_eq!(mock.total_hits(), 3);
        assert_eq!(mock.hits_with_prefix("https://clerk.house.gov/evs/2025/"), 2);
    }

    #[tokio::test]
    async fn unknown_urls_are_not_found() {
        let mock = MockFetcher::new();
        let err = mock.get_text("https://www.govtrack.us/x?api_key=s").await.unwrap_err();
        match err {
            SyncError::Status { status, url } => {
                assert_eq!(status, 404);
                assert_eq!(url, "https://www.govtrack.us/x");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn json_bodies_parse() {
        let mock = MockFetcher::new();
        mock.json("u", &json!({"meta": {"total_count": 1}}));
        let value = mock.get_json("u").await.unwrap();
        assert_eq!(value["meta"]["total_count"], 1);

        mock.text("bad", "<html>");
        assert!(matches!(mock.get_json("bad").await, Err(SyncError::Json(_))));
    }
}

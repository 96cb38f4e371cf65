//! Endpoint discovery over HTTP.
//!
//! When the process was launched from a web location, the serving host can
//! expose the endpoint at a well-known path on the same origin:
//!
//! ```text
//! GET {scheme}://{host}:{port}/$env/NEURO_SDK_WS_URL
//! 200 OK
//!
//! ws://localhost:8000
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::error::Result;

// ============================================================================
// Discovery
// ============================================================================

/// HTTP client for the discovery request.
#[derive(Debug, Clone)]
pub struct Discovery {
    client: reqwest::Client,
}

impl Discovery {
    /// Creates a discovery client with a request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Http`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Derives the discovery URL from the launch location's origin.
    ///
    /// Returns `None` when the location is not a URL with a host and a
    /// known port.
    #[must_use]
    pub fn discovery_url(location: &str, variable: &str) -> Option<String> {
        let url = Url::parse(location).ok()?;
        let host = url.host_str()?;
        let port = url.port_or_known_default()?;
        Some(format!("{}://{host}:{port}/$env/{variable}", url.scheme()))
    }

    /// Fetches the endpoint. Every failure is reported as `None`.
    pub async fn fetch(&self, discovery_url: &str) -> Option<String> {
        let response = match self.client.get(discovery_url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %discovery_url, error = %e, "Discovery request failed");
                return None;
            }
        };

        let response = match response.error_for_status() {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %discovery_url, error = %e, "Discovery returned error status");
                return None;
            }
        };

        match response.text().await {
            Ok(body) => {
                let body = body.trim();
                (!body.is_empty()).then(|| body.to_string())
            }
            Err(e) => {
                debug!(url = %discovery_url, error = %e, "Discovery body unreadable");
                None
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VAR: &str = "NEURO_SDK_WS_URL";

    #[test]
    fn test_discovery_url_keeps_origin() {
        let url = Discovery::discovery_url("http://game.local:8080/play/index.html?x=1", VAR);
        assert_eq!(
            url.as_deref(),
            Some("http://game.local:8080/$env/NEURO_SDK_WS_URL")
        );
    }

    #[test]
    fn test_discovery_url_default_port() {
        let url = Discovery::discovery_url("https://game.example/", VAR);
        assert_eq!(
            url.as_deref(),
            Some("https://game.example:443/$env/NEURO_SDK_WS_URL")
        );
    }

    #[test]
    fn test_discovery_url_without_host() {
        assert_eq!(Discovery::discovery_url("file:///tmp/index.html", VAR), None);
        assert_eq!(Discovery::discovery_url("not a url", VAR), None);
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/$env/NEURO_SDK_WS_URL"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ws://host:9000\n"))
            .mount(&server)
            .await;

        let discovery = Discovery::new(Duration::from_secs(2)).unwrap();
        let url = Discovery::discovery_url(&server.uri(), VAR).unwrap();

        assert_eq!(discovery.fetch(&url).await.as_deref(), Some("ws://host:9000"));
    }

    #[tokio::test]
    async fn test_fetch_error_status_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("ws://ignored"))
            .mount(&server)
            .await;

        let discovery = Discovery::new(Duration::from_secs(2)).unwrap();
        let url = Discovery::discovery_url(&server.uri(), VAR).unwrap();

        assert_eq!(discovery.fetch(&url).await, None);
    }

    #[tokio::test]
    async fn test_fetch_empty_body_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let discovery = Discovery::new(Duration::from_secs(2)).unwrap();
        let url = Discovery::discovery_url(&server.uri(), VAR).unwrap();

        assert_eq!(discovery.fetch(&url).await, None);
    }

    #[tokio::test]
    async fn test_fetch_unreachable_is_none() {
        let discovery = Discovery::new(Duration::from_millis(500)).unwrap();
        assert_eq!(discovery.fetch("http://127.0.0.1:1/$env/X").await, None);
    }
}

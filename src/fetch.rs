use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

use crate::config::ScraperConfig;

/// Transport-level fetch failure. Wrapped into `ScrapeError::FetchFailed`
/// with the URL attached before it leaves the pipeline.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned {status}")]
    Status { status: StatusCode },
}

/// Narrow contract for retrieving a product page. The production
/// implementation talks HTTP; tests substitute canned documents.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// HTTP fetcher with a browser-identifying request signature. Sites reject
/// unidentified clients, so the user agent and Accept headers matter.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &ScraperConfig) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml"),
        );

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status });
        }

        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> ScraperConfig {
        ScraperConfig {
            max_concurrent_scrapes: 2,
            request_timeout_secs: 5,
            user_agent: "TestAgent/1.0".to_string(),
        }
    }

    #[tokio::test]
    async fn test_fetch_returns_body_and_sends_browser_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/product/1"))
            .and(header("user-agent", "TestAgent/1.0"))
            .and(header("accept-language", "en-US,en;q=0.9"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&test_config()).unwrap();
        let body = fetcher
            .fetch(&format!("{}/product/1", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_fetch_surfaces_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&test_config()).unwrap();
        let err = fetcher.fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE
            }
        ));
    }

    #[tokio::test]
    async fn test_fetch_fails_on_unreachable_host() {
        let fetcher = HttpFetcher::new(&test_config()).unwrap();
        let err = fetcher.fetch("http://127.0.0.1:1/nope").await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }
}

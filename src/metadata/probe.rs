use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Method, StatusCode};
use url::Url;

use crate::config::{Config, UrlPolicy};
use crate::metadata::errors::ProbeFailure;
use crate::scrape::{check_url_policy, get_error};

/// What a probe saw. Any status is a response; judging it is the resolver's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub content_type: Option<String>,
}

impl ProbeResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"))
            .unwrap_or(false)
    }
}

/// Lightweight existence check of a URL
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &str) -> Result<ProbeResponse, ProbeFailure>;
}

/// HEAD request, falling back to GET for servers that refuse HEAD.
pub struct HttpProber {
    client: reqwest::Client,
    policy: UrlPolicy,
}

impl HttpProber {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            policy: config.policy.clone(),
        }
    }

    async fn send(&self, method: Method, url: Url) -> Result<ProbeResponse, ProbeFailure> {
        let resp = self
            .client
            .request(method, url)
            .send()
            .await
            .map_err(|err| ProbeFailure::Transport(get_error(&err)))?;

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        // body is never read; dropping the response discards it
        Ok(ProbeResponse {
            status: resp.status().as_u16(),
            content_type,
        })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str) -> Result<ProbeResponse, ProbeFailure> {
        let parsed = Url::parse(url).map_err(|e| ProbeFailure::Transport(e.to_string()))?;
        check_url_policy(&parsed, &self.policy)
            .await
            .map_err(ProbeFailure::Policy)?;

        let head = self.send(Method::HEAD, parsed.clone()).await?;
        if head.status == StatusCode::METHOD_NOT_ALLOWED.as_u16()
            || head.status == StatusCode::NOT_IMPLEMENTED.as_u16()
        {
            log::debug!("{url}: HEAD refused with {}, retrying as GET", head.status);
            return self.send(Method::GET, parsed).await;
        }

        Ok(head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::build_client;
    use httpmock::prelude::*;
    use httpmock::Method::HEAD;

    fn prober() -> HttpProber {
        let mut config = Config::default();
        config.policy.block_private_ips = false;
        config.request_timeout_ms = 2000;
        HttpProber::new(build_client(&config).unwrap(), &config)
    }

    #[test]
    fn test_is_image() {
        let resp = |ct: Option<&str>| ProbeResponse {
            status: 200,
            content_type: ct.map(str::to_owned),
        };
        assert!(resp(Some("image/png")).is_image());
        assert!(resp(Some(" Image/SVG+XML; charset=utf-8")).is_image());
        assert!(!resp(Some("text/html")).is_image());
        assert!(!resp(None).is_image());
    }

    #[tokio::test]
    async fn test_head_probe() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(HEAD).path("/logo.png");
                then.status(200).header("content-type", "image/png");
            })
            .await;

        let resp = prober().probe(&server.url("/logo.png")).await.unwrap();
        mock.assert_async().await;
        assert!(resp.is_success());
        assert_eq!(resp.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_get_fallback_when_head_refused() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(HEAD).path("/logo.png");
                then.status(405);
            })
            .await;
        let get = server
            .mock_async(|when, then| {
                when.method(GET).path("/logo.png");
                then.status(200).header("content-type", "image/png").body("png");
            })
            .await;

        let resp = prober().probe(&server.url("/logo.png")).await.unwrap();
        get.assert_async().await;
        assert_eq!(resp.status, 200);
    }

    #[tokio::test]
    async fn test_probe_reports_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(HEAD).path("/gone.png");
                then.status(404);
            })
            .await;

        let resp = prober().probe(&server.url("/gone.png")).await.unwrap();
        assert_eq!(resp.status, 404);
        assert!(!resp.is_success());
    }

    #[tokio::test]
    async fn test_probe_transport_error() {
        // nothing listens on port 1
        let err = prober().probe("http://127.0.0.1:1/logo.png").await.unwrap_err();
        assert!(matches!(err, ProbeFailure::Transport(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_probe_rejects_malformed_url() {
        let err = prober().probe("not a url").await.unwrap_err();
        assert!(matches!(err, ProbeFailure::Transport(_)));
    }
}

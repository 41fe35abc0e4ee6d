use std::{error::Error, net::IpAddr, time::Duration};

use tokio_util::sync::CancellationToken;
use url::{Host, Url};

use crate::config::{Config, UrlPolicy};
use crate::metadata::errors::FetchFailure;

const MAX_REDIRECTS: usize = 5;

fn is_ip_private(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

fn literal_ip(url: &Url) -> Option<IpAddr> {
    match url.host()? {
        Host::Ipv4(v4) => Some(IpAddr::V4(v4)),
        Host::Ipv6(v6) => Some(IpAddr::V6(v6)),
        Host::Domain(_) => None,
    }
}

/// Checks that don't need DNS. Also applied to every redirect hop.
fn check_static_policy(url: &Url, policy: &UrlPolicy) -> Result<(), String> {
    if !policy.allowed_schemes.iter().any(|s| s == url.scheme()) {
        return Err(format!("scheme '{}' not allowed", url.scheme()));
    }

    let host = url.host_str().unwrap_or_default();
    if host.is_empty() {
        return Err("missing host".to_string());
    }

    if policy.blocked_hosts.iter().any(|h| h.eq_ignore_ascii_case(host)) {
        return Err(format!("host '{host}' is blocked"));
    }

    if policy.block_private_ips {
        if let Some(ip) = literal_ip(url) {
            if is_ip_private(&ip) {
                return Err(format!("host '{host}' is a private address"));
            }
        }
    }

    Ok(())
}

async fn resolves_to_private_ip(host: &str, port: u16) -> bool {
    match tokio::net::lookup_host((host, port)).await {
        Ok(mut addrs) => addrs.any(|addr| is_ip_private(&addr.ip())),
        // unresolvable hosts fail later at connect time
        Err(_) => false,
    }
}

/// Scheme, blocklist and SSRF checks for a URL we are about to request.
pub async fn check_url_policy(url: &Url, policy: &UrlPolicy) -> Result<(), String> {
    check_static_policy(url, policy)?;

    if policy.block_private_ips && literal_ip(url).is_none() {
        let host = url.host_str().unwrap_or_default();
        let port = url.port_or_known_default().unwrap_or(80);
        if resolves_to_private_ip(host, port).await {
            return Err(format!("host '{host}' resolves to a private address"));
        }
    }

    Ok(())
}

pub fn get_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        return "timed out".to_string();
    }
    match error.source() {
        Some(e) => match e.source() {
            Some(e) => e.to_string(),
            None => e.to_string(),
        },
        None => error.to_string(),
    }
}

/// Shared client for page fetches and probes. Every request is bounded by
/// `request_timeout_ms`.
pub fn build_client(config: &Config) -> Result<reqwest::Client, reqwest::Error> {
    let policy = config.policy.clone();
    let redirect = reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        match check_static_policy(attempt.url(), &policy) {
            Ok(()) => attempt.follow(),
            Err(reason) => attempt.error(reason),
        }
    });

    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .danger_accept_invalid_certs(config.policy.accept_invalid_certs)
        .danger_accept_invalid_hostnames(config.policy.accept_invalid_certs)
        .timeout(config.request_timeout())
        .connect_timeout(config.request_timeout())
        .pool_idle_timeout(Duration::from_secs(10))
        .redirect(redirect)
        .build()
}

/// Retrieves page html for extraction.
pub struct PageFetcher {
    client: reqwest::Client,
    policy: UrlPolicy,
    max_page_bytes: usize,
}

impl PageFetcher {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            policy: config.policy.clone(),
            max_page_bytes: config.max_page_bytes,
        }
    }

    pub async fn fetch_page(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<String, FetchFailure> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchFailure::Cancelled),
            res = self.fetch_page_inner(url) => res,
        }
    }

    async fn fetch_page_inner(&self, url: &str) -> Result<String, FetchFailure> {
        let parsed = Url::parse(url).map_err(|e| FetchFailure::Transport(e.to_string()))?;
        check_url_policy(&parsed, &self.policy)
            .await
            .map_err(FetchFailure::Policy)?;

        let iden = format!("{}{}", parsed.host_str().unwrap_or_default(), parsed.path());
        log::debug!("{iden}: requesting");

        let mut resp = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|err| FetchFailure::Transport(get_error(&err)))?;

        let status = resp.status();
        if !status.is_success() {
            log::debug!("{iden}: {status}");
            return Err(FetchFailure::Status(status.as_u16()));
        }

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|err| FetchFailure::Transport(get_error(&err)))?
        {
            let remaining = self.max_page_bytes - body.len();
            if chunk.len() >= remaining {
                body.extend_from_slice(&chunk[..remaining]);
                log::debug!("{iden}: body truncated at {} bytes", self.max_page_bytes);
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&body).to_string())
    }
}

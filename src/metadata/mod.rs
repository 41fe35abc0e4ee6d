pub mod cache;
pub mod errors;
pub mod extract;
pub mod normalize;
pub mod probe;
pub mod resolver;
pub mod types;

pub use errors::MetaError;
pub use types::{CompanyMetadata, ResolutionReport};

use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::metadata::cache::MetadataCache;
use crate::metadata::errors::FetchFailure;
use crate::metadata::probe::HttpProber;
use crate::metadata::resolver::{LogoResolver, ResolverOptions};
use crate::scrape::{build_client, PageFetcher};

/// Fetch → extract → resolve, for one company URL at a time.
///
/// Holds no per-call state; a single pipeline is shared by concurrent callers.
pub struct Pipeline {
    fetcher: PageFetcher,
    resolver: LogoResolver<HttpProber>,
    cache: Option<MetadataCache>,
}

impl Pipeline {
    pub fn new(config: &Config) -> Result<Self, MetaError> {
        let client = build_client(config)?;
        Ok(Self {
            fetcher: PageFetcher::new(client.clone(), config),
            resolver: LogoResolver::new(
                HttpProber::new(client, config),
                ResolverOptions::from_config(config),
            ),
            cache: MetadataCache::from_config(&config.cache),
        })
    }

    /// Best-effort enrichment of a company URL.
    ///
    /// Fails only on input that can't be normalized, or when `cancel` fires.
    /// An unreachable site or a missing logo comes back as empty fields.
    pub async fn fetch_company_metadata(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<CompanyMetadata, MetaError> {
        self.fetch_company_metadata_with_report(url, cancel)
            .await
            .map(|(metadata, _)| metadata)
    }

    pub async fn fetch_company_metadata_with_report(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<(CompanyMetadata, ResolutionReport), MetaError> {
        let started = Instant::now();
        let url = normalize::normalize_url(url)?;
        let cache_key = normalize::bare_domain(&url);

        let mut report = ResolutionReport {
            normalized_url: url.clone(),
            ..Default::default()
        };

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(metadata) = cache.get(key) {
                log::debug!("{key}: served from cache");
                report.from_cache = true;
                report.duration_ms = started.elapsed().as_millis() as u64;
                return Ok((metadata, report));
            }
        }

        let html = match self.fetcher.fetch_page(&url, cancel).await {
            Ok(html) => {
                report.page_fetched = true;
                html
            }
            Err(FetchFailure::Cancelled) => return Err(MetaError::Cancelled),
            Err(err) => {
                log::warn!("{url}: page fetch failed: {err}");
                report.fetch_error = Some(err.to_string());
                String::new()
            }
        };

        let page = extract::extract(&html, &url);
        log::debug!(
            "{url}: extracted title={:?} candidates={}",
            page.title,
            page.logo_candidates.len()
        );

        let resolution = self
            .resolver
            .resolve(&url, &page.logo_candidates, cancel)
            .await?;

        let metadata = CompanyMetadata {
            title: page.title,
            description: page.description,
            logo_url: resolution.logo_url,
        };

        report.candidates = page.logo_candidates;
        report.probes = resolution.probes;
        report.winner = resolution.winner;
        report.duration_ms = started.elapsed().as_millis() as u64;

        let winner = report
            .winner
            .map(|w| w.to_string())
            .unwrap_or_else(|| "none".to_string());
        log::info!(
            "url={url} outcome=resolved logo_source={winner} probes={} duration_ms={}",
            report.probes.len(),
            report.duration_ms
        );

        // only results from a fetched page are cached
        let cacheable = report.page_fetched && !metadata.is_empty();
        if let (Some(cache), Some(key), true) = (&self.cache, &cache_key, cacheable) {
            cache.insert(key, metadata.clone());
            log::debug!("{key}: cached, {} entries", cache.len());
        }

        Ok((metadata, report))
    }
}

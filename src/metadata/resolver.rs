//! Picks one validated logo URL out of the extracted candidates.
//!
//! Order, first acceptance wins:
//! 1. extracted candidates, in priority order, accepted on any 2xx
//! 2. `{origin}/favicon.ico`, accepted on 2xx
//! 3. the logo-by-domain service (plus domain aliases), accepted on an
//!    `image/*` answer or, unless strict, when the content type can't be seen
//!
//! Probe failures only ever move on to the next source.

use std::collections::BTreeMap;
use std::time::Instant;

use futures::{stream, StreamExt};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::Config;
use crate::metadata::errors::{MetaError, ProbeFailure};
use crate::metadata::normalize::{bare_domain, favicon_url, logo_service_domains};
use crate::metadata::probe::{ProbeResponse, Prober};
use crate::metadata::types::{ProbeOutcome, ProbeRecord, ProbeSource};

#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub logo_service_base_url: String,
    pub domain_aliases: BTreeMap<String, String>,
    pub strict_validation: bool,
    pub probe_concurrency: usize,
}

impl ResolverOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            logo_service_base_url: config.logo_service_base_url.trim().to_string(),
            domain_aliases: config.domain_aliases.clone(),
            strict_validation: config.strict_validation,
            probe_concurrency: config.probe_concurrency.max(1),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub logo_url: Option<String>,
    pub winner: Option<ProbeSource>,
    pub probes: Vec<ProbeRecord>,
}

impl Resolution {
    fn accept(&mut self, record: ProbeRecord) {
        self.logo_url = Some(record.url.clone());
        self.winner = Some(record.source);
        self.probes.push(record);
    }
}

pub struct LogoResolver<P: Prober> {
    prober: P,
    options: ResolverOptions,
}

/// Any 2xx means the resource exists
fn judge_existence(result: &Result<ProbeResponse, ProbeFailure>) -> ProbeOutcome {
    match result {
        Ok(resp) if resp.is_success() => ProbeOutcome::Accepted,
        Ok(resp) => ProbeOutcome::Rejected(ProbeFailure::Status(resp.status).to_string()),
        Err(err) => ProbeOutcome::Rejected(err.to_string()),
    }
}

/// Logo service answers must look like an image. Without strict validation a
/// missing content type, or no answer at all, is taken on trust.
fn judge_image(
    url: &str,
    result: &Result<ProbeResponse, ProbeFailure>,
    strict: bool,
) -> ProbeOutcome {
    match result {
        Ok(resp) if !resp.is_success() => {
            ProbeOutcome::Rejected(ProbeFailure::Status(resp.status).to_string())
        }
        Ok(resp) if resp.is_image() => ProbeOutcome::Accepted,
        Ok(ProbeResponse {
            content_type: Some(ct),
            ..
        }) => ProbeOutcome::Rejected(ProbeFailure::NotAnImage(ct.clone()).to_string()),
        Ok(_) if strict => ProbeOutcome::Rejected(
            ProbeFailure::NotAnImage("missing content type".to_string()).to_string(),
        ),
        Ok(_) => ProbeOutcome::AcceptedOptimistically,
        Err(err @ ProbeFailure::Transport(_)) if strict || Url::parse(url).is_err() => {
            ProbeOutcome::Rejected(err.to_string())
        }
        Err(ProbeFailure::Transport(_)) => ProbeOutcome::AcceptedOptimistically,
        Err(err) => ProbeOutcome::Rejected(err.to_string()),
    }
}

impl<P: Prober> LogoResolver<P> {
    pub fn new(prober: P, options: ResolverOptions) -> Self {
        Self { prober, options }
    }

    async fn timed_probe(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> (Result<ProbeResponse, ProbeFailure>, u64) {
        let started = Instant::now();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProbeFailure::Cancelled),
            res = self.prober.probe(url) => res,
        };
        (result, started.elapsed().as_millis() as u64)
    }

    async fn probe_existence(
        &self,
        url: &str,
        source: ProbeSource,
        cancel: &CancellationToken,
    ) -> ProbeRecord {
        let (result, duration_ms) = self.timed_probe(url, cancel).await;
        let record = ProbeRecord {
            url: url.to_string(),
            source,
            outcome: judge_existence(&result),
            duration_ms,
        };
        log::debug!("probe={source} url={url} outcome={:?}", record.outcome);
        record
    }

    async fn probe_image(&self, url: &str, cancel: &CancellationToken) -> ProbeRecord {
        let (result, duration_ms) = self.timed_probe(url, cancel).await;
        let record = ProbeRecord {
            url: url.to_string(),
            source: ProbeSource::Service,
            outcome: judge_image(url, &result, self.options.strict_validation),
            duration_ms,
        };
        log::debug!("probe=service url={url} outcome={:?}", record.outcome);
        record
    }

    /// Resolve a logo for `page_url`. Only cancellation is an error.
    pub async fn resolve(
        &self,
        page_url: &str,
        candidates: &[String],
        cancel: &CancellationToken,
    ) -> Result<Resolution, MetaError> {
        let mut resolution = Resolution::default();

        if self.options.probe_concurrency <= 1 {
            for candidate in candidates {
                let record = self
                    .probe_existence(candidate, ProbeSource::Candidate, cancel)
                    .await;
                if cancel.is_cancelled() {
                    return Err(MetaError::Cancelled);
                }
                if record.outcome.is_accepted() {
                    resolution.accept(record);
                    return Ok(resolution);
                }
                resolution.probes.push(record);
            }
        } else {
            // `buffered` yields in input order, so a later candidate can only win
            // once every earlier one has failed. Dropping the stream aborts the rest.
            let probes: Vec<_> = candidates
                .iter()
                .map(|candidate| self.probe_existence(candidate, ProbeSource::Candidate, cancel))
                .collect();
            let mut records =
                std::pin::pin!(stream::iter(probes).buffered(self.options.probe_concurrency));

            while let Some(record) = records.next().await {
                if cancel.is_cancelled() {
                    return Err(MetaError::Cancelled);
                }
                if record.outcome.is_accepted() {
                    resolution.accept(record);
                    return Ok(resolution);
                }
                resolution.probes.push(record);
            }
        }

        if let Some(favicon) = favicon_url(page_url) {
            // a failed candidate is never probed twice
            if !candidates.contains(&favicon) {
                let record = self
                    .probe_existence(&favicon, ProbeSource::Favicon, cancel)
                    .await;
                if cancel.is_cancelled() {
                    return Err(MetaError::Cancelled);
                }
                if record.outcome.is_accepted() {
                    resolution.accept(record);
                    return Ok(resolution);
                }
                resolution.probes.push(record);
            }
        }

        let service = self.options.logo_service_base_url.trim_end_matches('/');
        if service.is_empty() {
            return Ok(resolution);
        }

        let Some(domain) = bare_domain(page_url) else {
            return Ok(resolution);
        };

        for domain in logo_service_domains(&domain, &self.options.domain_aliases) {
            let url = format!("{service}/{domain}");
            let record = self.probe_image(&url, cancel).await;
            if cancel.is_cancelled() {
                return Err(MetaError::Cancelled);
            }
            if record.outcome.is_accepted() {
                resolution.accept(record);
                return Ok(resolution);
            }
            resolution.probes.push(record);
        }

        log::debug!("{page_url}: no logo source validated");
        Ok(resolution)
    }
}

use serde::{Deserialize, Serialize};

/// Enrichment result handed back to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyMetadata {
    pub title: String,
    pub description: String,
    /// Confirmed by a probe at resolution time, nothing more.
    pub logo_url: Option<String>,
}

impl CompanyMetadata {
    /// Returns true if enrichment produced nothing usable
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.description.is_empty() && self.logo_url.is_none()
    }
}

/// Output of HTML extraction, before any network validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
    /// Absolute URLs in selector priority order.
    pub logo_candidates: Vec<String>,
}

/// Where a probed URL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeSource {
    Candidate,
    Favicon,
    Service,
}

impl std::fmt::Display for ProbeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeSource::Candidate => write!(f, "candidate"),
            ProbeSource::Favicon => write!(f, "favicon"),
            ProbeSource::Service => write!(f, "service"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Accepted,
    /// Accepted without seeing an image content type (lenient mode only)
    AcceptedOptimistically,
    Rejected(String),
}

impl ProbeOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ProbeOutcome::Accepted | ProbeOutcome::AcceptedOptimistically)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRecord {
    pub url: String,
    pub source: ProbeSource,
    pub outcome: ProbeOutcome,
    pub duration_ms: u64,
}

/// Diagnostics for a single pipeline call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionReport {
    pub normalized_url: String,
    pub page_fetched: bool,
    pub fetch_error: Option<String>,
    pub candidates: Vec<String>,
    pub probes: Vec<ProbeRecord>,
    pub winner: Option<ProbeSource>,
    pub from_cache: bool,
    pub duration_ms: u64,
}

use anyhow::{bail, Context};
use homedir::my_home;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path, time::Duration};

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_LOGO_SERVICE_URL: &str = "https://logo.clearbit.com";
/// Per-request budget for the page fetch and every probe
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 4000;
const DEFAULT_MAX_PAGE_BYTES: usize = 2 * 1024 * 1024;
const DEFAULT_LISTEN: &str = "0.0.0.0:3001";
const DEFAULT_CACHE_TTL_SECS: u64 = 600;
const DEFAULT_CACHE_CAPACITY: usize = 256;
pub const USER_AGENT_DEFAULT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0";

/// Which URLs the fetcher and prober are allowed to touch
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UrlPolicy {
    #[serde(default = "default_allowed_schemes")]
    pub allowed_schemes: Vec<String>,

    #[serde(default)]
    pub blocked_hosts: Vec<String>,

    /// Refuse hosts that resolve to loopback, private or link-local addresses
    #[serde(default = "default_true")]
    pub block_private_ips: bool,

    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for UrlPolicy {
    fn default() -> Self {
        Self {
            allowed_schemes: default_allowed_schemes(),
            blocked_hosts: Vec::new(),
            block_private_ips: true,
            accept_invalid_certs: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Logo-by-domain service, queried as `{logo_service_base_url}/{domain}`.
    /// Empty disables the lookup.
    #[serde(default = "default_logo_service_url")]
    pub logo_service_base_url: String,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Extra domain to ask the logo service about, e.g. `trymesha.com: mesha.ai`
    #[serde(default)]
    pub domain_aliases: BTreeMap<String, String>,

    /// Only accept logo service answers that carry an `image/*` content type
    #[serde(default)]
    pub strict_validation: bool,

    /// Number of candidate probes in flight at once
    #[serde(default = "default_probe_concurrency")]
    pub probe_concurrency: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_max_page_bytes")]
    pub max_page_bytes: usize,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub policy: UrlPolicy,

    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logo_service_base_url: default_logo_service_url(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            domain_aliases: BTreeMap::new(),
            strict_validation: false,
            probe_concurrency: default_probe_concurrency(),
            user_agent: default_user_agent(),
            max_page_bytes: DEFAULT_MAX_PAGE_BYTES,
            cache: CacheConfig::default(),
            policy: UrlPolicy::default(),
            listen: default_listen(),
            base_path: String::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_allowed_schemes() -> Vec<String> {
    vec!["http".to_string(), "https".to_string()]
}

fn default_logo_service_url() -> String {
    DEFAULT_LOGO_SERVICE_URL.to_string()
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_probe_concurrency() -> usize {
    1
}

fn default_user_agent() -> String {
    USER_AGENT_DEFAULT.to_string()
}

fn default_max_page_bytes() -> usize {
    DEFAULT_MAX_PAGE_BYTES
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&mut self) -> anyhow::Result<()> {
        if self.request_timeout_ms == 0 {
            bail!("request_timeout_ms must be greater than 0");
        }

        if self.probe_concurrency == 0 {
            self.probe_concurrency = 1;
        }

        if self.max_page_bytes == 0 {
            bail!("max_page_bytes must be greater than 0");
        }

        if self.cache.enabled && self.cache.capacity == 0 {
            bail!("cache.capacity must be greater than 0 when the cache is enabled");
        }

        let service = self.logo_service_base_url.trim();
        if !service.is_empty() {
            let parsed = url::Url::parse(service)
                .with_context(|| format!("logo_service_base_url '{service}' is not a url"))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                bail!("logo_service_base_url must be http or https, got '{service}'");
            }
        }

        // aliases are matched against lowercased bare domains
        self.domain_aliases = std::mem::take(&mut self.domain_aliases)
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_lowercase()))
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .collect();

        Ok(())
    }

    /// Env overrides are applied on top of the file and are never saved back.
    fn apply_env(&mut self) -> anyhow::Result<()> {
        if let Ok(service) = std::env::var("CMETA_LOGO_SERVICE_URL") {
            self.logo_service_base_url = service;
        }
        if let Ok(timeout) = std::env::var("CMETA_TIMEOUT_MS") {
            self.request_timeout_ms = timeout
                .parse()
                .with_context(|| format!("CMETA_TIMEOUT_MS must be a number, got '{timeout}'"))?;
        }
        Ok(())
    }

    pub fn base_path() -> anyhow::Result<String> {
        if let Ok(path) = std::env::var("CMETA_BASE_PATH") {
            return Ok(path);
        }

        let home = my_home()
            .context("could not determine home directory")?
            .context("home directory path is empty")?;
        Ok(format!("{}/.config/cmeta", home.to_string_lossy()))
    }

    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_with(&Self::base_path()?)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_with(base_path: &str) -> anyhow::Result<Self> {
        let dir = Path::new(base_path);
        let file = dir.join(CONFIG_FILE);

        // create new if does not exist
        if !file.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            std::fs::write(&file, serde_yml::to_string(&Self::default())?)
                .with_context(|| format!("failed to write {}", file.display()))?;
        }

        let config_str = std::fs::read_to_string(&file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        let mut config: Self = serde_yml::from_str(&config_str)
            .with_context(|| format!("{} is malformed", file.display()))?;

        config.base_path = base_path.to_string();
        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let file = Path::new(&self.base_path).join(CONFIG_FILE);
        std::fs::write(&file, serde_yml::to_string(&self)?)
            .with_context(|| format!("failed to write {}", file.display()))?;
        Ok(())
    }
}

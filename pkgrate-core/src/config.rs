//! Upstream host configuration.
//!
//! Built once by a binary and handed to the clients; scoring code never reads
//! the process environment.

use std::time::Duration;

/// Default GitHub REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";
/// Default raw file host.
pub const DEFAULT_RAW_URL: &str = "https://raw.githubusercontent.com";
/// Default npm registry.
pub const DEFAULT_NPM_REGISTRY_URL: &str = "https://registry.npmjs.org";
/// Default `User-Agent` header.
pub const DEFAULT_USER_AGENT: &str = "pkgrate";

/// Endpoints, credentials and limits for the upstream clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// GitHub REST base URL.
    pub api_url: String,
    /// GitHub GraphQL endpoint.
    pub graphql_url: String,
    /// Raw content host used for README and manifest files.
    pub raw_url: String,
    /// npm registry base URL.
    pub npm_registry_url: String,
    /// API token, sent as a bearer token when present.
    pub token: Option<String>,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Requests allowed in flight at once across all scoring runs.
    pub max_in_flight: usize,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Deadline for one whole scoring run.
    pub scoring_deadline: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            graphql_url: format!("{DEFAULT_API_URL}/graphql"),
            raw_url: DEFAULT_RAW_URL.to_string(),
            npm_registry_url: DEFAULT_NPM_REGISTRY_URL.to_string(),
            token: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_in_flight: 8,
            request_timeout: Duration::from_secs(30),
            scoring_deadline: Duration::from_secs(120),
        }
    }
}

impl HostConfig {
    /// Build a configuration from environment variables, falling back to
    /// the defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let api_url = read("GITHUB_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_url);
        let graphql_url = read("GITHUB_GRAPHQL_URL").unwrap_or_else(|| format!("{api_url}/graphql"));
        Self {
            graphql_url,
            raw_url: read("GITHUB_RAW_URL").unwrap_or(defaults.raw_url),
            npm_registry_url: read("NPM_REGISTRY_URL").unwrap_or(defaults.npm_registry_url),
            token: read("GITHUB_TOKEN"),
            user_agent: read("GITHUB_USER_AGENT").unwrap_or(defaults.user_agent),
            max_in_flight: read("PKGRATE_MAX_IN_FLIGHT")
                .and_then(|value| value.parse::<usize>().ok())
                .filter(|value| *value > 0)
                .unwrap_or(defaults.max_in_flight),
            request_timeout: read("PKGRATE_REQUEST_TIMEOUT_SECS")
                .and_then(|value| value.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            scoring_deadline: read("PKGRATE_SCORING_DEADLINE_SECS")
                .and_then(|value| value.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.scoring_deadline),
            api_url,
        }
    }

    /// Point every endpoint at one base URL. Used against local mirrors and
    /// mock servers.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        self.api_url = base.to_string();
        self.graphql_url = format!("{base}/graphql");
        self.raw_url = format!("{base}/raw");
        self.npm_registry_url = format!("{base}/npm");
        self
    }
}

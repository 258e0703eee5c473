//! Error types for pkgrate core.

use std::{error::Error, fmt, io};

use crate::domain::Metric;

/// Error type for pkgrate core operations.
#[derive(Debug)]
pub enum PkgRateError {
    /// The code-hosting or package-registry API could not be reached or
    /// answered with a failure. Retryable by the caller.
    UpstreamUnavailable(String),
    /// The upstream API refused the request because a rate limit was hit.
    UpstreamRateLimited(String),
    /// A specifier, URL or submission could not be parsed.
    MalformedInput(String),
    /// The package failed the ingestion gate; carries the computed metric.
    IngestionRejected(Box<Metric>),
    /// No package, version or record matched.
    NotFound(String),
    /// A record with the same identity already exists.
    Conflict(String),
    /// An underlying I/O error.
    Io(io::Error),
}

impl PkgRateError {
    /// Whether retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable(_) | Self::UpstreamRateLimited(_)
        )
    }
}

impl fmt::Display for PkgRateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpstreamUnavailable(message) => write!(f, "upstream unavailable: {message}"),
            Self::UpstreamRateLimited(message) => write!(f, "upstream rate limited: {message}"),
            Self::MalformedInput(message) => write!(f, "malformed input: {message}"),
            Self::IngestionRejected(metric) => write!(
                f,
                "ingestion rejected for {} (net score {:.1})",
                metric.repo_url, metric.net_score
            ),
            Self::NotFound(message) => write!(f, "not found: {message}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl Error for PkgRateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for PkgRateError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<reqwest::Error> for PkgRateError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            return Self::UpstreamUnavailable(format!("request timed out: {value}"));
        }
        if value.is_decode() {
            return Self::UpstreamUnavailable(format!("response decode failed: {value}"));
        }
        Self::UpstreamUnavailable(value.to_string())
    }
}

impl From<serde_json::Error> for PkgRateError {
    fn from(value: serde_json::Error) -> Self {
        Self::MalformedInput(value.to_string())
    }
}

impl From<semver::Error> for PkgRateError {
    fn from(value: semver::Error) -> Self {
        Self::MalformedInput(value.to_string())
    }
}

/// Convenience result type for pkgrate core.
pub type Result<T> = std::result::Result<T, PkgRateError>;

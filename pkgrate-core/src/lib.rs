#![deny(missing_docs)]
//! pkgrate core library.
//!
//! Quality scoring and version resolution for a package registry: raw
//! repository signals are collected, normalized into sub-scores, combined
//! into a net score that gates ingestion, and stored packages are searched
//! by version specifier.

pub mod collector;
pub mod config;
pub mod domain;
pub mod error;
pub mod formula;
pub mod github;
pub mod license;
pub mod manifest;
pub mod metrics;
pub mod net_score;
pub mod npm;
pub mod popularity;
pub mod query;
pub mod rating;
pub mod scale;
pub mod signals;
pub mod version;

pub use collector::{
    IssueCounts, PullRequestActivity, README_VARIANTS, RepoLocator, RepoSlug, RepositoryHost,
    SignalCollector,
};
pub use config::HostConfig;
pub use domain::{
    ActionEntry, ActionKind, MAX_REVIEW_STARS, Metadata, Metric, PackageQuery, Review, SubScores,
};
pub use error::{PkgRateError, Result};
pub use formula::FormulaConfig;
pub use github::GitHubClient;
pub use license::{AllowListMatcher, LicenseMatcher};
pub use manifest::{PackageManifest, manifest_from_archive, readme_from_archive};
pub use metrics::MetricComputer;
pub use net_score::{build_metric, ensure_ingestible, failing_fields, measure_ingestibility, net_score};
pub use popularity::{HistorySource, PopularityScorer, PopularityWeights, ReviewSource};
pub use query::{CorpusEntry, DEFAULT_PAGE_SIZE, PackageCorpus, QueryPage, QueryResolver, search_by_regex};
pub use rating::{Assessment, Rater};
pub use signals::{MergedPullRequest, RawSignals};
pub use version::VersionConstraint;

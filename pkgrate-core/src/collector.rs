//! Raw signal collection.
//!
//! [`RepositoryHost`] is the seam to the code-hosting and registry APIs; it
//! has one method per independent upstream query. [`SignalCollector`] fans
//! those queries out concurrently and assembles [`RawSignals`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};

use crate::error::{PkgRateError, Result};
use crate::manifest::{MANIFEST_FILE, PackageManifest};
use crate::npm;
use crate::signals::{MergedPullRequest, RawSignals};

/// README file names, in lookup order. The first non-empty one wins.
pub const README_VARIANTS: [&str; 4] = ["README.md", "readme.md", "Readme.md", "readme.markdown"];

/// Owner and name of a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoSlug {
    /// Account or organization.
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl RepoSlug {
    /// Build a slug from its parts.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse the many spellings of a GitHub repository URL: `https://`,
    /// `git+https://`, `git://`, `ssh://git@`, `git@github.com:` and bare
    /// `github.com/`. Trailing `.git`, slashes and extra path segments are
    /// ignored.
    pub fn parse(url: &str) -> Result<Self> {
        let trimmed = url.trim();
        let mut rest = trimmed.strip_prefix("git+").unwrap_or(trimmed);
        for scheme in ["https://", "http://", "git://", "ssh://"] {
            if let Some(stripped) = rest.strip_prefix(scheme) {
                rest = stripped;
                break;
            }
        }
        rest = rest.strip_prefix("git@").unwrap_or(rest);
        rest = rest.strip_prefix("www.").unwrap_or(rest);
        let path = rest
            .strip_prefix("github.com/")
            .or_else(|| rest.strip_prefix("github.com:"))
            .ok_or_else(|| not_github(url))?;
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let mut segments = path.split('/').filter(|segment| !segment.is_empty());
        let owner = segments.next().ok_or_else(|| not_github(url))?;
        let name = segments.next().ok_or_else(|| not_github(url))?;
        let name = name.strip_suffix(".git").unwrap_or(name);
        if name.is_empty() {
            return Err(not_github(url));
        }
        Ok(Self::new(owner, name))
    }

    /// Canonical `https://github.com/owner/name` URL.
    pub fn url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

fn not_github(url: &str) -> PkgRateError {
    PkgRateError::MalformedInput(format!("not a GitHub repository URL: {url}"))
}

/// Where a submitted URL points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoLocator {
    /// A GitHub repository.
    GitHub(RepoSlug),
    /// An npm package page, resolved through the registry.
    Npm(String),
}

impl RepoLocator {
    /// Classify a submitted URL.
    pub fn parse(url: &str) -> Result<Self> {
        if url.contains("npmjs.com/package/") {
            return npm::package_name_from_url(url)
                .map(RepoLocator::Npm)
                .ok_or_else(|| {
                    PkgRateError::MalformedInput(format!("npm package URL names no package: {url}"))
                });
        }
        RepoSlug::parse(url).map(RepoLocator::GitHub)
    }
}

/// Open and closed issue totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IssueCounts {
    /// Open issues.
    pub open: u64,
    /// Closed issues.
    pub closed: u64,
}

/// Merged pull request history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PullRequestActivity {
    /// All merged pull requests.
    pub merged_count: u64,
    /// Most recently merged pull requests, newest first.
    pub recent: Vec<MergedPullRequest>,
    /// Commits brought onto the default branch by merged pull requests.
    pub commits_via_merged: u64,
}

/// One method per independent upstream query.
///
/// Implementations map transport failures to `UpstreamUnavailable` and
/// rate-limit responses to `UpstreamRateLimited`. Absent optional data
/// (a missing file, no license) is `Ok(None)`, never an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Open and closed issue totals.
    async fn issue_counts(&self, repo: &RepoSlug) -> Result<IssueCounts>;

    /// Merged pull request totals and the `sample` most recently merged.
    async fn pull_request_activity(
        &self,
        repo: &RepoSlug,
        sample: usize,
    ) -> Result<PullRequestActivity>;

    /// Commits reachable from the default branch.
    async fn commit_total(&self, repo: &RepoSlug) -> Result<u64>;

    /// Commit contributions per contributor.
    async fn contributors(&self, repo: &RepoSlug) -> Result<Vec<u64>>;

    /// Body of a file on the default branch, `None` when it does not exist.
    async fn file_text(&self, repo: &RepoSlug, path: &str) -> Result<Option<String>>;

    /// Structured license identifier, `None` when none is declared.
    async fn license(&self, repo: &RepoSlug) -> Result<Option<String>>;

    /// Upstream star count; `NotFound` when the repository is gone.
    async fn stargazers(&self, repo: &RepoSlug) -> Result<u64>;

    /// Source repository URL of an npm package.
    async fn npm_repository(&self, package: &str) -> Result<String>;
}

/// Gathers [`RawSignals`] for one repository at a time.
pub struct SignalCollector<H: ?Sized> {
    host: Arc<H>,
    sample_size: usize,
}

impl<H: ?Sized> Clone for SignalCollector<H> {
    fn clone(&self) -> Self {
        Self {
            host: Arc::clone(&self.host),
            sample_size: self.sample_size,
        }
    }
}

impl<H: RepositoryHost + ?Sized> SignalCollector<H> {
    /// Collector sampling up to `sample_size` merged pull requests.
    pub fn new(host: Arc<H>, sample_size: usize) -> Self {
        Self { host, sample_size }
    }

    /// The upstream host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Resolve a submitted URL to a GitHub repository, following npm
    /// package pages through the registry.
    pub async fn locate(&self, url: &str) -> Result<RepoSlug> {
        match RepoLocator::parse(url)? {
            RepoLocator::GitHub(slug) => Ok(slug),
            RepoLocator::Npm(package) => {
                let repository = self.host.npm_repository(&package).await?;
                debug!("npm package {package} resolved to {repository}");
                RepoSlug::parse(&repository)
            }
        }
    }

    /// Fetch every signal concurrently. The first hard failure drops the
    /// remaining requests and fails the whole collection.
    pub async fn collect(&self, repo: &RepoSlug) -> Result<RawSignals> {
        info!("collecting signals for {repo}");
        let host = self.host.as_ref();
        let outcome = tokio::try_join!(
            host.issue_counts(repo),
            host.pull_request_activity(repo, self.sample_size),
            host.commit_total(repo),
            host.contributors(repo),
            self.readme(repo),
            self.manifest(repo),
            self.license(repo),
        );
        let (issues, pulls, total_commits, mut contributors, readme, manifest, license) =
            match outcome {
                Ok(parts) => parts,
                Err(err) => {
                    warn!("collecting signals for {repo} failed: {err}");
                    return Err(err);
                }
            };
        contributors.sort_unstable_by(|a, b| b.cmp(a));
        let mut recent = pulls.recent;
        recent.sort_by(|a, b| b.merged_at.cmp(&a.merged_at));
        recent.truncate(self.sample_size);
        Ok(RawSignals {
            open_issues: issues.open,
            closed_issues: issues.closed,
            merged_pr_count: pulls.merged_count,
            merged_pull_requests: recent,
            total_commits,
            commits_via_merged_prs: pulls.commits_via_merged,
            contributor_commits: contributors,
            readme,
            dependencies: manifest
                .as_ref()
                .map(|manifest| manifest.dependencies.clone())
                .unwrap_or_default(),
            manifest,
            license,
        })
    }

    /// First non-empty README among [`README_VARIANTS`].
    pub async fn readme(&self, repo: &RepoSlug) -> Result<Option<String>> {
        for variant in README_VARIANTS {
            if let Some(body) = self.host.file_text(repo, variant).await? {
                if !body.trim().is_empty() {
                    debug!("{repo}: README found at {variant}");
                    return Ok(Some(body));
                }
            }
        }
        Ok(None)
    }

    /// Decoded `package.json`; `None` when it is missing or undecodable.
    pub async fn manifest(&self, repo: &RepoSlug) -> Result<Option<PackageManifest>> {
        let Some(body) = self.host.file_text(repo, MANIFEST_FILE).await? else {
            return Ok(None);
        };
        match PackageManifest::from_json(&body) {
            Ok(manifest) => Ok(Some(manifest)),
            Err(err) => {
                debug!("{repo}: ignoring undecodable {MANIFEST_FILE}: {err}");
                Ok(None)
            }
        }
    }

    async fn license(&self, repo: &RepoSlug) -> Result<Option<String>> {
        let license = self.host.license(repo).await?;
        Ok(license.filter(|value| {
            let value = value.trim();
            !value.is_empty()
                && !value.eq_ignore_ascii_case("other")
                && !value.eq_ignore_ascii_case("noassertion")
        }))
    }
}

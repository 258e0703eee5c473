//! GitHub and npm registry client.
//!
//! Every upstream response is decoded into a typed struct at this boundary.
//! All requests, across every scoring run sharing the client, draw from one
//! semaphore and one connection pool.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::Semaphore;

use crate::collector::{IssueCounts, PullRequestActivity, RepoSlug, RepositoryHost};
use crate::config::HostConfig;
use crate::error::{PkgRateError, Result};
use crate::npm;
use crate::signals::MergedPullRequest;

/// Merged pull requests fetched per repository; GitHub caps a page at 100.
const PULL_REQUEST_WINDOW: usize = 100;

const ISSUES_QUERY: &str = r#"
query($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    open: issues(states: OPEN) { totalCount }
    closed: issues(states: CLOSED) { totalCount }
  }
}"#;

const PULL_REQUESTS_QUERY: &str = r#"
query($owner: String!, $name: String!, $window: Int!) {
  repository(owner: $owner, name: $name) {
    defaultBranchRef { name }
    merged: pullRequests(states: MERGED) { totalCount }
    recent: pullRequests(states: MERGED, last: $window) {
      nodes { createdAt mergedAt baseRefName commits { totalCount } }
    }
  }
}"#;

const COMMIT_HISTORY_QUERY: &str = r#"
query($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    defaultBranchRef {
      target { ... on Commit { history { totalCount } } }
    }
  }
}"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepositoryData<T> {
    repository: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TotalCount {
    #[serde(rename = "totalCount")]
    total_count: u64,
}

#[derive(Debug, Deserialize)]
struct IssuesNode {
    open: TotalCount,
    closed: TotalCount,
}

#[derive(Debug, Deserialize)]
struct BranchName {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestsNode {
    default_branch_ref: Option<BranchName>,
    merged: TotalCount,
    recent: PullRequestPage,
}

#[derive(Debug, Deserialize)]
struct PullRequestPage {
    #[serde(default)]
    nodes: Vec<Option<PullRequestNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestNode {
    created_at: DateTime<Utc>,
    merged_at: Option<DateTime<Utc>>,
    base_ref_name: String,
    commits: TotalCount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitHistoryNode {
    default_branch_ref: Option<CommitRef>,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    target: Option<CommitTarget>,
}

#[derive(Debug, Deserialize)]
struct CommitTarget {
    history: Option<TotalCount>,
}

#[derive(Debug, Deserialize)]
struct Contributor {
    contributions: u64,
}

#[derive(Debug, Deserialize)]
struct RepositoryInfo {
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    license: Option<LicenseInfo>,
}

#[derive(Debug, Deserialize)]
struct LicenseInfo {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    spdx_id: Option<String>,
}

impl LicenseInfo {
    fn identifier(self) -> Option<String> {
        self.spdx_id
            .filter(|id| !id.eq_ignore_ascii_case("noassertion"))
            .or(self.key)
    }
}

/// reqwest-backed [`RepositoryHost`].
#[derive(Debug, Clone)]
pub struct GitHubClient {
    config: HostConfig,
    http: Client,
    permits: Arc<Semaphore>,
}

impl GitHubClient {
    /// Build a client from an explicit configuration.
    pub fn new(config: HostConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()?;
        let permits = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
        Ok(Self {
            config,
            http,
            permits,
        })
    }

    /// Build a client from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(HostConfig::from_env())
    }

    /// The configuration in use.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Send one request under the shared permit and return the body, or
    /// `None` on 404.
    async fn fetch(&self, request: RequestBuilder, what: &str) -> Result<Option<String>> {
        let _permit = self.permits.acquire().await.map_err(|_| {
            PkgRateError::UpstreamUnavailable("request limiter closed".to_string())
        })?;
        let request = match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("{what}: not found");
            return Ok(None);
        }
        let headers = response.headers().clone();
        let body = response.text().await?;
        if !status.is_success() {
            let err = classify_failure(status, &headers, &body, what);
            warn!("{err}");
            return Err(err);
        }
        Ok(Some(body))
    }

    async fn fetch_required(&self, request: RequestBuilder, what: &str) -> Result<String> {
        self.fetch(request, what).await?.ok_or_else(|| {
            PkgRateError::UpstreamUnavailable(format!("{what}: repository not found"))
        })
    }

    async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
        what: &str,
    ) -> Result<T> {
        let request = self
            .http
            .post(&self.config.graphql_url)
            .json(&json!({ "query": query, "variables": variables }));
        let body = self.fetch_required(request, what).await?;
        let response: GraphQlResponse<RepositoryData<T>> = decode(&body, what)?;
        if let Some(err) = graphql_failure(&response.errors, what) {
            warn!("{err}");
            return Err(err);
        }
        response
            .data
            .and_then(|data| data.repository)
            .ok_or_else(|| PkgRateError::UpstreamUnavailable(format!("{what}: repository not found")))
    }

    fn repo_variables(repo: &RepoSlug) -> serde_json::Value {
        json!({ "owner": repo.owner, "name": repo.name })
    }

    /// Repository document, `None` when the repository does not exist.
    async fn repository_document(&self, repo: &RepoSlug) -> Result<Option<RepositoryInfo>> {
        let what = format!("repository {repo}");
        let url = format!(
            "{}/repos/{}/{}",
            self.config.api_url.trim_end_matches('/'),
            repo.owner,
            repo.name
        );
        match self.fetch(self.http.get(url), &what).await? {
            Some(body) => decode(&body, &what).map(Some),
            None => Ok(None),
        }
    }

    async fn repository_info(&self, repo: &RepoSlug) -> Result<RepositoryInfo> {
        self.repository_document(repo).await?.ok_or_else(|| {
            PkgRateError::UpstreamUnavailable(format!("repository {repo}: repository not found"))
        })
    }
}

fn decode<T: DeserializeOwned>(body: &str, what: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|err| {
        PkgRateError::UpstreamUnavailable(format!("{what}: undecodable response: {err}"))
    })
}

fn classify_failure(status: StatusCode, headers: &HeaderMap, body: &str, what: &str) -> PkgRateError {
    let remaining = headers
        .get("x-ratelimit-remaining")
        .and_then(|value| value.to_str().ok())
        .map(str::trim);
    let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN
            && (remaining == Some("0") || body.to_ascii_lowercase().contains("rate limit")));
    let snippet: String = body.chars().take(200).collect();
    if rate_limited {
        PkgRateError::UpstreamRateLimited(format!("{what} ({status}): {snippet}"))
    } else {
        PkgRateError::UpstreamUnavailable(format!("{what} ({status}): {snippet}"))
    }
}

fn graphql_failure(errors: &[GraphQlError], what: &str) -> Option<PkgRateError> {
    let first = errors.first()?;
    if errors
        .iter()
        .any(|err| err.kind.as_deref() == Some("RATE_LIMITED"))
    {
        return Some(PkgRateError::UpstreamRateLimited(format!(
            "{what}: {}",
            first.message
        )));
    }
    Some(PkgRateError::UpstreamUnavailable(format!(
        "{what}: {}",
        first.message
    )))
}

#[async_trait]
impl RepositoryHost for GitHubClient {
    async fn issue_counts(&self, repo: &RepoSlug) -> Result<IssueCounts> {
        let issues: IssuesNode = self
            .graphql(
                ISSUES_QUERY,
                Self::repo_variables(repo),
                &format!("issues of {repo}"),
            )
            .await?;
        Ok(IssueCounts {
            open: issues.open.total_count,
            closed: issues.closed.total_count,
        })
    }

    async fn pull_request_activity(
        &self,
        repo: &RepoSlug,
        sample: usize,
    ) -> Result<PullRequestActivity> {
        let mut variables = Self::repo_variables(repo);
        variables["window"] = json!(PULL_REQUEST_WINDOW);
        let node: PullRequestsNode = self
            .graphql(
                PULL_REQUESTS_QUERY,
                variables,
                &format!("pull requests of {repo}"),
            )
            .await?;
        let default_branch = node.default_branch_ref.map(|branch| branch.name);
        let mut commits_via_merged = 0;
        let mut recent = Vec::new();
        for pull in node.recent.nodes.into_iter().flatten() {
            let Some(merged_at) = pull.merged_at else {
                continue;
            };
            if default_branch.as_deref() == Some(pull.base_ref_name.as_str()) {
                commits_via_merged += pull.commits.total_count;
            }
            recent.push(MergedPullRequest {
                created_at: pull.created_at,
                merged_at,
            });
        }
        recent.sort_by(|a, b| b.merged_at.cmp(&a.merged_at));
        recent.truncate(sample);
        Ok(PullRequestActivity {
            merged_count: node.merged.total_count,
            recent,
            commits_via_merged,
        })
    }

    async fn commit_total(&self, repo: &RepoSlug) -> Result<u64> {
        let node: CommitHistoryNode = self
            .graphql(
                COMMIT_HISTORY_QUERY,
                Self::repo_variables(repo),
                &format!("commit history of {repo}"),
            )
            .await?;
        Ok(node
            .default_branch_ref
            .and_then(|branch| branch.target)
            .and_then(|target| target.history)
            .map(|history| history.total_count)
            .unwrap_or(0))
    }

    async fn contributors(&self, repo: &RepoSlug) -> Result<Vec<u64>> {
        let what = format!("contributors of {repo}");
        let url = format!(
            "{}/repos/{}/{}/contributors",
            self.config.api_url.trim_end_matches('/'),
            repo.owner,
            repo.name
        );
        let request = self.http.get(url).query(&[("per_page", "100")]);
        let body = self.fetch_required(request, &what).await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        let contributors: Vec<Contributor> = decode(&body, &what)?;
        Ok(contributors
            .into_iter()
            .map(|contributor| contributor.contributions)
            .collect())
    }

    async fn file_text(&self, repo: &RepoSlug, path: &str) -> Result<Option<String>> {
        let url = format!(
            "{}/{}/{}/HEAD/{}",
            self.config.raw_url.trim_end_matches('/'),
            repo.owner,
            repo.name,
            path.trim_start_matches('/')
        );
        self.fetch(self.http.get(url), &format!("{path} of {repo}"))
            .await
    }

    async fn license(&self, repo: &RepoSlug) -> Result<Option<String>> {
        let info = self.repository_info(repo).await?;
        Ok(info.license.and_then(LicenseInfo::identifier))
    }

    async fn stargazers(&self, repo: &RepoSlug) -> Result<u64> {
        self.repository_document(repo)
            .await?
            .map(|info| info.stargazers_count)
            .ok_or_else(|| PkgRateError::NotFound(format!("repository {repo}")))
    }

    async fn npm_repository(&self, package: &str) -> Result<String> {
        let what = format!("npm package {package}");
        let url = format!(
            "{}/{}",
            self.config.npm_registry_url.trim_end_matches('/'),
            npm::registry_path(package)
        );
        let body = self
            .fetch(self.http.get(url), &what)
            .await?
            .ok_or_else(|| PkgRateError::NotFound(what.clone()))?;
        npm::repository_from_document(package, &body)
    }
}

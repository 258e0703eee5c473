//! Raw, unprocessed repository signals.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::manifest::PackageManifest;

/// One merged pull request from the sampled window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedPullRequest {
    /// When the pull request was opened.
    pub created_at: DateTime<Utc>,
    /// When the pull request was merged.
    pub merged_at: DateTime<Utc>,
}

impl MergedPullRequest {
    /// Time from creation to merge, in hours.
    pub fn resolution_hours(&self) -> f64 {
        let seconds = (self.merged_at - self.created_at).num_seconds().abs();
        seconds as f64 / 3600.0
    }
}

/// Everything the metric computer needs about one repository.
///
/// Produced per scoring run and consumed once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSignals {
    /// Open issue count.
    pub open_issues: u64,
    /// Closed issue count.
    pub closed_issues: u64,
    /// Total merged pull request count.
    pub merged_pr_count: u64,
    /// Most recently merged pull requests, newest first.
    pub merged_pull_requests: Vec<MergedPullRequest>,
    /// Commits reachable from the default branch.
    pub total_commits: u64,
    /// Commits that landed on the default branch through merged pull requests.
    pub commits_via_merged_prs: u64,
    /// Commit contributions per contributor, descending.
    pub contributor_commits: Vec<u64>,
    /// README body, if one of the canonical variants exists.
    pub readme: Option<String>,
    /// Declared dependency name to version specifier.
    pub dependencies: BTreeMap<String, String>,
    /// Structured license identifier from the hosting platform.
    pub license: Option<String>,
    /// Decoded `package.json`, when present.
    pub manifest: Option<PackageManifest>,
}

impl RawSignals {
    /// Commits authored by the most active contributor.
    pub fn top_contributor_commits(&self) -> Option<u64> {
        self.contributor_commits.iter().copied().max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn resolution_hours_ignores_order() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let merged = Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap();
        let forward = MergedPullRequest {
            created_at: created,
            merged_at: merged,
        };
        let backward = MergedPullRequest {
            created_at: merged,
            merged_at: created,
        };
        assert_eq!(forward.resolution_hours(), 36.0);
        assert_eq!(backward.resolution_hours(), 36.0);
    }

    #[test]
    fn top_contributor_is_the_maximum() {
        let signals = RawSignals {
            contributor_commits: vec![40, 120, 3],
            ..RawSignals::default()
        };
        assert_eq!(signals.top_contributor_commits(), Some(120));
        assert_eq!(RawSignals::default().top_contributor_commits(), None);
    }
}

//! Domain entities for pkgrate.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{PkgRateError, Result};

/// Quality metric for one scored package.
///
/// Zero-valued fields are omitted when serialized; consumers read an absent
/// field as `0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase", default)]
pub struct Metric {
    /// Repository the metric was computed for. Never serialized.
    #[serde(skip)]
    pub repo_url: String,
    /// Weighted combination of the sub-scores, gated by the license score.
    #[serde(skip_serializing_if = "is_zero")]
    pub net_score: f64,
    /// Contributor diversity, log-scaled.
    #[serde(skip_serializing_if = "is_zero")]
    pub bus_factor: f64,
    /// Ratio of closed issues to all issues.
    #[serde(skip_serializing_if = "is_zero")]
    pub correctness: f64,
    /// README completeness.
    #[serde(skip_serializing_if = "is_zero")]
    pub ramp_up: f64,
    /// Pull request turnaround.
    #[serde(skip_serializing_if = "is_zero")]
    pub responsive_maintainer: f64,
    /// License compatibility.
    #[serde(skip_serializing_if = "is_zero")]
    pub license_score: f64,
    /// Share of dependencies pinned to an exact version.
    #[serde(skip_serializing_if = "is_zero")]
    pub good_pinning_practice: f64,
    /// Share of commits that landed through a reviewed pull request.
    #[serde(skip_serializing_if = "is_zero")]
    pub pull_request: f64,
}

impl Metric {
    /// The seven sub-scores of this metric.
    pub fn sub_scores(&self) -> SubScores {
        SubScores {
            bus_factor: self.bus_factor,
            correctness: self.correctness,
            ramp_up: self.ramp_up,
            responsive_maintainer: self.responsive_maintainer,
            license_score: self.license_score,
            good_pinning_practice: self.good_pinning_practice,
            pull_request: self.pull_request,
        }
    }

    /// All eight scored fields, keyed by their external name.
    pub fn fields(&self) -> [(&'static str, f64); 8] {
        [
            ("NetScore", self.net_score),
            ("BusFactor", self.bus_factor),
            ("Correctness", self.correctness),
            ("RampUp", self.ramp_up),
            ("ResponsiveMaintainer", self.responsive_maintainer),
            ("LicenseScore", self.license_score),
            ("GoodPinningPractice", self.good_pinning_practice),
            ("PullRequest", self.pull_request),
        ]
    }
}

fn is_zero(value: &f64) -> bool {
    *value == 0.0
}

/// The seven normalized sub-scores, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SubScores {
    /// Contributor diversity.
    pub bus_factor: f64,
    /// Issue closure ratio.
    pub correctness: f64,
    /// README completeness.
    pub ramp_up: f64,
    /// Pull request turnaround.
    pub responsive_maintainer: f64,
    /// License compatibility.
    pub license_score: f64,
    /// Dependency pinning.
    pub good_pinning_practice: f64,
    /// Reviewed-commit share.
    pub pull_request: f64,
}

/// Registry metadata for a stored package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Metadata {
    /// Package name.
    #[serde(rename = "Name")]
    pub name: String,
    /// Semantic version string.
    #[serde(rename = "Version")]
    pub version: String,
    /// Registry-assigned identifier.
    #[serde(rename = "ID", default)]
    pub id: String,
    /// Source repository URL. Kept internal.
    #[serde(skip)]
    pub repository: String,
}

/// A `(name, version specifier)` pair used to search the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PackageQuery {
    /// Package name, or `*` to enumerate everything.
    #[serde(rename = "Name")]
    pub name: String,
    /// Version specifier (exact, caret, tilde or bounded range).
    #[serde(rename = "Version", default)]
    pub version: String,
}

impl PackageQuery {
    /// Build a query pair.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Kind of registry action recorded in the audit history.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionKind {
    /// Package created.
    Create,
    /// Package updated.
    Update,
    /// Package downloaded.
    Download,
    /// Package rated.
    Rate,
    /// Package reviewed.
    Review,
}

impl ActionKind {
    /// Upper-case label used in history records.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Create => "CREATE",
            ActionKind::Update => "UPDATE",
            ActionKind::Download => "DOWNLOAD",
            ActionKind::Rate => "RATE",
            ActionKind::Review => "REVIEW",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only audit-history record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ActionEntry {
    /// User that performed the action.
    #[serde(rename = "User")]
    pub user: String,
    /// When the action happened.
    #[serde(rename = "Date")]
    #[schema(value_type = String)]
    pub date: DateTime<Utc>,
    /// What happened.
    #[serde(rename = "Action")]
    pub action: ActionKind,
    /// Metadata of the affected package.
    #[serde(rename = "PackageMetadata")]
    pub metadata: Metadata,
}

impl ActionEntry {
    /// Record an action performed now.
    pub fn now(user: impl Into<String>, action: ActionKind, metadata: Metadata) -> Self {
        Self {
            user: user.into(),
            date: Utc::now(),
            action,
            metadata,
        }
    }
}

/// Highest star rating a review may carry.
pub const MAX_REVIEW_STARS: u8 = 5;

/// A user review of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    /// Reviewer.
    pub user_name: String,
    /// Reviewed package name.
    pub package_name: String,
    /// Star rating, 0 to 5.
    pub stars: u8,
    /// Free-form review text.
    #[serde(default)]
    pub review: String,
}

impl Review {
    /// Build a review, rejecting out-of-range ratings and empty identities.
    pub fn new(
        user_name: impl Into<String>,
        package_name: impl Into<String>,
        stars: u8,
        review: impl Into<String>,
    ) -> Result<Self> {
        let user_name = user_name.into();
        let package_name = package_name.into();
        if user_name.trim().is_empty() {
            return Err(PkgRateError::MalformedInput(
                "review userName is required".to_string(),
            ));
        }
        if package_name.trim().is_empty() {
            return Err(PkgRateError::MalformedInput(
                "review packageName is required".to_string(),
            ));
        }
        if stars > MAX_REVIEW_STARS {
            return Err(PkgRateError::MalformedInput(format!(
                "stars must be between 0 and {MAX_REVIEW_STARS}, got {stars}"
            )));
        }
        Ok(Self {
            user_name,
            package_name,
            stars,
            review: review.into(),
        })
    }
}

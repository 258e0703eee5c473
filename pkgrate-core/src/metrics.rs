//! Sub-metric computation from raw repository signals.
//!
//! Each sub-score reads only [`RawSignals`] and the formula table; none reads
//! another sub-score. Missing data never raises an error: every formula has
//! a defined value for an empty denominator.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::SubScores;
use crate::error::Result;
use crate::formula::FormulaConfig;
use crate::license::{AllowListMatcher, LicenseMatcher};
use crate::scale::{clamp_unit, linear_clamp, log_scale, ratio, round_to};
use crate::signals::{MergedPullRequest, RawSignals};

/// Structured license values that carry no information.
const UNKNOWN_LICENSE_KEYS: &[&str] = &["other", "noassertion", "none"];

/// Turns raw signals into the seven normalized sub-scores.
#[derive(Clone)]
pub struct MetricComputer {
    formula: FormulaConfig,
    license_matcher: Arc<dyn LicenseMatcher>,
}

impl MetricComputer {
    /// Build a computer whose license check is the formula's allow-list.
    pub fn new(formula: FormulaConfig) -> Result<Self> {
        formula.validate()?;
        let matcher = AllowListMatcher::new(&formula.license_allow_list)?;
        Ok(Self {
            formula,
            license_matcher: Arc::new(matcher),
        })
    }

    /// Build a computer with a custom license strategy.
    pub fn with_matcher(formula: FormulaConfig, license_matcher: Arc<dyn LicenseMatcher>) -> Self {
        Self {
            formula,
            license_matcher,
        }
    }

    /// The formula table in use.
    pub fn formula(&self) -> &FormulaConfig {
        &self.formula
    }

    /// Compute all sub-scores, rounded to the formula's precision.
    pub fn compute(&self, signals: &RawSignals) -> SubScores {
        let precision = self.formula.score_precision;
        SubScores {
            bus_factor: round_to(bus_factor(signals), precision),
            correctness: round_to(correctness(signals), precision),
            ramp_up: round_to(
                ramp_up(signals.readme.as_deref(), self.formula.readme_target_chars),
                precision,
            ),
            responsive_maintainer: round_to(
                responsive_maintainer(&signals.merged_pull_requests, &self.formula),
                precision,
            ),
            license_score: round_to(
                license_score(
                    signals.license.as_deref(),
                    signals.readme.as_deref(),
                    self.license_matcher.as_ref(),
                ),
                precision,
            ),
            good_pinning_practice: round_to(pinning_practice(&signals.dependencies), precision),
            pull_request: round_to(pull_request(signals, &self.formula), precision),
        }
    }
}

impl std::fmt::Debug for MetricComputer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricComputer")
            .field("formula", &self.formula)
            .finish_non_exhaustive()
    }
}

/// Closed issues over all issues; `0` without issue history.
pub fn correctness(signals: &RawSignals) -> f64 {
    ratio(
        signals.closed_issues,
        signals.open_issues + signals.closed_issues,
    )
}

/// `1 - top / total`, log-scaled; `0` without commits or contributors.
pub fn bus_factor(signals: &RawSignals) -> f64 {
    if signals.total_commits == 0 {
        return 0.0;
    }
    let Some(top) = signals.top_contributor_commits() else {
        return 0.0;
    };
    let concentration = top as f64 / signals.total_commits as f64;
    log_scale(clamp_unit(1.0 - concentration))
}

/// Average merge time of the sampled pull requests mapped onto the
/// responsiveness curve; `0` without merged pull requests.
pub fn responsive_maintainer(pulls: &[MergedPullRequest], formula: &FormulaConfig) -> f64 {
    let curve = &formula.responsiveness;
    let sample: Vec<&MergedPullRequest> = pulls.iter().take(curve.sample_size).collect();
    if sample.is_empty() {
        return 0.0;
    }
    let total_hours: f64 = sample.iter().map(|pull| pull.resolution_hours()).sum();
    responsiveness_from_hours(total_hours / sample.len() as f64, formula)
}

/// Map an average resolution time in hours onto `[0, 1]`.
pub fn responsiveness_from_hours(average_hours: f64, formula: &FormulaConfig) -> f64 {
    let curve = &formula.responsiveness;
    if average_hours <= curve.best_hours {
        return 1.0;
    }
    if average_hours >= curve.worst_hours {
        return 0.0;
    }
    clamp_unit(1.0 - average_hours / curve.worst_hours).sqrt()
}

/// README length over the target length; `0` without a README.
pub fn ramp_up(readme: Option<&str>, target_chars: usize) -> f64 {
    let Some(readme) = readme else {
        return 0.0;
    };
    linear_clamp(readme.chars().count() as f64, target_chars as f64)
}

/// `1` when the structured license, or failing that the README, names an
/// accepted license.
pub fn license_score(
    license: Option<&str>,
    readme: Option<&str>,
    matcher: &dyn LicenseMatcher,
) -> f64 {
    let structured = license
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .filter(|value| !UNKNOWN_LICENSE_KEYS.contains(&value.to_lowercase().as_str()));
    let accepted = match structured {
        Some(value) => matcher.matches(value),
        None => readme.is_some_and(|text| matcher.matches(text)),
    };
    if accepted { 1.0 } else { 0.0 }
}

/// Reviewed-commit share, scaled and offset; `0` without commits.
pub fn pull_request(signals: &RawSignals, formula: &FormulaConfig) -> f64 {
    if signals.total_commits == 0 {
        return 0.0;
    }
    let share = ratio(signals.commits_via_merged_prs, signals.total_commits);
    clamp_unit(formula.pull_request_scaling.apply(share) + formula.pull_request_offset)
}

/// Share of dependencies pinned to an exact version; `1` with none declared.
pub fn pinning_practice(dependencies: &BTreeMap<String, String>) -> f64 {
    if dependencies.is_empty() {
        return 1.0;
    }
    let pinned = dependencies
        .values()
        .filter(|specifier| is_exact_pin(specifier))
        .count();
    ratio(pinned as u64, dependencies.len() as u64)
}

/// Whether a version specifier names exactly one version.
pub fn is_exact_pin(specifier: &str) -> bool {
    let specifier = specifier.trim();
    !specifier.is_empty()
        && specifier
            .split('.')
            .all(|part| !part.is_empty() && part.bytes().all(|byte| byte.is_ascii_digit()))
}

//! Net-score aggregation and the ingestion gate.

use log::info;

use crate::domain::{Metric, SubScores};
use crate::error::{PkgRateError, Result};
use crate::formula::FormulaConfig;
use crate::scale::{clamp_unit, round_to};

/// Weighted combination of the sub-scores, multiplied by the license score.
///
/// Pull-request and pinning scores are not weighted; they only take part in
/// the ingestion gate.
pub fn net_score(scores: &SubScores, formula: &FormulaConfig) -> f64 {
    let weights = &formula.weights;
    let weighted = weights.correctness * scores.correctness
        + weights.responsive_maintainer * scores.responsive_maintainer
        + weights.bus_factor * scores.bus_factor
        + weights.ramp_up * scores.ramp_up;
    let total = weights.total();
    if total <= 0.0 {
        return 0.0;
    }
    let value = clamp_unit(scores.license_score) * clamp_unit(weighted / total);
    round_to(value, formula.net_score_precision)
}

/// Assemble the reported metric for one repository.
pub fn build_metric(repo_url: impl Into<String>, scores: SubScores, formula: &FormulaConfig) -> Metric {
    Metric {
        repo_url: repo_url.into(),
        net_score: net_score(&scores, formula),
        bus_factor: scores.bus_factor,
        correctness: scores.correctness,
        ramp_up: scores.ramp_up,
        responsive_maintainer: scores.responsive_maintainer,
        license_score: scores.license_score,
        good_pinning_practice: scores.good_pinning_practice,
        pull_request: scores.pull_request,
    }
}

/// Names of the fields that fall below `threshold`.
pub fn failing_fields(metric: &Metric, threshold: f64) -> Vec<&'static str> {
    metric
        .fields()
        .into_iter()
        .filter(|(_, value)| value.is_nan() || *value < threshold)
        .map(|(name, _)| name)
        .collect()
}

/// Whether every one of the eight fields reaches `threshold`.
pub fn measure_ingestibility(metric: &Metric, threshold: f64) -> bool {
    failing_fields(metric, threshold).is_empty()
}

/// Pass the metric through, or reject it with the metric attached.
pub fn ensure_ingestible(metric: Metric, threshold: f64) -> Result<Metric> {
    let failing = failing_fields(&metric, threshold);
    if failing.is_empty() {
        return Ok(metric);
    }
    info!(
        "{} rejected for ingestion, below {threshold}: {}",
        metric.repo_url,
        failing.join(", ")
    );
    Err(PkgRateError::IngestionRejected(Box::new(metric)))
}

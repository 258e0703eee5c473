//! Versioned scoring formula table.
//!
//! Net scores are persisted and compared over time, so every change to a
//! weight, cutoff or allow-list entry gets a new `revision`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PkgRateError, Result};
use crate::scale::ScaleKind;

/// Revision of [`FormulaConfig::current`].
pub const CURRENT_REVISION: u32 = 3;

/// License families accepted by the allow-list, as case-insensitive
/// regular expressions.
pub const PERMISSIVE_LICENSE_PATTERNS: &[&str] = &[
    r"\bMIT\b",
    r"\bApache[-_ ]?(License[-_ ,]*)?(Version[-_ ]*)?2(\.0)?\b",
    r"\bBSD[-_ ]?2[-_ ]?Clause\b",
    r"\bBSD[-_ ]?3[-_ ]?Clause\b",
    r"\bBSD[-_ ]?Zero[-_ ]?Clause\b",
    r"\b0BSD\b",
    r"\bModified[-_ ]BSD\b",
    r"\bISC\b",
    r"\bzlib\b",
    r"\bBoost[-_ ]Software\b",
    r"\bBSL[-_ ]1\.0\b",
    r"\bUPL\b",
    r"\bUniversal[-_ ]Permissive\b",
    r"\bCeCILL([-_ ]?2)?\b",
    r"\bArtistic\b",
    r"\bPublic[-_ ]Domain\b",
    r"\bUnlicense\b",
    r"\bWTFPL\b",
    r"\bX11\b",
    r"\bXFree86\b",
    r"\bZope[-_ ]Public\b",
    r"\bPython[-_ ]Software[-_ ]Foundation\b",
    r"\bPSF\b",
    r"\bNCSA\b",
    r"\bOpenLDAP\b",
    r"\bMozilla[-_ ]Public\b",
    r"\bMPL[-_ ]2\.0\b",
    r"\bIntel[-_ ]Open[-_ ]Source\b",
];

/// Weights of the net-score formula. The divisor is the sum of weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetScoreWeights {
    /// Weight of correctness.
    pub correctness: f64,
    /// Weight of responsive maintainer.
    pub responsive_maintainer: f64,
    /// Weight of bus factor.
    pub bus_factor: f64,
    /// Weight of ramp-up.
    pub ramp_up: f64,
}

impl NetScoreWeights {
    /// Sum of all weights.
    pub fn total(&self) -> f64 {
        self.correctness + self.responsive_maintainer + self.bus_factor + self.ramp_up
    }
}

impl Default for NetScoreWeights {
    fn default() -> Self {
        Self {
            correctness: 1.0,
            responsive_maintainer: 3.0,
            bus_factor: 1.0,
            ramp_up: 2.0,
        }
    }
}

/// Cutoffs of the responsive-maintainer curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponsivenessCurve {
    /// At or below this average resolution time the score is 1.
    pub best_hours: f64,
    /// At or above this average resolution time the score is 0.
    pub worst_hours: f64,
    /// Number of most recently merged pull requests to average.
    pub sample_size: usize,
}

impl Default for ResponsivenessCurve {
    fn default() -> Self {
        Self {
            best_hours: 72.0,
            worst_hours: 750.0,
            sample_size: 50,
        }
    }
}

/// Complete scoring formula: weights, curves, thresholds and allow-list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormulaConfig {
    /// Formula revision; bump on any change.
    pub revision: u32,
    /// Net-score weights.
    pub weights: NetScoreWeights,
    /// Responsive-maintainer cutoffs.
    pub responsiveness: ResponsivenessCurve,
    /// README length, in characters, that earns a full ramp-up score.
    pub readme_target_chars: usize,
    /// Curve applied to the reviewed-commit share.
    pub pull_request_scaling: ScaleKind,
    /// Constant added to the scaled pull-request score before clamping.
    pub pull_request_offset: f64,
    /// Minimum value every field must reach for ingestion.
    pub ingestion_threshold: f64,
    /// Decimal places kept on sub-scores.
    pub score_precision: u32,
    /// Decimal places kept on the net score.
    pub net_score_precision: u32,
    /// Accepted license patterns.
    pub license_allow_list: Vec<String>,
}

impl FormulaConfig {
    /// The formula currently in force.
    pub fn current() -> Self {
        Self {
            revision: CURRENT_REVISION,
            weights: NetScoreWeights::default(),
            responsiveness: ResponsivenessCurve::default(),
            readme_target_chars: 5000,
            pull_request_scaling: ScaleKind::Sqrt,
            pull_request_offset: 0.0,
            ingestion_threshold: 0.5,
            score_precision: 3,
            net_score_precision: 1,
            license_allow_list: PERMISSIVE_LICENSE_PATTERNS
                .iter()
                .map(|pattern| pattern.to_string())
                .collect(),
        }
    }

    /// Parse a JSON formula table. Missing keys fall back to [`Self::current`].
    pub fn from_json(contents: &str) -> Result<Self> {
        let config: FormulaConfig = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON formula table from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Reject tables that would divide by zero or never pass the gate.
    pub fn validate(&self) -> Result<()> {
        if self.weights.total() <= 0.0 {
            return Err(PkgRateError::MalformedInput(
                "formula weights must sum to a positive value".to_string(),
            ));
        }
        if self.responsiveness.best_hours < 0.0
            || self.responsiveness.worst_hours <= self.responsiveness.best_hours
        {
            return Err(PkgRateError::MalformedInput(format!(
                "responsiveness cutoffs must satisfy 0 <= best < worst, got {} and {}",
                self.responsiveness.best_hours, self.responsiveness.worst_hours
            )));
        }
        if self.responsiveness.sample_size == 0 {
            return Err(PkgRateError::MalformedInput(
                "responsiveness sample_size must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.ingestion_threshold) {
            return Err(PkgRateError::MalformedInput(format!(
                "ingestion_threshold must be within [0, 1], got {}",
                self.ingestion_threshold
            )));
        }
        Ok(())
    }
}

impl Default for FormulaConfig {
    fn default() -> Self {
        Self::current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_formula_matches_documented_constants() {
        let config = FormulaConfig::current();
        assert_eq!(config.revision, CURRENT_REVISION);
        assert_eq!(config.weights.total(), 7.0);
        assert_eq!(config.responsiveness.best_hours, 72.0);
        assert_eq!(config.responsiveness.worst_hours, 750.0);
        assert_eq!(config.responsiveness.sample_size, 50);
        assert_eq!(config.readme_target_chars, 5000);
        assert_eq!(config.ingestion_threshold, 0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn json_overrides_only_named_keys() {
        let config = FormulaConfig::from_json(
            r#"{"revision": 4, "responsiveness": {"best_hours": 168.0, "worst_hours": 750.0, "sample_size": 20}}"#,
        )
        .expect("formula");
        assert_eq!(config.revision, 4);
        assert_eq!(config.responsiveness.best_hours, 168.0);
        assert_eq!(config.readme_target_chars, 5000);
        assert_eq!(config.weights, NetScoreWeights::default());
    }

    #[test]
    fn rejects_degenerate_tables() {
        let zero_weights = r#"{"weights": {"correctness": 0.0, "responsive_maintainer": 0.0, "bus_factor": 0.0, "ramp_up": 0.0}}"#;
        assert!(FormulaConfig::from_json(zero_weights).is_err());
        let inverted = r#"{"responsiveness": {"best_hours": 800.0, "worst_hours": 750.0, "sample_size": 50}}"#;
        assert!(FormulaConfig::from_json(inverted).is_err());
        assert!(FormulaConfig::from_json(r#"{"ingestion_threshold": 1.5}"#).is_err());
        assert!(FormulaConfig::from_json("not json").is_err());
    }

    #[test]
    fn loads_from_path() {
        let path = std::env::temp_dir().join(format!(
            "pkgrate_formula_{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"score_precision": 2}"#).expect("write formula");
        let config = FormulaConfig::from_path(&path).expect("load");
        assert_eq!(config.score_precision, 2);
        std::fs::remove_file(&path).expect("cleanup");
    }
}

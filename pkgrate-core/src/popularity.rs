//! Popularity: upstream stars, review ratings and download share.
//!
//! Recomputed on every request from the history and review collaborators;
//! nothing here is cached.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{ActionEntry, ActionKind, Review};
use crate::scale::{clamp_unit, linear_clamp, round_to};

/// Weights and normalization constants of the popularity formula.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopularityWeights {
    /// Weight of the normalized upstream star count.
    pub stars: f64,
    /// Weight of the doubled average review rating.
    pub reviews: f64,
    /// Weight of the download share scaled to ten.
    pub downloads: f64,
    /// Star count that earns a full star score.
    pub star_normalization: f64,
    /// Upper bound of the result.
    pub cap: f64,
    /// Decimal places kept on the result.
    pub precision: u32,
}

impl Default for PopularityWeights {
    fn default() -> Self {
        Self {
            stars: 0.5,
            reviews: 0.3,
            downloads: 0.2,
            star_normalization: 8000.0,
            cap: 10.0,
            precision: 2,
        }
    }
}

/// Raw inputs for one package name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopularityInputs {
    /// Upstream star count.
    pub stars: u64,
    /// Star ratings of every review of the package.
    pub review_stars: Vec<u8>,
    /// Download actions recorded for the package.
    pub downloads: u64,
    /// Highest download count of any package.
    pub max_downloads: u64,
}

impl PopularityInputs {
    /// Mean review rating, `0` without reviews.
    pub fn average_review_stars(&self) -> f64 {
        if self.review_stars.is_empty() {
            return 0.0;
        }
        let total: u64 = self.review_stars.iter().map(|stars| u64::from(*stars)).sum();
        total as f64 / self.review_stars.len() as f64
    }

    /// Downloads relative to the most downloaded package, `0` when nothing
    /// was ever downloaded.
    pub fn download_ratio(&self) -> f64 {
        if self.max_downloads == 0 {
            return 0.0;
        }
        clamp_unit(self.downloads as f64 / self.max_downloads as f64)
    }
}

/// Popularity of one package, in `[0, cap]`.
pub fn popularity(inputs: &PopularityInputs, weights: &PopularityWeights) -> f64 {
    let stars_score = linear_clamp(inputs.stars as f64, weights.star_normalization);
    let value = weights.stars * stars_score
        + weights.reviews * (inputs.average_review_stars() * 2.0)
        + weights.downloads * (inputs.download_ratio() * 10.0);
    round_to(value.clamp(0.0, weights.cap), weights.precision)
}

/// Append-only audit history.
#[cfg_attr(test, mockall::automock)]
pub trait HistorySource: Send + Sync {
    /// Every recorded action.
    fn history(&self) -> Vec<ActionEntry>;
}

/// Review records.
#[cfg_attr(test, mockall::automock)]
pub trait ReviewSource: Send + Sync {
    /// Reviews of the named package.
    fn reviews_for(&self, package_name: &str) -> Vec<Review>;
}

/// Download actions per package name.
pub fn download_counts(history: &[ActionEntry]) -> HashMap<String, u64> {
    let mut counts = HashMap::new();
    for entry in history.iter().filter(|entry| entry.action == ActionKind::Download) {
        *counts.entry(entry.metadata.name.clone()).or_insert(0) += 1;
    }
    counts
}

/// Reads the collaborators and applies [`popularity`].
pub struct PopularityScorer<'a> {
    history: &'a dyn HistorySource,
    reviews: &'a dyn ReviewSource,
    weights: PopularityWeights,
}

impl<'a> PopularityScorer<'a> {
    /// Scorer with the default weights.
    pub fn new(history: &'a dyn HistorySource, reviews: &'a dyn ReviewSource) -> Self {
        Self {
            history,
            reviews,
            weights: PopularityWeights::default(),
        }
    }

    /// Replace the weights.
    pub fn with_weights(mut self, weights: PopularityWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Gather the inputs for `package_name`.
    pub fn inputs(&self, package_name: &str, stars: u64) -> PopularityInputs {
        let downloads = download_counts(&self.history.history());
        PopularityInputs {
            stars,
            review_stars: self
                .reviews
                .reviews_for(package_name)
                .iter()
                .map(|review| review.stars)
                .collect(),
            downloads: downloads.get(package_name).copied().unwrap_or(0),
            max_downloads: downloads.values().copied().max().unwrap_or(0),
        }
    }

    /// Popularity of `package_name` given its upstream star count.
    pub fn score(&self, package_name: &str, stars: u64) -> f64 {
        popularity(&self.inputs(package_name, stars), &self.weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Metadata;

    fn action(name: &str, kind: ActionKind) -> ActionEntry {
        ActionEntry::now(
            "default user",
            kind,
            Metadata {
                name: name.to_string(),
                version: "1.0.0".to_string(),
                id: format!("{name}-id"),
                repository: String::new(),
            },
        )
    }

    fn review(package: &str, stars: u8) -> Review {
        Review::new(format!("user{stars}"), package, stars, "").expect("review")
    }

    #[test]
    fn nothing_known_is_zero() {
        let weights = PopularityWeights::default();
        assert_eq!(popularity(&PopularityInputs::default(), &weights), 0.0);
    }

    #[test]
    fn saturated_inputs_stay_under_the_cap() {
        let weights = PopularityWeights::default();
        let inputs = PopularityInputs {
            stars: 1_000_000,
            review_stars: vec![5, 5, 5],
            downloads: 40,
            max_downloads: 40,
        };
        assert_eq!(popularity(&inputs, &weights), 5.5);
        let generous = PopularityWeights {
            reviews: 10.0,
            ..weights
        };
        assert_eq!(popularity(&inputs, &generous), 10.0);
    }

    #[test]
    fn combines_the_three_signals() {
        let inputs = PopularityInputs {
            stars: 4000,
            review_stars: vec![4, 3],
            downloads: 5,
            max_downloads: 20,
        };
        // 0.5 * 0.5 + 0.3 * 7.0 + 0.2 * 2.5
        assert_eq!(popularity(&inputs, &PopularityWeights::default()), 2.85);
    }

    #[test]
    fn counts_only_download_actions() {
        let history = vec![
            action("left-pad", ActionKind::Download),
            action("left-pad", ActionKind::Create),
            action("left-pad", ActionKind::Download),
            action("is-odd", ActionKind::Download),
            action("is-odd", ActionKind::Rate),
        ];
        let counts = download_counts(&history);
        assert_eq!(counts.get("left-pad"), Some(&2));
        assert_eq!(counts.get("is-odd"), Some(&1));
    }

    #[test]
    fn scorer_reads_history_and_reviews() {
        let mut history = MockHistorySource::new();
        history.expect_history().returning(|| {
            vec![
                action("left-pad", ActionKind::Download),
                action("is-odd", ActionKind::Download),
                action("is-odd", ActionKind::Download),
            ]
        });
        let mut reviews = MockReviewSource::new();
        reviews
            .expect_reviews_for()
            .withf(|name| name == "left-pad")
            .returning(|name| vec![review(name, 5), review(name, 3)]);

        let scorer = PopularityScorer::new(&history, &reviews);
        let inputs = scorer.inputs("left-pad", 800);
        assert_eq!(inputs.downloads, 1);
        assert_eq!(inputs.max_downloads, 2);
        assert_eq!(inputs.average_review_stars(), 4.0);
        // 0.5 * 0.1 + 0.3 * 8.0 + 0.2 * 5.0
        assert_eq!(scorer.score("left-pad", 800), 3.45);
    }

    #[test]
    fn unknown_package_without_activity_scores_zero() {
        let mut history = MockHistorySource::new();
        history.expect_history().returning(Vec::new);
        let mut reviews = MockReviewSource::new();
        reviews.expect_reviews_for().returning(|_| Vec::new());
        let scorer = PopularityScorer::new(&history, &reviews);
        assert_eq!(scorer.score("ghost", 0), 0.0);
    }
}

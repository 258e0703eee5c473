//! End-to-end rating: locate, collect, compute, aggregate.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::collector::{RepoSlug, RepositoryHost, SignalCollector};
use crate::domain::Metric;
use crate::error::{PkgRateError, Result};
use crate::formula::FormulaConfig;
use crate::metrics::MetricComputer;
use crate::net_score::{build_metric, ensure_ingestible, measure_ingestibility};
use crate::signals::RawSignals;

/// Outcome of one scoring run, with the signals it was computed from.
#[derive(Debug, Clone)]
pub struct Assessment {
    /// Repository the URL resolved to.
    pub repo: RepoSlug,
    /// Computed metric.
    pub metric: Metric,
    /// Signals gathered on the way, including the README and manifest.
    pub signals: RawSignals,
}

/// Scores repositories with one formula and one upstream host.
pub struct Rater<H: ?Sized> {
    collector: SignalCollector<H>,
    computer: MetricComputer,
    deadline: Duration,
}

impl<H: ?Sized> Clone for Rater<H> {
    fn clone(&self) -> Self {
        Self {
            collector: self.collector.clone(),
            computer: self.computer.clone(),
            deadline: self.deadline,
        }
    }
}

impl<H: RepositoryHost + ?Sized> Rater<H> {
    /// Rater applying `formula`, giving each run `deadline` to finish.
    pub fn new(host: Arc<H>, formula: FormulaConfig, deadline: Duration) -> Result<Self> {
        let sample_size = formula.responsiveness.sample_size;
        let computer = MetricComputer::new(formula)?;
        Ok(Self {
            collector: SignalCollector::new(host, sample_size),
            computer,
            deadline,
        })
    }

    /// The signal collector, for callers that need the host directly.
    pub fn collector(&self) -> &SignalCollector<H> {
        &self.collector
    }

    /// The formula in force.
    pub fn formula(&self) -> &FormulaConfig {
        self.computer.formula()
    }

    /// Resolve a submitted URL to a repository.
    pub async fn locate(&self, url: &str) -> Result<RepoSlug> {
        self.collector.locate(url).await
    }

    /// Score the repository behind `url`.
    pub async fn rate(&self, url: &str) -> Result<Metric> {
        Ok(self.assess(url).await?.metric)
    }

    /// Score the repository behind `url`, keeping the collected signals.
    pub async fn assess(&self, url: &str) -> Result<Assessment> {
        info!("rating {url}");
        let run = async {
            let repo = self.collector.locate(url).await?;
            let signals = self.collector.collect(&repo).await?;
            Ok::<_, PkgRateError>((repo, signals))
        };
        let (repo, signals) = match tokio::time::timeout(self.deadline, run).await {
            Ok(outcome) => outcome?,
            Err(_) => {
                warn!("rating {url} exceeded {:?}", self.deadline);
                return Err(PkgRateError::UpstreamUnavailable(format!(
                    "scoring {url} did not finish within {:?}",
                    self.deadline
                )));
            }
        };
        let scores = self.computer.compute(&signals);
        let metric = build_metric(url, scores, self.computer.formula());
        debug!("{url}: {metric:?}");
        Ok(Assessment {
            repo,
            metric,
            signals,
        })
    }

    /// Score `url` and apply the ingestion gate.
    pub async fn rate_for_ingestion(&self, url: &str) -> Result<Metric> {
        Ok(self.assess_for_ingestion(url).await?.metric)
    }

    /// [`Rater::assess`], rejecting repositories that fail the gate.
    pub async fn assess_for_ingestion(&self, url: &str) -> Result<Assessment> {
        let Assessment {
            repo,
            metric,
            signals,
        } = self.assess(url).await?;
        let metric = ensure_ingestible(metric, self.computer.formula().ingestion_threshold)?;
        Ok(Assessment {
            repo,
            metric,
            signals,
        })
    }

    /// Whether a computed metric passes the gate of this formula.
    pub fn passes_gate(&self, metric: &Metric) -> bool {
        measure_ingestibility(metric, self.computer.formula().ingestion_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::tests::{healthy_host, merged_after};
    use crate::collector::{IssueCounts, MockRepositoryHost, PullRequestActivity};

    const URL: &str = "https://github.com/acme/widget";

    fn rater(host: MockRepositoryHost) -> Rater<MockRepositoryHost> {
        Rater::new(
            Arc::new(host),
            FormulaConfig::current(),
            Duration::from_secs(5),
        )
        .expect("rater")
    }

    #[tokio::test]
    async fn rates_a_healthy_repository() {
        let metric = rater(healthy_host()).rate(URL).await.expect("metric");
        assert_eq!(metric.repo_url, URL);
        assert_eq!(metric.correctness, 0.9);
        assert_eq!(metric.ramp_up, 1.0);
        assert_eq!(metric.license_score, 1.0);
        // ln((e - 1) * 0.6 + 1)
        assert_eq!(metric.bus_factor, 0.709);
        assert_eq!(metric.responsive_maintainer, 1.0);
        assert_eq!(metric.good_pinning_practice, 1.0);
        // sqrt(700 / 1000)
        assert_eq!(metric.pull_request, 0.837);
        // (0.9 + 3 + 0.709 + 2) / 7
        assert_eq!(metric.net_score, 0.9);
    }

    #[tokio::test]
    async fn healthy_repository_is_ingestible() {
        let rater = rater(healthy_host());
        let metric = rater.rate_for_ingestion(URL).await.expect("ingestible");
        assert!(rater.passes_gate(&metric));
        assert!(metric.fields().iter().all(|(_, value)| *value >= 0.5));
    }

    #[tokio::test]
    async fn ingestion_keeps_the_collected_manifest_and_readme() {
        let mut host = MockRepositoryHost::new();
        host.expect_issue_counts().returning(|_| {
            Ok(IssueCounts {
                open: 10,
                closed: 90,
            })
        });
        host.expect_pull_request_activity().returning(|_, _| {
            Ok(PullRequestActivity {
                merged_count: 1,
                recent: vec![merged_after(5, 1)],
                commits_via_merged: 700,
            })
        });
        host.expect_commit_total().returning(|_| Ok(1000));
        host.expect_contributors()
            .returning(|_| Ok(vec![400, 350, 250]));
        host.expect_license().returning(|_| Ok(Some("mit".to_string())));
        host.expect_file_text()
            .withf(|_, path| path == "package.json")
            .times(1)
            .returning(|_, _| {
                Ok(Some(
                    r#"{"name": "widget", "version": "3.1.0", "dependencies": {"a": "1.0.0"}}"#
                        .to_string(),
                ))
            });
        host.expect_file_text()
            .withf(|_, path| path == "README.md")
            .times(1)
            .returning(|_, _| Ok(Some("w".repeat(6000))));
        let assessment = rater(host)
            .assess_for_ingestion(URL)
            .await
            .expect("ingestible");
        assert_eq!(assessment.repo, RepoSlug::new("acme", "widget"));
        let manifest = assessment.signals.manifest.expect("manifest");
        assert_eq!(manifest.name, "widget");
        assert_eq!(manifest.version, "3.1.0");
        assert_eq!(assessment.signals.readme.map(|readme| readme.len()), Some(6000));
        assert_eq!(assessment.metric.net_score, 0.9);
    }

    #[tokio::test]
    async fn weak_repository_is_rejected_with_its_metric() {
        let mut host = MockRepositoryHost::new();
        host.expect_issue_counts()
            .returning(|_| Ok(IssueCounts { open: 9, closed: 1 }));
        host.expect_pull_request_activity().returning(|_, _| {
            Ok(PullRequestActivity {
                merged_count: 1,
                recent: vec![merged_after(2, 1)],
                commits_via_merged: 1,
            })
        });
        host.expect_commit_total().returning(|_| Ok(100));
        host.expect_contributors().returning(|_| Ok(vec![100]));
        host.expect_file_text().returning(|_, _| Ok(None));
        host.expect_license()
            .returning(|_| Ok(Some("apache-2.0".to_string())));
        match rater(host).rate_for_ingestion(URL).await {
            Err(PkgRateError::IngestionRejected(metric)) => {
                assert_eq!(metric.correctness, 0.1);
                assert_eq!(metric.bus_factor, 0.0);
                assert_eq!(metric.license_score, 1.0);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_urls_never_reach_the_host() {
        let host = MockRepositoryHost::new();
        let err = rater(host).rate("ftp://example.com/x").await.unwrap_err();
        assert!(matches!(err, PkgRateError::MalformedInput(_)));
    }

    #[tokio::test]
    async fn deadline_expiry_is_unavailable() {
        struct StalledHost;

        #[async_trait::async_trait]
        impl RepositoryHost for StalledHost {
            async fn issue_counts(&self, _repo: &RepoSlug) -> Result<IssueCounts> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(IssueCounts::default())
            }
            async fn pull_request_activity(
                &self,
                _repo: &RepoSlug,
                _sample: usize,
            ) -> Result<PullRequestActivity> {
                Ok(PullRequestActivity::default())
            }
            async fn commit_total(&self, _repo: &RepoSlug) -> Result<u64> {
                Ok(0)
            }
            async fn contributors(&self, _repo: &RepoSlug) -> Result<Vec<u64>> {
                Ok(Vec::new())
            }
            async fn file_text(&self, _repo: &RepoSlug, _path: &str) -> Result<Option<String>> {
                Ok(None)
            }
            async fn license(&self, _repo: &RepoSlug) -> Result<Option<String>> {
                Ok(None)
            }
            async fn stargazers(&self, _repo: &RepoSlug) -> Result<u64> {
                Ok(0)
            }
            async fn npm_repository(&self, package: &str) -> Result<String> {
                Err(PkgRateError::NotFound(package.to_string()))
            }
        }

        let rater = Rater::new(
            Arc::new(StalledHost),
            FormulaConfig::current(),
            Duration::from_millis(50),
        )
        .expect("rater");
        let err = rater.rate(URL).await.unwrap_err();
        assert!(matches!(err, PkgRateError::UpstreamUnavailable(_)), "{err}");
    }
}

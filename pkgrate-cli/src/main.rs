#![deny(missing_docs)]
//! pkgrate command-line interface.
//!
//! Rates repositories in batches and checks version specifiers offline.

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};
use pkgrate_core::{FormulaConfig, Metric, Rater, RepositoryHost, VersionConstraint};
#[cfg(not(test))]
use pkgrate_core::{GitHubClient, HostConfig};
use serde::Serialize;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub(crate) type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "pkgrate", version, about = "pkgrate CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
#[command(group(
    ArgGroup::new("source")
        .required(true)
        .args(&["file", "url"])
))]
struct SourceArgs {
    /// File containing repository URLs (one per line).
    #[arg(short, long)]
    file: Option<PathBuf>,
    /// Single repository or npm package URL to rate.
    #[arg(long)]
    url: Option<String>,
}

#[derive(Args, Clone)]
struct OutputArgs {
    /// Output format for report data.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Write the report to a file instead of stdout.
    #[arg(long = "report-output")]
    report_output: Option<PathBuf>,
}

#[derive(ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
enum OutputFormat {
    Text,
    Json,
    Ndjson,
}

#[derive(Subcommand)]
enum Commands {
    /// Score repositories from a URL or a file of URLs.
    Rate {
        #[command(flatten)]
        source: SourceArgs,
        /// Maximum number of repositories rated at once.
        #[arg(short = 'j', long, env = "PKGRATE_CONCURRENCY", default_value_t = 4)]
        concurrency: usize,
        /// JSON scoring formula replacing the built-in one.
        #[arg(long, env = "PKGRATE_FORMULA_PATH")]
        formula: Option<PathBuf>,
        #[command(flatten)]
        report: OutputArgs,
    },
    /// Check candidate versions against a version specifier.
    Satisfies {
        /// Exact, caret (^), tilde (~) or bounded (A-B) specifier.
        specifier: String,
        /// Versions to test.
        #[arg(required = true)]
        versions: Vec<String>,
    },
}

/// Outcome of rating one URL.
#[derive(Debug, Clone, Serialize)]
struct RateReport {
    #[serde(rename = "URL")]
    url: String,
    #[serde(flatten)]
    metric: Option<Metric>,
    #[serde(rename = "Ingestible")]
    ingestible: bool,
    #[serde(rename = "Error", skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl RateReport {
    fn failed(url: String, error: String) -> Self {
        Self {
            url,
            metric: None,
            ingestible: false,
            error: Some(error),
        }
    }
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> CliResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Rate {
            source,
            concurrency,
            formula,
            report,
        } => {
            let urls = resolve_urls(&source).await?;
            if urls.is_empty() {
                println!("No repositories found to rate.");
                return Ok(());
            }
            let config = HostConfig::from_env();
            let deadline = config.scoring_deadline;
            let host: Arc<dyn RepositoryHost> = Arc::new(GitHubClient::new(config)?);
            let rater = Rater::new(host, load_formula(formula.as_deref())?, deadline)?;
            let reports = rate_all(rater, urls, concurrency).await?;
            emit_reports(&reports, &report).await?;
        }
        Commands::Satisfies {
            specifier,
            versions,
        } => {
            print!("{}", render_satisfies(&specifier, &versions)?);
        }
    }

    Ok(())
}

#[cfg(test)]
fn main() {}

fn load_formula(path: Option<&Path>) -> CliResult<FormulaConfig> {
    match path {
        Some(path) => {
            info!("loading scoring formula from {}", path.display());
            Ok(FormulaConfig::from_path(path)?)
        }
        None => Ok(FormulaConfig::current()),
    }
}

async fn resolve_urls(source: &SourceArgs) -> CliResult<Vec<String>> {
    if let Some(file) = &source.file {
        return load_urls(file).await;
    }
    if let Some(url) = &source.url {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err("url cannot be empty".into());
        }
        return Ok(vec![trimmed.to_string()]);
    }
    Err("no repository source provided".into())
}

async fn load_urls(path: &Path) -> CliResult<Vec<String>> {
    let contents = tokio::fs::read_to_string(path).await?;
    let urls = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();
    Ok(urls)
}

async fn rate_one(rater: &Rater<dyn RepositoryHost>, url: String) -> RateReport {
    match rater.rate(&url).await {
        Ok(metric) => {
            let ingestible = rater.passes_gate(&metric);
            RateReport {
                url,
                metric: Some(metric),
                ingestible,
                error: None,
            }
        }
        Err(err) => {
            warn!("rating {url} failed: {err}");
            RateReport::failed(url, err.to_string())
        }
    }
}

/// Rate `urls` with at most `concurrency` in flight. Reports keep input order.
async fn rate_all(
    rater: Rater<dyn RepositoryHost>,
    urls: Vec<String>,
    concurrency: usize,
) -> CliResult<Vec<RateReport>> {
    let concurrency = if concurrency == 0 { 1 } else { concurrency };
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut tasks = JoinSet::new();

    for (index, url) in urls.iter().cloned().enumerate() {
        let permit = semaphore.clone().acquire_owned().await?;
        let rater = rater.clone();
        tasks.spawn(async move {
            let _permit = permit;
            (index, rate_one(&rater, url).await)
        });
    }

    let mut slots: Vec<Option<RateReport>> = vec![None; urls.len()];
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok((index, report)) => slots[index] = Some(report),
            Err(err) => warn!("rating task failed: {err}"),
        }
    }

    Ok(slots
        .into_iter()
        .zip(urls)
        .map(|(slot, url)| {
            slot.unwrap_or_else(|| RateReport::failed(url, "rating task aborted".to_string()))
        })
        .collect())
}

async fn emit_reports(reports: &[RateReport], output: &OutputArgs) -> CliResult<()> {
    let contents = match output.format {
        OutputFormat::Text => render_text(reports),
        OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(reports)?),
        OutputFormat::Ndjson => render_ndjson(reports)?,
    };
    emit_output(output, contents).await
}

async fn emit_output(output: &OutputArgs, contents: String) -> CliResult<()> {
    if let Some(path) = &output.report_output {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, contents).await?;
    } else {
        print!("{contents}");
    }
    Ok(())
}

fn render_ndjson(reports: &[RateReport]) -> CliResult<String> {
    let mut output = String::new();
    for report in reports {
        output.push_str(&serde_json::to_string(report)?);
        output.push('\n');
    }
    Ok(output)
}

fn render_text(reports: &[RateReport]) -> String {
    let mut output = String::new();
    for report in reports {
        let _ = writeln!(output, "URL: {}", report.url);
        match (&report.metric, &report.error) {
            (Some(metric), _) => {
                let verdict = if report.ingestible {
                    "ingestible"
                } else {
                    "rejected"
                };
                let _ = writeln!(output, "Gate: {verdict}");
                for (name, value) in metric.fields() {
                    let _ = writeln!(output, "  {name}: {value}");
                }
            }
            (None, Some(error)) => {
                let _ = writeln!(output, "Status: failed ({error})");
            }
            (None, None) => {
                let _ = writeln!(output, "Status: pending");
            }
        }
        let _ = writeln!(output);
    }
    output
}

fn render_satisfies(specifier: &str, versions: &[String]) -> CliResult<String> {
    let constraint = VersionConstraint::parse(specifier)?;
    let mut output = String::new();
    for version in versions {
        let verdict = if constraint.matches(version) {
            "match"
        } else {
            "no match"
        };
        let _ = writeln!(output, "{version}: {verdict}");
    }
    Ok(output)
}

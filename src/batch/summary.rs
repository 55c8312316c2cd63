//! Batch summary: per-experiment aggregates over replicate runs.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::{RunOutcome, RunStatus};
use crate::error::Result;

/// Mean, min, max and raw values of one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggStats {
    /// Mean, rounded to 4 decimals.
    pub mean: f64,
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
    /// Values in collection order.
    pub values: Vec<f64>,
}

impl AggStats {
    /// None when there is no data.
    pub fn of(values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            mean: (mean * 10_000.0).round() / 10_000.0,
            min,
            max,
            values,
        })
    }
}

/// One run in the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRow {
    /// Replicate number.
    pub replicate: u32,
    /// Final state.
    pub status: RunStatus,
    /// Wall-clock seconds.
    pub duration_seconds: f64,
    /// Failure reason.
    pub error: Option<String>,
    /// Cooperation rate, if results were found.
    pub cooperation_rate: Option<f64>,
    /// Coordination-aware cooperation rate.
    pub coop_ewan: Option<f64>,
    /// Provider calls.
    pub total_api_calls: Option<u64>,
    /// Rounds played.
    pub total_rounds: Option<u32>,
    /// Output directory.
    pub output_dir: String,
}

/// Aggregates for one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    /// Runs collected.
    pub replicates: usize,
    /// Status → count.
    pub statuses: BTreeMap<RunStatus, usize>,
    /// Cooperation rate across runs.
    pub cooperation_rate: Option<AggStats>,
    /// Coordination-aware cooperation rate across runs.
    pub coop_ewan: Option<AggStats>,
    /// Provider calls across runs.
    pub total_api_calls: Option<AggStats>,
    /// Rounds across runs.
    pub total_rounds: Option<AggStats>,
    /// Per-run rows.
    pub runs: Vec<RunRow>,
}

impl ExperimentSummary {
    /// Runs with the given status.
    pub fn count(&self, status: RunStatus) -> usize {
        self.statuses.get(&status).copied().unwrap_or(0)
    }
}

/// Contents of `batch_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// When the summary was built.
    pub generated_at: DateTime<Local>,
    /// Wall-clock seconds for the whole batch.
    pub total_duration_seconds: f64,
    /// Experiment name → aggregates.
    pub experiments: BTreeMap<String, ExperimentSummary>,
}

impl BatchSummary {
    /// Group outcomes by experiment.
    pub fn from_outcomes(outcomes: &[RunOutcome], total_duration_seconds: f64) -> Self {
        let mut grouped: BTreeMap<&str, Vec<&RunOutcome>> = BTreeMap::new();
        for outcome in outcomes {
            grouped
                .entry(outcome.job.experiment_name.as_str())
                .or_default()
                .push(outcome);
        }

        let experiments = grouped
            .into_iter()
            .map(|(name, runs)| (name.to_string(), summarize(&runs)))
            .collect();

        Self {
            generated_at: Local::now(),
            total_duration_seconds,
            experiments,
        }
    }

    /// Runs that succeeded, across experiments.
    pub fn succeeded(&self) -> usize {
        self.experiments
            .values()
            .map(|e| e.count(RunStatus::Success))
            .sum()
    }

    /// Write as pretty JSON.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// Comparison table across experiments.
    pub fn table(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(85);
        let _ = writeln!(out, "\n{rule}");
        let _ = writeln!(
            out,
            "  {:<20} {:>5} {:>4} {:>5} {:>12} {:>13} {:>12}",
            "Experiment", "Reps", "OK", "Fail", "Coop Rate", "Coop (Ewan)", "API Calls"
        );
        let _ = writeln!(out, "  {}", "-".repeat(77));
        for (name, exp) in &self.experiments {
            let fail = exp.count(RunStatus::Failed) + exp.count(RunStatus::Timeout);
            let pct = |s: &Option<AggStats>| {
                s.as_ref()
                    .map(|s| format!("{:.2}%", s.mean * 100.0))
                    .unwrap_or_else(|| "n/a".to_string())
            };
            let api = exp
                .total_api_calls
                .as_ref()
                .map(|s| format!("{:.0}", s.mean))
                .unwrap_or_else(|| "n/a".to_string());
            let _ = writeln!(
                out,
                "  {:<20} {:>5} {:>4} {:>5} {:>12} {:>13} {:>12}",
                name,
                exp.replicates,
                exp.count(RunStatus::Success),
                fail,
                pct(&exp.cooperation_rate),
                pct(&exp.coop_ewan),
                api
            );
        }
        let _ = writeln!(out, "{rule}");
        out
    }
}

fn summarize(runs: &[&RunOutcome]) -> ExperimentSummary {
    let mut statuses: BTreeMap<RunStatus, usize> =
        RunStatus::ALL.into_iter().map(|s| (s, 0)).collect();
    for run in runs {
        *statuses.entry(run.status).or_default() += 1;
    }

    let metric = |f: fn(&RunOutcome) -> Option<f64>| {
        AggStats::of(runs.iter().filter_map(|r| f(r)).collect())
    };

    ExperimentSummary {
        replicates: runs.len(),
        statuses,
        cooperation_rate: metric(|r| r.results.as_ref().map(|x| x.cooperation_rate)),
        coop_ewan: metric(|r| r.results.as_ref().map(|x| x.coop_ewan)),
        total_api_calls: metric(|r| r.results.as_ref().map(|x| x.total_api_calls as f64)),
        total_rounds: metric(|r| r.results.as_ref().map(|x| f64::from(x.total_rounds))),
        runs: runs
            .iter()
            .map(|r| RunRow {
                replicate: r.job.replicate,
                status: r.status,
                duration_seconds: r.duration_seconds,
                error: r.error.clone(),
                cooperation_rate: r.results.as_ref().map(|x| x.cooperation_rate),
                coop_ewan: r.results.as_ref().map(|x| x.coop_ewan),
                total_api_calls: r.results.as_ref().map(|x| x.total_api_calls),
                total_rounds: r.results.as_ref().map(|x| x.total_rounds),
                output_dir: r.job.output_dir.display().to_string(),
            })
            .collect(),
    }
}

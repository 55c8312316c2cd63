//! Bounded pool of child-process runs.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::Job;
use crate::engine::SimulationResult;
use crate::error::{GameSimError, Result};

/// Per-run wall-clock limit.
pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;

const STDERR_TAIL_CHARS: usize = 500;

/// Final state of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Exit code 0.
    Success,
    /// Non-zero exit or the child could not start.
    Failed,
    /// Killed after exceeding the timeout.
    Timeout,
}

impl RunStatus {
    /// Every status, in report order.
    pub const ALL: [RunStatus; 3] = [RunStatus::Success, RunStatus::Failed, RunStatus::Timeout];

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
            RunStatus::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// The job that ran.
    pub job: Job,
    /// Final state.
    pub status: RunStatus,
    /// Wall-clock seconds, rounded to 0.1.
    pub duration_seconds: f64,
    /// Tail of stderr or a short reason when not successful.
    pub error: Option<String>,
    /// Newest `results_*.json` in the job's output directory.
    pub results: Option<SimulationResult>,
}

/// How the pool launches runs.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Executable started for each job.
    pub program: PathBuf,
    /// Arguments placed before the `run` subcommand.
    pub leading_args: Vec<String>,
    /// Maximum concurrent runs.
    pub workers: usize,
    /// Pause between launches.
    pub delay: Duration,
    /// Per-run wall-clock limit.
    pub timeout: Duration,
    /// Passed through as `--api-key`.
    pub api_key: Option<String>,
    /// Passed through as `--dry-run`.
    pub dry_run: bool,
    /// Let child output through instead of capturing it.
    pub verbose: bool,
}

impl RunnerOptions {
    /// One worker, one second stagger, default timeout.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            workers: 1,
            delay: Duration::from_secs(1),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            api_key: None,
            dry_run: false,
            verbose: false,
        }
    }
}

/// Runs jobs as isolated child processes.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    options: Arc<RunnerOptions>,
}

impl BatchRunner {
    /// Validate the options.
    pub fn new(options: RunnerOptions) -> Result<Self> {
        if options.workers < 1 {
            return Err(GameSimError::Batch("workers must be at least 1".to_string()));
        }
        Ok(Self {
            options: Arc::new(options),
        })
    }

    /// Options in use.
    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Command line for one job.
    pub fn command(&self, job: &Job) -> Command {
        let opts = &self.options;
        let mut cmd = Command::new(&opts.program);
        cmd.args(&opts.leading_args)
            .arg("run")
            .arg("--agents")
            .arg(&job.agents_csv)
            .arg("--config")
            .arg(&job.experiment_csv)
            .arg("--output")
            .arg(&job.output_dir);
        if let Some(key) = &opts.api_key {
            cmd.arg("--api-key").arg(key);
        }
        if opts.dry_run {
            cmd.arg("--dry-run");
        }
        if opts.verbose {
            cmd.arg("--verbose");
        }
        cmd
    }

    /// Run one job to completion, failure or timeout.
    pub async fn run_job(&self, job: Job) -> RunOutcome {
        let start = Instant::now();
        let mut cmd = self.command(&job);
        cmd.kill_on_drop(true).stdin(Stdio::null());
        if self.options.verbose {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            cmd.stdout(Stdio::null()).stderr(Stdio::piped());
        }

        let (status, error) = match cmd.spawn() {
            Err(e) => (RunStatus::Failed, Some(format!("failed to start: {e}"))),
            Ok(child) => {
                // dropping the wait future on timeout kills the child
                match tokio::time::timeout(self.options.timeout, child.wait_with_output()).await {
                    Err(_) => (
                        RunStatus::Timeout,
                        Some(format!("Exceeded {}s timeout", self.options.timeout.as_secs())),
                    ),
                    Ok(Err(e)) => (RunStatus::Failed, Some(e.to_string())),
                    Ok(Ok(output)) if output.status.success() => (RunStatus::Success, None),
                    Ok(Ok(output)) => {
                        let stderr = String::from_utf8_lossy(&output.stderr);
                        let stderr = stderr.trim();
                        let error = if stderr.is_empty() {
                            match output.status.code() {
                                Some(code) => format!("exit code {code}"),
                                None => "terminated by signal".to_string(),
                            }
                        } else {
                            tail_chars(stderr, STDERR_TAIL_CHARS)
                        };
                        (RunStatus::Failed, Some(error))
                    },
                }
            },
        };

        let duration_seconds = (start.elapsed().as_secs_f64() * 10.0).round() / 10.0;
        let results = find_results(&job.output_dir);
        RunOutcome {
            job,
            status,
            duration_seconds,
            error,
            results,
        }
    }

    /// Run every job, stopping early on Ctrl-C.
    pub async fn run(&self, jobs: Vec<Job>) -> Vec<RunOutcome> {
        self.run_until(jobs, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "cannot listen for interrupts");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run every job until `shutdown` resolves. On shutdown no further job
    /// is launched, in-flight runs are killed, and only runs that already
    /// finished are returned.
    pub async fn run_until(
        &self,
        jobs: Vec<Job>,
        shutdown: impl Future<Output = ()>,
    ) -> Vec<RunOutcome> {
        let total = jobs.len();
        let permits = Arc::new(Semaphore::new(self.options.workers));
        let mut set: JoinSet<(usize, RunOutcome)> = JoinSet::new();
        let mut outcomes = Vec::with_capacity(total);
        tokio::pin!(shutdown);
        let mut interrupted = false;

        'launch: for (idx, job) in jobs.into_iter().enumerate() {
            if idx > 0 && !self.options.delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.options.delay) => {},
                    _ = &mut shutdown => {
                        interrupted = true;
                        break 'launch;
                    },
                }
            }
            let permit = loop {
                tokio::select! {
                    permit = permits.clone().acquire_owned() => match permit {
                        Ok(permit) => break permit,
                        Err(_) => break 'launch,
                    },
                    Some(done) = set.join_next(), if !set.is_empty() => {
                        collect(done, total, &mut outcomes);
                    },
                    _ = &mut shutdown => {
                        interrupted = true;
                        break 'launch;
                    },
                }
            };

            println!("  [{}/{}] STARTED  {}", idx + 1, total, job.label());
            let runner = self.clone();
            set.spawn(async move {
                let outcome = runner.run_job(job).await;
                drop(permit);
                (idx, outcome)
            });
        }

        if !interrupted {
            loop {
                tokio::select! {
                    done = set.join_next() => match done {
                        Some(done) => collect(done, total, &mut outcomes),
                        None => break,
                    },
                    _ = &mut shutdown => {
                        interrupted = true;
                        break;
                    },
                }
            }
        }

        if interrupted {
            println!("\n  Interrupted! Collecting completed results...");
            set.abort_all();
            while let Some(done) = set.join_next().await {
                if let Ok(done) = done {
                    collect(Ok(done), total, &mut outcomes);
                }
            }
        }
        outcomes
    }
}

fn collect(
    done: std::result::Result<(usize, RunOutcome), tokio::task::JoinError>,
    total: usize,
    outcomes: &mut Vec<RunOutcome>,
) {
    match done {
        Ok((idx, outcome)) => {
            let tag = match outcome.status {
                RunStatus::Success => "DONE".to_string(),
                status => status.as_str().to_uppercase(),
            };
            println!(
                "  [{}/{}] {:<8} {} ({}s)",
                idx + 1,
                total,
                tag,
                outcome.job.label(),
                outcome.duration_seconds
            );
            outcomes.push(outcome);
        },
        Err(e) if e.is_cancelled() => debug!("run cancelled"),
        Err(e) => warn!(error = %e, "run task panicked"),
    }
}

/// Last `n` characters of `text`.
fn tail_chars(text: &str, n: usize) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(n)).collect()
}

/// Newest parseable `results_*.json` in `dir`.
fn find_results(dir: &Path) -> Option<SimulationResult> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("results_") && n.ends_with(".json"))
        })
        .collect();
    files.sort();
    files.into_iter().rev().find_map(|path| {
        let bytes = std::fs::read(&path).ok()?;
        serde_json::from_slice(&bytes).ok()
    })
}

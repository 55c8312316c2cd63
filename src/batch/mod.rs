//! Batch execution of many independent simulation runs.
//!
//! A batch CSV lists experiments (`experiment_name`, `agents_csv`,
//! `experiment_csv`, optional `replicates`). Each replicate becomes a
//! [`Job`] with its own output directory and runs as a separate child
//! process, so one run's crash or timeout cannot touch its siblings.

mod runner;
mod summary;

use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{GameSimError, Result};

pub use runner::{BatchRunner, RunOutcome, RunStatus, RunnerOptions, DEFAULT_TIMEOUT_SECS};
pub use summary::{AggStats, BatchSummary, ExperimentSummary, RunRow};

const REQUIRED_COLUMNS: [&str; 3] = ["experiment_name", "agents_csv", "experiment_csv"];

lazy_static! {
    static ref NAME_PATTERN: Regex =
        Regex::new(r"^[a-zA-Z0-9_-]+$").expect("static pattern compiles");
}

/// One row of the batch CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchExperiment {
    /// Experiment name; also the output subdirectory.
    pub name: String,
    /// Agent roster CSV.
    pub agents_csv: PathBuf,
    /// Experiment parameters file.
    pub experiment_csv: PathBuf,
    /// Independent runs of this experiment.
    pub replicates: u32,
}

/// One run of one experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Experiment name.
    pub experiment_name: String,
    /// Agent roster CSV.
    pub agents_csv: PathBuf,
    /// Experiment parameters file.
    pub experiment_csv: PathBuf,
    /// 1-based replicate number.
    pub replicate: u32,
    /// Output directory of this run.
    pub output_dir: PathBuf,
}

impl Job {
    /// `experiment/rep_n`.
    pub fn label(&self) -> String {
        format!("{}/rep_{}", self.experiment_name, self.replicate)
    }
}

/// Load and validate a batch CSV.
pub fn load_batch_config(path: impl AsRef<Path>) -> Result<Vec<BatchExperiment>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| {
        GameSimError::Config(format!("batch config file not found: {} ({e})", path.display()))
    })?;
    let experiments = read_batch_config(file, &path.display().to_string())?;
    info!("Loaded {} experiments from {}", experiments.len(), path.display());
    Ok(experiments)
}

fn read_batch_config(reader: impl std::io::Read, source: &str) -> Result<Vec<BatchExperiment>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    if headers.iter().all(str::is_empty) {
        return Err(GameSimError::Config(format!("batch config file is empty: {source}")));
    }
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .into_iter()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .collect();
    if !missing.is_empty() {
        return Err(GameSimError::MissingColumns {
            file: source.to_string(),
            columns: missing.join(", "),
        });
    }
    let column = |name: &str| headers.iter().position(|h| h == name);
    let (name_col, agents_col, experiment_col) = (
        column("experiment_name").unwrap_or(0),
        column("agents_csv").unwrap_or(1),
        column("experiment_csv").unwrap_or(2),
    );
    let replicates_col = column("replicates");

    let mut experiments = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record?;
        // header is row 1
        let row = idx + 2;
        let field = |col: usize| record.get(col).unwrap_or("").to_string();

        let name = field(name_col);
        if name.is_empty() {
            return Err(GameSimError::Config(format!(
                "{source} row {row}: experiment_name is empty"
            )));
        }
        if !NAME_PATTERN.is_match(&name) {
            return Err(GameSimError::invalid_value(
                format!("experiment_name (row {row})"),
                &name,
                "only letters, digits, hyphens and underscores are allowed",
            ));
        }

        let agents_csv = PathBuf::from(field(agents_col));
        let experiment_csv = PathBuf::from(field(experiment_col));
        for (param, file) in [("agents_csv", &agents_csv), ("experiment_csv", &experiment_csv)] {
            if !file.exists() {
                return Err(GameSimError::Config(format!(
                    "{source} row {row}: {param} file not found: {}",
                    file.display()
                )));
            }
        }

        let raw = replicates_col.map(field).unwrap_or_default();
        let replicates = if raw.is_empty() {
            1
        } else {
            match raw.parse::<u32>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(GameSimError::invalid_value(
                        format!("replicates (row {row})"),
                        &raw,
                        "must be a positive integer",
                    ))
                },
            }
        };

        experiments.push(BatchExperiment {
            name,
            agents_csv,
            experiment_csv,
            replicates,
        });
    }

    if experiments.is_empty() {
        return Err(GameSimError::Config(format!(
            "{source} has no experiment rows"
        )));
    }
    Ok(experiments)
}

/// Experiments × replicates, each with `<base>/<experiment>/rep_<n>` as
/// output directory.
pub fn expand_jobs(experiments: &[BatchExperiment], base_output: &Path) -> Vec<Job> {
    experiments
        .iter()
        .flat_map(|exp| {
            (1..=exp.replicates).map(move |rep| Job {
                experiment_name: exp.name.clone(),
                agents_csv: exp.agents_csv.clone(),
                experiment_csv: exp.experiment_csv.clone(),
                replicate: rep,
                output_dir: base_output.join(&exp.name).join(format!("rep_{rep}")),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(
                dir.path().join("agents.csv"),
                "strategy_name,system_prompt,frequency\n",
            )
            .unwrap();
            std::fs::write(dir.path().join("exp.csv"), "parameter,value\n").unwrap();
            Self { dir }
        }

        fn path(&self, name: &str) -> String {
            self.dir.path().join(name).display().to_string()
        }

        fn batch(&self, rows: &[String]) -> String {
            let mut csv = String::from("experiment_name,agents_csv,experiment_csv,replicates\n");
            for row in rows {
                csv.push_str(row);
                csv.push('\n');
            }
            csv
        }
    }

    #[test]
    fn test_load_and_expand() {
        let fx = Fixture::new();
        let (agents, exp) = (fx.path("agents.csv"), fx.path("exp.csv"));
        let csv = fx.batch(&[
            format!("baseline,{agents},{exp},3"),
            format!("no-gossip,{agents},{exp},"),
        ]);
        let experiments = read_batch_config(csv.as_bytes(), "batch.csv").unwrap();
        assert_eq!(experiments.len(), 2);
        assert_eq!(experiments[1].replicates, 1);

        let jobs = expand_jobs(&experiments, Path::new("results"));
        assert_eq!(jobs.len(), 4);
        assert_eq!(jobs[2].output_dir, Path::new("results/baseline/rep_3"));
        assert_eq!(jobs[3].label(), "no-gossip/rep_1");
    }

    #[test]
    fn test_rejects_bad_rows() {
        let fx = Fixture::new();
        let (agents, exp) = (fx.path("agents.csv"), fx.path("exp.csv"));

        let bad_name = fx.batch(&[format!("bad name!,{agents},{exp},1")]);
        assert!(read_batch_config(bad_name.as_bytes(), "b").unwrap_err().is_config());

        let zero = fx.batch(&[format!("ok,{agents},{exp},0")]);
        assert!(matches!(
            read_batch_config(zero.as_bytes(), "b").unwrap_err(),
            GameSimError::InvalidValue { .. }
        ));

        let missing_file = fx.batch(&[format!("ok,{},{exp},1", fx.path("nope.csv"))]);
        assert!(read_batch_config(missing_file.as_bytes(), "b").is_err());

        let no_rows = fx.batch(&[]);
        assert!(read_batch_config(no_rows.as_bytes(), "b").is_err());

        assert!(read_batch_config("".as_bytes(), "b").is_err());
        assert!(matches!(
            read_batch_config("experiment_name,agents_csv\n".as_bytes(), "b").unwrap_err(),
            GameSimError::MissingColumns { .. }
        ));
    }
}

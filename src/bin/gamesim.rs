//! GameSim CLI binary.
//!
//! Multi-agent game theory experiments with LLM-driven players.
//!
//! # Commands
//!
//! - `run` - Run one simulation and record it to an output directory
//! - `batch` - Run many simulations from a batch CSV as isolated processes
//! - `analyze` - Report on a finished run's output directory
//! - `init` - Create working directories and configuration templates
//! - `scenarios` - Print the scenario catalog (without move mappings)

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use gamesim::{
    analysis::AnalysisReport,
    batch::{expand_jobs, load_batch_config, BatchRunner, BatchSummary, RunnerOptions},
    config::{load_agents, write_agent_template, write_experiment_template},
    engine::seeded_rng,
    AgentSpec, CsvRecorder, DecisionProvider, DryRunProvider, ExperimentConfig, GameType,
    HttpProvider, ProviderConfig, ScenarioCatalog, Simulation, SimulationResult, VERSION,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "gamesim")]
#[command(version = VERSION)]
#[command(about = "GameSim - Multi-agent game theory experiments with LLM players", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one simulation
    Run {
        /// Agent roster CSV
        #[arg(long)]
        agents: PathBuf,

        /// Experiment parameters (CSV or TOML); defaults when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output directory for records
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// API key (default: OPENAI_API_KEY)
        #[arg(long)]
        api_key: Option<String>,

        /// Answer every call with fixed canonical responses
        #[arg(long)]
        dry_run: bool,

        /// RNG seed (overrides the config file)
        #[arg(long)]
        seed: Option<u64>,

        /// Debug logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run a batch of experiments
    Batch {
        /// Batch config CSV
        #[arg(long)]
        batch: PathBuf,

        /// Base output directory
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Max parallel runs
        #[arg(long, default_value = "1")]
        workers: usize,

        /// Seconds between launches
        #[arg(long, default_value = "1.0")]
        delay: f64,

        /// Per-run timeout in seconds
        #[arg(long, default_value = "3600")]
        timeout: u64,

        /// API key passed through to each run
        #[arg(long)]
        api_key: Option<String>,

        /// Pass --dry-run to each run
        #[arg(long)]
        dry_run: bool,

        /// Show run output in real time
        #[arg(short, long)]
        verbose: bool,

        /// Executable for each run (default: this binary)
        #[arg(long, hide = true)]
        program: Option<PathBuf>,
    },

    /// Analyze a run's output directory
    Analyze {
        /// Output directory of a run
        output_dir: PathBuf,

        /// Also write the report as JSON
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Create directories and configuration templates
    Init {
        /// Base directory
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },

    /// Print the scenario catalog
    Scenarios {
        /// Only this game type
        #[arg(long)]
        game: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            agents,
            config,
            output,
            api_key,
            dry_run,
            seed,
            verbose,
        } => cmd_run(&agents, config.as_deref(), &output, api_key, dry_run, seed, verbose),

        Commands::Batch {
            batch,
            output,
            workers,
            delay,
            timeout,
            api_key,
            dry_run,
            verbose,
            program,
        } => {
            let program = match program {
                Some(program) => program,
                None => std::env::current_exe()?,
            };
            let options = RunnerOptions {
                workers,
                delay: Duration::from_secs_f64(delay.max(0.0)),
                timeout: Duration::from_secs(timeout),
                api_key,
                dry_run,
                verbose,
                ..RunnerOptions::new(program)
            };
            cmd_batch(&batch, &output, options)
        },

        Commands::Analyze { output_dir, export } => cmd_analyze(&output_dir, export.as_deref()),

        Commands::Init { dir } => cmd_init(&dir),

        Commands::Scenarios { game } => cmd_scenarios(game.as_deref()),
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    let log_level = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

fn cmd_run(
    agents: &Path,
    config: Option<&Path>,
    output: &Path,
    api_key: Option<String>,
    dry_run: bool,
    seed: Option<u64>,
    verbose: bool,
) -> anyhow::Result<()> {
    // Configuration errors surface before anything is written
    let specs = load_agents(agents)?;
    let mut config = match config {
        Some(path) => ExperimentConfig::load(path)?,
        None => ExperimentConfig::default(),
    };
    if seed.is_some() {
        config.seed = seed;
    }
    config.validate()?;

    let provider_config = ProviderConfig::from_env().with_api_key(api_key);
    let http = if dry_run {
        None
    } else {
        Some(HttpProvider::new(provider_config)?)
    };

    let run_id = Uuid::new_v4().to_string();
    let recorder = CsvRecorder::create(output, run_id.as_str())?;
    let log_file = std::fs::File::create(output.join(format!("simulation_{}.log", recorder.stamp())))?;
    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .init();

    if dry_run {
        tracing::info!("DRY RUN MODE - no provider calls will be made");
    }
    tracing::info!("Output directory: {}", output.display());

    let result = match http {
        Some(provider) => simulate(&specs, config, provider, recorder, &run_id, dry_run)?,
        None => simulate(&specs, config, DryRunProvider, recorder, &run_id, dry_run)?,
    };

    println!("\n{}", "=".repeat(50));
    println!("SIMULATION COMPLETE");
    println!("{}", "=".repeat(50));
    println!("Total pairings:      {}", result.total_pairings);
    println!("Total rounds:        {}", result.total_rounds);
    println!("Total API calls:     {}", result.total_api_calls);
    println!("Cooperation rate:    {:.2}%", result.cooperation_rate * 100.0);
    println!("Coop rate (Ewan):    {:.2}%", result.coop_ewan * 100.0);
    if result.record_failures > 0 {
        println!("Record failures:     {}", result.record_failures);
    }
    println!("Results saved to:    {}", output.display());

    Ok(())
}

fn simulate<P: DecisionProvider>(
    specs: &[AgentSpec],
    config: ExperimentConfig,
    provider: P,
    recorder: CsvRecorder,
    run_id: &str,
    dry_run: bool,
) -> anyhow::Result<SimulationResult> {
    let rng = seeded_rng(config.seed);
    let mut sim = Simulation::new(specs, config, provider, rng, dry_run)?
        .with_recorder(recorder)
        .with_run_id(run_id);

    let runtime = tokio::runtime::Runtime::new()?;
    Ok(runtime.block_on(sim.run())?)
}

fn cmd_batch(batch: &Path, output: &Path, options: RunnerOptions) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(options.verbose))
        .init();

    let experiments = load_batch_config(batch)?;
    let jobs = expand_jobs(&experiments, output);
    let runner = BatchRunner::new(options)?;

    let total_runs: u32 = experiments.iter().map(|e| e.replicates).sum();
    let rule = "=".repeat(60);
    println!("\n{rule}");
    println!(
        "  Batch Runner - {} experiment(s), {} total run(s)",
        experiments.len(),
        total_runs
    );
    if runner.options().dry_run {
        println!("  Mode: DRY RUN (no API calls)");
    }
    println!("  Workers: {}", runner.options().workers);
    println!("{rule}");
    for exp in &experiments {
        println!(
            "  {:<20}  agents={:<30}  config={:<30}  reps={}",
            exp.name,
            exp.agents_csv.display(),
            exp.experiment_csv.display(),
            exp.replicates
        );
    }
    println!("{rule}\n");

    std::fs::create_dir_all(output)?;
    println!("Running experiments...\n");
    let start = Instant::now();
    let total = jobs.len();
    let runtime = tokio::runtime::Runtime::new()?;
    let outcomes = runtime.block_on(runner.run(jobs));
    let elapsed = (start.elapsed().as_secs_f64() * 10.0).round() / 10.0;

    let summary = BatchSummary::from_outcomes(&outcomes, elapsed);
    let summary_path = output.join("batch_summary.json");
    summary.write(&summary_path)?;
    println!("\nBatch summary saved to: {}", summary_path.display());
    print!("{}", summary.table());

    let succeeded = summary.succeeded();
    println!("Completed {succeeded}/{total} runs in {elapsed}s");
    if succeeded < total {
        anyhow::bail!("{} of {} runs did not succeed", total - succeeded, total);
    }
    Ok(())
}

fn cmd_analyze(output_dir: &Path, export: Option<&Path>) -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(env_filter(false)).init();

    println!("Loading data from {}...", output_dir.display());
    let report = AnalysisReport::load(output_dir)?;
    print!("{}", report.render());
    println!("Analysis complete!");

    if let Some(path) = export {
        report.export(path)?;
        println!("\nExported analysis to {}", path.display());
    }
    Ok(())
}

fn cmd_init(dir: &Path) -> anyhow::Result<()> {
    println!("GameSim - Setup");
    println!("{}", "=".repeat(60));

    println!("\nCreating directories...");
    for name in ["output", "configs", "results"] {
        std::fs::create_dir_all(dir.join(name))?;
        println!("  Created directory: {name}/");
    }

    let configs = dir.join("configs");
    let agents = configs.join("agents_template.csv");
    write_agent_template(&agents)?;
    println!("  Created agent template: {}", agents.display());
    let experiment = configs.join("experiment_template.csv");
    write_experiment_template(&experiment)?;
    println!("  Created experiment template: {}", experiment.display());

    println!("\nChecking OpenAI API key...");
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.trim().is_empty() => {
            let prefix: String = key.chars().take(8).collect();
            println!("  API key found in environment (starts with {prefix}...)");
        },
        _ => {
            println!("  API key NOT found");
            println!("  Set it with: export OPENAI_API_KEY='your-key-here'");
            println!("  Or pass it with --api-key when running");
        },
    }

    let rule = "=".repeat(60);
    println!("\n{rule}\nQUICK START GUIDE\n{rule}");
    println!("\n1. Edit configuration files:");
    println!("   - {} (agent strategies)", agents.display());
    println!("   - {} (experiment parameters)", experiment.display());
    println!("\n2. Run a simulation:");
    println!(
        "   gamesim run --agents {} --config {} --output results/my_experiment/",
        agents.display(),
        experiment.display()
    );
    println!("\n3. Test without API calls:");
    println!(
        "   gamesim run --agents {} --config {} --output results/test/ --dry-run",
        agents.display(),
        experiment.display()
    );
    println!("\n4. Analyze a run:");
    println!("   gamesim analyze results/my_experiment/");
    println!("{rule}");
    Ok(())
}

fn cmd_scenarios(game: Option<&str>) -> anyhow::Result<()> {
    let catalog = ScenarioCatalog::builtin();
    let mut export = catalog.export();
    if let Some(name) = game {
        let game: GameType = name.parse()?;
        export.retain(|g, _| *g == game);
    }
    println!("{}", serde_json::to_string_pretty(&export)?);
    Ok(())
}

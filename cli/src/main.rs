//! Evoscope CLI: drive GA/PSO sessions from the terminal.
//!
//! `shell` speaks the same JSON-lines protocol a UI client would, `run` is a
//! headless comparison.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use evoscope::{analyze, Analysis, ReportData, Session, SessionConfig};
use evoscope_optimization::benchmarks::{self, BENCHMARKS};
use evoscope_optimization::{
    compile, BestRecord, DeParams, DifferentialEngine, GeneticEngine, Objective, Rastrigin,
    SteppableOptimizer, SwarmEngine,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "evoscope", version, about = "Side-by-side GA and PSO optimization")]
struct Cli {
    /// Session settings file (YAML, or JSON with a .json extension)
    #[arg(long, global = true, env = "EVOSCOPE_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Log level, written to stderr
    #[arg(long, default_value = "warn", global = true)]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum Algorithm {
    Ga,
    Pso,
    De,
}

/// Overrides applied on top of the settings file
#[derive(Args)]
struct SessionArgs {
    /// Objective formula over x1..xN
    #[arg(long)]
    expr: Option<String>,

    /// Catalog benchmark; sets the formula, dimensions and bounds
    #[arg(long, conflicts_with = "expr")]
    benchmark: Option<String>,

    #[arg(long)]
    pop_size: Option<usize>,

    #[arg(long)]
    dimensions: Option<usize>,

    /// min, max or target
    #[arg(long)]
    mode: Option<String>,

    /// Value sought in target mode
    #[arg(long)]
    target: Option<f64>,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer JSON commands read from stdin, one JSON line per command
    Shell {
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Run a fixed number of iterations and compare the results
    Run {
        #[command(flatten)]
        session: SessionArgs,

        #[arg(long, short = 'n', default_value_t = 100)]
        iterations: usize,

        /// Comma-separated list of algorithms
        #[arg(long, value_delimiter = ',', default_value = "ga,pso")]
        algorithms: Vec<Algorithm>,

        /// Enable convergence detection and stop each algorithm once it converges
        #[arg(long)]
        stop_on_convergence: bool,
    },
    /// List the built-in benchmark functions
    Benchmarks,
}

fn main() {
    let cli = Cli::parse();

    // stdout carries the JSON replies, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Shell { session } => run_shell(&cli, session),
        Commands::Run {
            session,
            iterations,
            algorithms,
            stop_on_convergence,
        } => run_comparison(&cli, session, *iterations, algorithms, *stop_on_convergence),
        Commands::Benchmarks => list_benchmarks(&cli.format),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&PathBuf>, args: &SessionArgs) -> Result<SessionConfig> {
    let mut config = match path {
        Some(path) => SessionConfig::from_path(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => SessionConfig::default(),
    };

    if let Some(key) = &args.benchmark {
        let bench =
            benchmarks::lookup(key).with_context(|| format!("unknown benchmark '{}'", key))?;
        config.function_expr = Some(bench.expression.to_string());
        config.dimensions = bench.dimensions;
        config.bounds = Some(vec![bench.bounds; bench.dimensions]);
    }
    if let Some(expr) = &args.expr {
        config.function_expr = Some(expr.clone());
    }
    if let Some(pop_size) = args.pop_size {
        config.pop_size = pop_size;
    }
    if let Some(dimensions) = args.dimensions {
        config.dimensions = dimensions;
    }
    if let Some(mode) = &args.mode {
        config.optimization_mode = mode.clone();
    }
    if let Some(target) = args.target {
        config.target_value = target;
    }
    Ok(config)
}

fn make_rng(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
}

#[derive(Serialize)]
struct ReportOutput {
    report: ReportData,
    analysis: Analysis,
}

fn run_shell(cli: &Cli, args: &SessionArgs) -> Result<()> {
    let config = load_config(cli.config.as_ref(), args)?;
    let mut rng = make_rng(args.seed);
    let mut session = Session::with_rng(config, &mut rng)?;

    eprintln!("Evoscope shell: one JSON command per line, :report for a summary, :quit to exit.");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match trimmed {
            ":quit" | ":exit" | ":q" => break,
            ":report" => {
                let report = ReportData::from_session(&session);
                let analysis = report.analyze();
                let output = ReportOutput { report, analysis };
                writeln!(stdout, "{}", serde_json::to_string(&output)?)?;
            }
            message => {
                let response = session.handle_with(message, &mut rng);
                writeln!(stdout, "{}", serde_json::to_string(&response)?)?;
            }
        }
        stdout.flush()?;
    }

    info!("shell closed");
    Ok(())
}

#[derive(Serialize)]
struct AlgorithmSummary {
    algorithm: &'static str,
    best: BestRecord,
    history: Vec<f64>,
    steps: usize,
    converged: bool,
}

#[derive(Serialize)]
struct RunOutput {
    objective: String,
    mode: String,
    summaries: Vec<AlgorithmSummary>,
    analysis: Option<Analysis>,
}

fn run_engine<O: SteppableOptimizer>(
    mut engine: O,
    iterations: usize,
    stop_on_convergence: bool,
    rng: &mut StdRng,
) -> AlgorithmSummary {
    let mut steps = 0;
    while steps < iterations && !(stop_on_convergence && engine.state().is_converged()) {
        engine.step_with(rng);
        steps += 1;
    }

    AlgorithmSummary {
        algorithm: engine.name(),
        best: engine.best(),
        history: engine.score_history(),
        steps,
        converged: engine.state().is_converged(),
    }
}

fn run_comparison(
    cli: &Cli,
    args: &SessionArgs,
    iterations: usize,
    algorithms: &[Algorithm],
    stop_on_convergence: bool,
) -> Result<()> {
    let mut config = load_config(cli.config.as_ref(), args)?;
    if stop_on_convergence {
        config.convergence_enabled = true;
    }
    config.validate()?;

    let objective: Arc<dyn Objective> = match config.expression() {
        Some(expr) => Arc::new(compile(expr, config.dimensions)?),
        None => Arc::new(Rastrigin::default()),
    };
    let solver = config.solver_config()?;
    let mut rng = make_rng(args.seed);

    info!(iterations, objective = %objective.describe(), "starting run");

    let mut summaries = Vec::with_capacity(algorithms.len());
    for algorithm in algorithms {
        let summary = match algorithm {
            Algorithm::Ga => {
                let engine = GeneticEngine::with_rng(
                    objective.clone(),
                    solver.clone(),
                    config.ga_params(),
                    &mut rng,
                )?;
                run_engine(engine, iterations, stop_on_convergence, &mut rng)
            }
            Algorithm::Pso => {
                let engine = SwarmEngine::with_rng(
                    objective.clone(),
                    solver.clone(),
                    config.pso_params(),
                    &mut rng,
                )?;
                run_engine(engine, iterations, stop_on_convergence, &mut rng)
            }
            Algorithm::De => {
                let engine = DifferentialEngine::with_rng(
                    objective.clone(),
                    solver.clone(),
                    DeParams::default(),
                    &mut rng,
                )?;
                run_engine(engine, iterations, stop_on_convergence, &mut rng)
            }
        };
        summaries.push(summary);
    }

    let history_of = |name: &str| {
        summaries
            .iter()
            .find(|s| s.algorithm == name)
            .map(|s| s.history.as_slice())
    };
    let analysis = match (history_of("GA"), history_of("PSO")) {
        (Some(ga), Some(pso)) => Some(analyze(ga, pso, config.mode())),
        _ => None,
    };

    match cli.format {
        OutputFormat::Json => {
            let output = RunOutput {
                objective: objective.describe(),
                mode: config.mode().to_string(),
                summaries,
                analysis,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Algorithm", "Best score", "Best solution", "Steps", "Converged"]);

            for s in &summaries {
                table.add_row(vec![
                    s.algorithm.to_string(),
                    format!("{:.6}", s.best.best_score),
                    format_solution(s.best.best_solution.as_deref()),
                    s.steps.to_string(),
                    s.converged.to_string(),
                ]);
            }

            println!("Objective: {} ({})", objective.describe(), config.mode());
            println!("{}", table);
            if let Some(analysis) = &analysis {
                println!("Winner: {}", analysis.winner);
            }
        }
    }

    Ok(())
}

fn list_benchmarks(format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&BENCHMARKS[..])?);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Key", "Name", "Bounds", "Minimum", "At", "Expression"]);

            for bench in BENCHMARKS.iter() {
                table.add_row(vec![
                    bench.key.to_string(),
                    bench.name.to_string(),
                    format!("[{}, {}]", bench.bounds[0], bench.bounds[1]),
                    bench.global_min.to_string(),
                    format_solution(Some(&bench.minimizer[..])),
                    bench.expression.to_string(),
                ]);
            }

            println!("{}", table);
        }
    }
    Ok(())
}

fn format_solution(solution: Option<&[f64]>) -> String {
    match solution {
        Some(values) => {
            let parts: Vec<String> = values.iter().map(|v| format!("{:.4}", v)).collect();
            format!("({})", parts.join(", "))
        }
        None => "-".to_string(),
    }
}

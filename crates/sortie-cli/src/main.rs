//! Sortie CLI entrypoint.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sortie_explore::settings::DetectorSettings;
use sortie_oracle::compare::{TraceComparator, Verdict};
use sortie_oracle::persist::TraceFile;

#[derive(Debug, Parser)]
#[command(name = "sortie")]
#[command(about = "model-based mission testing for robotic systems")]
struct Cli {
    /// Log level.
    #[arg(long, global = true, default_value = "info")]
    log: String,

    /// Machine-readable output to stdout (JSON).
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check candidate traces against a ground-truth population
    Compare {
        /// Trace file holding the ground-truth traces
        ground_truth: PathBuf,
        /// Trace file holding the traces to judge
        candidate: PathBuf,
        /// Width of the acceptance window in standard deviations
        #[arg(long, default_value_t = 1.0)]
        tolerance: f64,
    },

    /// Print the effective detector settings
    Limits {
        /// Settings file (JSON). Defaults apply without one.
        settings: Option<PathBuf>,
        /// Cap on missions executed in one run
        #[arg(long)]
        max_missions: Option<u64>,
        /// Cap on wall-clock seconds for one run
        #[arg(long)]
        max_time: Option<f64>,
        /// Cap on commands per generated mission
        #[arg(long)]
        max_actions: Option<usize>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_tracing(&cli.log) {
        eprintln!("warning: failed to init tracing: {err:#}");
    }

    match run_command(&cli) {
        Ok(code) => code,
        Err(err) => print_error_and_exit(&cli, err),
    }
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err))
}

fn run_command(cli: &Cli) -> anyhow::Result<ExitCode> {
    match &cli.command {
        Command::Compare {
            ground_truth,
            candidate,
            tolerance,
        } => {
            let verdicts = compare_files(ground_truth, candidate, *tolerance)?;
            if cli.json {
                let out: Vec<_> = verdicts
                    .iter()
                    .enumerate()
                    .map(|(trace, verdict)| {
                        serde_json::json!({
                            "trace": trace,
                            "equivalent": verdict.is_equivalent(),
                            "violating_variable": verdict.violating_variable(),
                            "detail": verdict.to_string(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                for (trace, verdict) in verdicts.iter().enumerate() {
                    println!("{}", render_verdict(trace, verdict));
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Limits {
            settings,
            max_missions,
            max_time,
            max_actions,
        } => {
            let settings =
                effective_settings(settings.as_deref(), *max_missions, *max_time, *max_actions)?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Judge every candidate trace. Both files must describe the same mission.
fn compare_files(
    ground_truth: &Path,
    candidate: &Path,
    tolerance: f64,
) -> anyhow::Result<Vec<Verdict>> {
    let truth = TraceFile::load(ground_truth).context("failed to load ground truth")?;
    let candidates = TraceFile::load(candidate).context("failed to load candidate")?;

    if truth.mission != candidates.mission {
        bail!(
            "{} and {} describe different missions",
            ground_truth.display(),
            candidate.display()
        );
    }
    if candidates.traces.is_empty() {
        bail!("{} holds no traces", candidate.display());
    }

    let comparator = TraceComparator::infer(&truth.traces)?;
    tracing::info!(
        ground_truth = truth.traces.len(),
        candidates = candidates.traces.len(),
        tolerance,
        "comparing traces"
    );

    candidates
        .traces
        .iter()
        .map(|trace| {
            comparator
                .compare(trace, &truth.traces, tolerance)
                .map_err(anyhow::Error::from)
        })
        .collect()
}

/// Settings from `path` (or the defaults) with command-line limits applied.
fn effective_settings(
    path: Option<&Path>,
    max_missions: Option<u64>,
    max_time: Option<f64>,
    max_actions: Option<usize>,
) -> anyhow::Result<DetectorSettings> {
    let mut settings = match path {
        Some(path) => DetectorSettings::load(path)?,
        None => DetectorSettings::default(),
    };
    if let Some(max) = max_missions {
        settings.limits.max_missions = Some(max);
    }
    if let Some(secs) = max_time {
        if !secs.is_finite() || secs < 0.0 {
            bail!("--max-time must be a non-negative number of seconds, got {secs}");
        }
        settings.limits.max_running_time_secs = Some(secs);
    }
    if let Some(max) = max_actions {
        settings.limits.max_actions_per_mission = max;
    }
    Ok(settings)
}

fn render_verdict(trace: usize, verdict: &Verdict) -> String {
    match verdict.violating_variable() {
        _ if verdict.is_equivalent() => format!("trace {trace}: equivalent"),
        Some(variable) => format!("trace {trace}: not equivalent [{variable}] {verdict}"),
        None => format!("trace {trace}: not equivalent {verdict}"),
    }
}

fn print_error_and_exit(cli: &Cli, err: anyhow::Error) -> ExitCode {
    let msg = format!("{err:#}");
    if cli.json {
        let out = serde_json::json!({
            "status": "error",
            "message": msg,
        });
        println!("{out}");
    } else {
        eprintln!("error: {msg}");
    }
    ExitCode::from(1)
}

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;

use taskflow::config::Config;
use taskflow::core::transitions::successors;
use taskflow::core::TaskStatus;
use taskflow::scenario::{Report, Scenario};
use taskflow::{Result, TaskService};

/// Taskflow - task lifecycle engine with runtime invariant checking
#[derive(Parser, Debug)]
#[command(name = "taskflow")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    TASKFLOW_DEBUG=1    Enable debug logging (alternative to --debug)\n    RUST_LOG            Override the log filter"
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// Config file (defaults to ~/.taskflow/taskflow.toml)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run a scenario file and print each step's outcome
    Replay {
        /// Path to the scenario TOML file
        scenario: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a scenario file, then report invariant violations and liveness warnings
    Audit {
        /// Path to the scenario TOML file
        scenario: PathBuf,
    },

    /// Print the legal status transition table
    Transitions,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    taskflow::log::init_with_debug(cli.debug);

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Command::Replay { scenario, json } => run_replay(&scenario, json, config),
        Command::Audit { scenario } => run_audit(&scenario, config),
        Command::Transitions => {
            run_transitions();
            Ok(())
        }
    }
}

fn replay(path: &Path, config: Config) -> Result<(TaskService, Report)> {
    info!(scenario = %path.display(), "replaying scenario");
    let scenario = Scenario::load(path)?;
    let service = TaskService::new(config);
    let report = scenario.run(&service)?;
    Ok((service, report))
}

fn run_replay(path: &Path, json: bool, config: Config) -> Result<()> {
    let (_, report) = replay(path, config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for outcome in &report.outcomes {
            let marker = match (outcome.as_expected(), outcome.ok) {
                (true, true) => "ok",
                (true, false) => "rejected (expected)",
                (false, true) => "UNEXPECTED SUCCESS",
                (false, false) => "UNEXPECTED ERROR",
            };
            println!(
                "{:>3}. {:<18} {:<20} {}",
                outcome.step, outcome.op, marker, outcome.message
            );
        }
        println!();
        println!(
            "{} task(s), next id {}, current user {}",
            report.snapshot.task_count(),
            report.snapshot.next_task_id,
            report
                .snapshot
                .current_user
                .as_ref()
                .map_or("<none>".to_string(), |u| u.to_string())
        );
        for task in report.snapshot.tasks.values() {
            println!(
                "  #{:<4} {:<12} {:<9} {:<10} {}",
                task.id,
                task.status.as_str(),
                task.priority.as_str(),
                task.assignee,
                task.title
            );
        }
    }

    if !report.passed() {
        eprintln!(
            "{} step(s) did not match their expectation",
            report.unexpected().count()
        );
        std::process::exit(1);
    }
    Ok(())
}

fn run_audit(path: &Path, config: Config) -> Result<()> {
    let (service, report) = replay(path, config)?;

    let violations = service.audit();
    let warnings = service.diagnostics();

    println!(
        "Replayed {} step(s), {} unexpected",
        report.outcomes.len(),
        report.unexpected().count()
    );

    if violations.is_empty() {
        println!("Invariants: all hold");
    } else {
        println!("Invariants: {} violation(s)", violations.len());
        for violation in &violations {
            println!("  {}", violation);
        }
    }

    if warnings.is_empty() {
        println!("Liveness: no warnings");
    } else {
        println!("Liveness: {} warning(s)", warnings.len());
        for warning in &warnings {
            println!("  {}", warning);
        }
    }

    if !violations.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_transitions() {
    for from in TaskStatus::ALL {
        let targets: Vec<&str> = successors(from).iter().map(|to| to.as_str()).collect();
        if targets.is_empty() {
            println!("{:<12} (terminal)", from.as_str());
        } else {
            println!("{:<12} -> {}", from.as_str(), targets.join(", "));
        }
    }
}

//! CLI entrypoint for the dmalloc scenario harness.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use dmalloc_core::{SystemAllocator, Tracker, TrackerConfig, ViolationPolicy};
use dmalloc_harness::{HarnessError, Scenario, ScenarioReport};

/// Exit status when a scenario stopped on a reported memory bug.
const EXIT_MEMORY_BUG: u8 = 2;

/// Scenario runner for dmalloc.
#[derive(Debug, Parser)]
#[command(name = "dmalloc-harness")]
#[command(about = "Run allocation scenarios against a dmalloc tracker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one scenario, then print statistics and the leak report.
    Run {
        scenario: Scenario,
        /// What to do on a memory bug (defaults to DMALLOC_ON_BUG, then abort).
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
        /// Emit a JSON report instead of text.
        #[arg(long)]
        json: bool,
    },
    /// List scenarios.
    List,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Abort,
    Panic,
    Report,
}

impl From<PolicyArg> for ViolationPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Abort => Self::Abort,
            PolicyArg::Panic => Self::Panic,
            PolicyArg::Report => Self::Report,
        }
    }
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let log_level = std::env::var("DMALLOC_LOG").unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::List => {
            let mut out = io::stdout().lock();
            for scenario in Scenario::ALL {
                writeln!(out, "{:<14} {}", scenario.name(), scenario.description())?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Run {
            scenario,
            policy,
            json,
        } => {
            let mut config = TrackerConfig::from_env();
            if let Some(policy) = policy {
                config = config.with_policy(policy.into());
            }
            let tracker = Tracker::with_config(SystemAllocator, config);
            let policy = tracker.config().policy;
            tracing::info!(scenario = scenario.name(), policy = policy.as_str(), "run");

            let (recovered, bug) = match scenario.run(&tracker) {
                Ok(recovered) => (recovered, None),
                Err(HarnessError::Bug(bug)) => (Vec::new(), Some(bug)),
                Err(err) => return Err(err.into()),
            };

            let report = ScenarioReport::collect(
                scenario.name(),
                policy,
                &tracker,
                bug.as_ref(),
                recovered,
            );
            let mut out = io::stdout().lock();
            if json {
                report.write_json(&mut out)?;
            } else {
                report.write_text(&mut out)?;
            }

            match bug {
                Some(bug) => {
                    eprintln!("{bug}");
                    Ok(ExitCode::from(EXIT_MEMORY_BUG))
                }
                None => Ok(ExitCode::SUCCESS),
            }
        }
    }
}

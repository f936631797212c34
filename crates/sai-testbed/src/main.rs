//! Conformance scenario runner.
//!
//! Runs the named scenarios (all of them by default) against a fresh
//! simulated switch each and reports pass/fail per scenario.

use anyhow::{bail, Context};
use clap::Parser;
use sai_harness::HarnessSettings;
use sai_testbed::{scenarios, SimConfig, Testbed, SCENARIOS};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// SAI forwarding conformance runner
#[derive(Parser, Debug)]
#[command(name = "sai-testbed")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scenarios to run (default: all)
    scenarios: Vec<String>,

    /// List scenarios and exit
    #[arg(long)]
    list: bool,

    /// Harness settings file (TOML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long)]
    log_level: Option<String>,

    /// Emit logs and the final report as JSON
    #[arg(long)]
    json: bool,

    /// Front-panel ports on the simulated switch
    #[arg(short = 'p', long)]
    ports: Option<u32>,

    /// Delay between acknowledging and applying a change, in milliseconds
    #[arg(long, default_value = "0")]
    apply_delay_ms: u64,
}

#[derive(Debug, Serialize)]
struct Outcome {
    scenario: &'static str,
    passed: bool,
    elapsed_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn load_settings(args: &Args) -> anyhow::Result<HarnessSettings> {
    let mut settings = match &args.config {
        Some(path) => HarnessSettings::load_or_default(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => HarnessSettings::for_simulator(),
    };
    if let Some(level) = &args.log_level {
        settings.logging.level = level.clone();
    }
    if args.json {
        settings.logging.json = true;
    }
    if let Some(ports) = args.ports {
        settings.target.ports = ports;
    }
    settings.validate()?;
    Ok(settings)
}

fn select(names: &[String]) -> anyhow::Result<Vec<&'static scenarios::Scenario>> {
    if names.is_empty() {
        return Ok(SCENARIOS.iter().collect());
    }
    let mut selected = Vec::with_capacity(names.len());
    for name in names {
        match scenarios::find(name) {
            Some(s) => selected.push(s),
            None => bail!("unknown scenario '{}' (see --list)", name),
        }
    }
    Ok(selected)
}

async fn run_all(args: &Args, settings: HarnessSettings) -> anyhow::Result<Vec<Outcome>> {
    let selected = select(&args.scenarios)?;
    let delay = Duration::from_millis(args.apply_delay_ms);
    let mut outcomes = Vec::with_capacity(selected.len());

    for scenario in selected {
        let config = SimConfig::from_settings(&settings).with_apply_delay(delay);
        let mut tb = Testbed::with_sim(config, settings.clone())
            .await
            .context("starting simulated switch")?;

        let started = Instant::now();
        let result = scenarios::run(&mut tb, scenario).await;
        let elapsed_ms = started.elapsed().as_millis();

        if let Err(e) = tb.finish().await {
            warn!("{}: session teardown left residue: {}", scenario.name, e);
        }

        let error = match result {
            Ok(()) => None,
            Err(failure) => {
                error!("{}", failure);
                Some(failure.error.to_string())
            }
        };
        outcomes.push(Outcome {
            scenario: scenario.name,
            passed: error.is_none(),
            elapsed_ms,
            error,
        });
    }
    Ok(outcomes)
}

fn report(outcomes: &[Outcome], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcomes)?);
        return Ok(());
    }
    for o in outcomes {
        let verdict = if o.passed { "PASS" } else { "FAIL" };
        println!("{:<20} {} ({} ms)", o.scenario, verdict, o.elapsed_ms);
        if let Some(e) = &o.error {
            println!("    {}", e);
        }
    }
    let failed = outcomes.iter().filter(|o| !o.passed).count();
    println!("{} passed, {} failed", outcomes.len() - failed, failed);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.list {
        for s in SCENARIOS {
            println!("{:<20} {}", s.name, s.about);
        }
        return ExitCode::SUCCESS;
    }

    let settings = match load_settings(&args) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("sai-testbed: {:#}", e);
            return ExitCode::from(2);
        }
    };
    sai_harness::logging::init(&settings.logging);
    info!(
        "Starting sai-testbed: {} ports, apply delay {}ms",
        settings.target.ports, args.apply_delay_ms
    );

    let outcomes = match run_all(&args, settings).await {
        Ok(o) => o,
        Err(e) => {
            error!("sai-testbed: {:#}", e);
            return ExitCode::from(2);
        }
    };
    if let Err(e) = report(&outcomes, args.json) {
        error!("sai-testbed: cannot write report: {}", e);
        return ExitCode::from(2);
    }

    if outcomes.iter().all(|o| o.passed) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

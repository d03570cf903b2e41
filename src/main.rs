//! # tickloop
//!
//! Command-line front end for the timer event loop.
//!
//! - `tickloop run <PLAN>` loads a timer plan, runs it on the system clock
//!   and prints how often each timer fired
//! - `tickloop config` prints the effective loop configuration
//!
//! Dispatch failures and resource exhaustion end the process with a
//! non-zero exit status.

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![deny(clippy::expect_used)]

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tickloop::cli::{Cli, Commands};
use tickloop::{Plan, ScriptHost, run_plan};
use tickloop_core::LoopConfig;
use tickloop_scheduler::EventLoop;

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            plan,
            config,
            stats,
        } => run(&plan, config.as_deref(), stats),
        Commands::Config { config } => print_config(config.as_deref()),
    }
}

/// Initialize tracing with `RUST_LOG`, defaulting to `info`.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<LoopConfig> {
    path.map_or_else(
        || Ok(LoopConfig::default()),
        |path| {
            LoopConfig::load(path)
                .with_context(|| format!("Failed to load loop configuration from {}", path.display()))
        },
    )
}

fn run(plan_path: &Path, config_path: Option<&Path>, stats: bool) -> Result<()> {
    let mut config = load_config(config_path)?;
    if stats {
        config.gather_stats = true;
    }

    let plan = Plan::load(plan_path)
        .with_context(|| format!("Failed to load timer plan from {}", plan_path.display()))?;

    let host = ScriptHost::new(&plan);
    let mut event_loop =
        EventLoop::new(config, host).context("Failed to initialize the event loop")?;

    let outcome = run_plan(&plan, &mut event_loop);

    for (name, count) in event_loop.host().fires() {
        println!("{name}: {count}");
    }

    if stats {
        let report = serde_json::json!({
            "loop": event_loop.stats(),
            "phases": event_loop.phases().phases(),
        });
        let rendered =
            serde_json::to_string_pretty(&report).context("Failed to render statistics")?;
        println!("{rendered}");
    }

    let summary = outcome.context("Timer plan did not complete")?;
    info!(
        iterations = summary.iterations,
        fired = summary.fired,
        waited_ms = summary.waited.as_secs_f64() * 1000.0,
        "Timer plan completed"
    );
    Ok(())
}

fn print_config(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let rendered = config
        .to_toml_string()
        .context("Failed to render loop configuration")?;
    print!("{rendered}");
    Ok(())
}

//! Range indexer driver
//!
//! Replays a scripted sequence of alloc/dealloc calls and prints the allocator
//! state after each one.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use range_indexer::{AllocatorConfig, Script, ScriptRun};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "range-indexer")]
#[command(about = "Replay alloc/dealloc scripts against a best-fit range allocator")]
struct Args {
    /// TOML script to replay (defaults to the built-in walkthrough)
    #[arg(short = 's', long)]
    script: Option<PathBuf>,

    /// Override the first index of the domain
    #[arg(long)]
    start: Option<u64>,

    /// Override the number of indices in the domain
    #[arg(long)]
    length: Option<u64>,

    /// Check allocator invariants after every step
    #[arg(long)]
    verify: bool,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value = "text")]
    format: Format,

    /// Only print the final state
    #[arg(short = 'q', long)]
    quiet: bool,
}

fn print_text(run: &ScriptRun, quiet: bool) {
    if quiet {
        print!("{}", run.final_snapshot());
        return;
    }
    println!("initial state");
    print!("{}", run.initial);
    for (number, report) in run.steps.iter().enumerate() {
        println!();
        println!("step {}: {} -> {}", number + 1, report.step, report.outcome);
        print!("{}", report.snapshot);
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut script = match &args.script {
        Some(path) => {
            info!("Loading script: {:?}", path);
            Script::load(path).with_context(|| format!("failed to load {}", path.display()))?
        }
        None => {
            info!("No script given, running built-in walkthrough");
            Script::demo()
        }
    };

    let defaults = script.allocator;
    script.allocator = AllocatorConfig {
        start: args.start.unwrap_or(defaults.start),
        length: args.length.unwrap_or(defaults.length),
    };
    script.verify |= args.verify;

    info!(
        "Domain start={} length={}, {} steps",
        script.allocator.start,
        script.allocator.length,
        script.steps.len()
    );

    let run = match script.run() {
        Ok(run) => run,
        Err(err) if !err.is_recoverable() => bail!("allocator state is corrupt: {err}"),
        Err(err) => return Err(err).context("script run failed"),
    };

    match args.format {
        Format::Text => print_text(&run, args.quiet),
        Format::Json if args.quiet => println!("{}", run.final_snapshot().to_json()?),
        Format::Json => println!("{}", serde_json::to_string_pretty(&run)?),
    }

    Ok(())
}

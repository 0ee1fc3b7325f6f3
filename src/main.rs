//! RBMK Core - Main Entry Point
//!
//! Runs the simulation with an interactive command console on stdin.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use rbmk_core::{feed, Interpreter, Reactor, Scheduler, SimConfig};

#[derive(Debug, Parser)]
#[command(name = "rbmk-core", about = "RBMK reactor core simulator")]
struct Args {
    /// JSON configuration file (defaults to config/reactor.json if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// RNG seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Simulation tick period [ms]
    #[arg(long)]
    tick_ms: Option<u64>,

    /// File or FIFO carrying external alarm commands
    #[arg(long)]
    alarm_feed: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SimConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => SimConfig::discover().context("loading configuration")?,
    };
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(tick_ms) = args.tick_ms {
        config.tick_ms = tick_ms;
    }

    let reactor = Arc::new(Reactor::new(config).context("building reactor")?);

    let alarm_feed = match &args.alarm_feed {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening alarm feed {}", path.display()))?;
            let (tx, alarm_feed) = feed::channel();
            feed::spawn_reader(BufReader::new(file), tx);
            info!("Alarm feed attached: {}", path.display());
            Some(alarm_feed)
        }
        None => None,
    };

    let scheduler = Scheduler::spawn(Arc::clone(&reactor), alarm_feed);
    let interpreter = Interpreter::new(reactor);

    println!("RBMK core simulator ready. Type 'help' for commands, 'quit' to exit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }
        match interpreter.execute(line) {
            Ok(out) => out.iter().for_each(|l| println!("{l}")),
            Err(e) => println!("Error: {e}"),
        }
    }

    scheduler.shutdown();
    Ok(())
}

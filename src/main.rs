// Copyright 2025 Servus Altissimi (Pseudonym)

// Permission is hereby granted, free of charge, to any person obtaining a copy of this software and associated documentation files (the "Software"), to deal in the Software without restriction, including without limitation the rights to use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is furnished to do so, subject to the following conditions:
// The above copyright notice and this permission notice shall be included in all copies or substantial portions of the Software.
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use netsim::metrics::logger::CsvLogger;
use netsim::prelude::*;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Discrete-event network simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and run a scenario
    Run {
        config: PathBuf,
        /// CSV of every event taken off the global queue
        #[arg(long)]
        trace: Option<PathBuf>,
        /// CSV of per-node packet counters
        #[arg(long)]
        stats: Option<PathBuf>,
        /// JSON run summary
        #[arg(long)]
        summary: Option<PathBuf>,
        #[arg(short, long)]
        progress: bool,
    },

    /// Parse and build a scenario without running it
    Check { config: PathBuf },

    /// Registered control and application algorithms
    List,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn execute(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            config,
            trace,
            stats,
            summary,
            progress,
        } => run_scenario(
            &config,
            trace.as_deref(),
            stats.as_deref(),
            summary.as_deref(),
            progress,
        ),

        Commands::Check { config } => {
            let scenario = load(&config)?;
            let sim = Simulator::from_config(&scenario, &AlgorithmRegistry::new())?;
            info!(
                "{}: {} nodes, {} links, {} scheduled actions, stop at {} ms",
                config.display(),
                sim.nodes().count(),
                sim.links().len(),
                sim.pending_events(),
                sim.stop_time()
            );
            Ok(())
        }

        Commands::List => {
            let registry = AlgorithmRegistry::new();
            println!("\nControl algorithms");
            for name in registry.control_names() {
                println!("  - {}", name);
            }
            println!("\nApplication algorithms");
            for name in registry.application_names() {
                println!("  - {}", name);
            }
            println!("\nUsage: netsim run <scenario>\n");
            Ok(())
        }
    }
}

fn load(path: &Path) -> Result<ScenarioConfig> {
    ScenarioConfig::from_path(path).with_context(|| format!("loading scenario {}", path.display()))
}

fn run_scenario(
    path: &Path,
    trace_path: Option<&Path>,
    stats_path: Option<&Path>,
    summary_path: Option<&Path>,
    progress: bool,
) -> Result<()> {
    let started = Instant::now();
    let scenario = load(path)?;
    let mut sim = Simulator::from_config(&scenario, &AlgorithmRegistry::new())?;
    if trace_path.is_some() {
        sim.enable_trace();
    }

    let termination = if progress {
        let pb = ProgressBar::new(sim.stop_time());
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.orange/yellow} {pos}/{len}ms {msg}")?
                .progress_chars("█▓░"),
        );
        let termination = sim.run_with_progress(|now| pb.set_position(now))?;
        pb.finish_with_message(format!("{:?}", termination));
        termination
    } else {
        sim.run()?
    };

    let summary = RunSummary::collect(&sim, termination);
    info!(
        "Totals: sent {} received {} dropped {} forwarded {} lost on links {}",
        summary.totals.sent,
        summary.totals.received,
        summary.totals.dropped,
        summary.totals.forwarded,
        summary.lost_on_links
    );

    if let Some(path) = trace_path {
        CsvLogger::new(path)?.log_batch(sim.trace())?;
        info!("Trace saved to: {}", path.display());
    }
    if let Some(path) = stats_path {
        CsvLogger::new(path)?.log_batch(&summary.nodes)?;
        info!("Node counters saved to: {}", path.display());
    }
    if let Some(path) = summary_path {
        std::fs::write(path, serde_json::to_string_pretty(&summary)?)?;
        info!("Summary saved to: {}", path.display());
    }

    info!("Total runtime: {:.2}s", started.elapsed().as_secs_f64());
    Ok(())
}

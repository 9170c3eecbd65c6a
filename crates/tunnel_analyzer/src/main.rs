// Rust guideline compliant 2026-07-28

//! Tunnel-log analyzer entry point.
//!
//! Wires `parser` -> `accumulator` -> `reducer` -> `assembler` over a single
//! tunnel log and prints the resulting stats block to stderr.
//!
//! The command-line surface here is intentionally minimal: flag parsing is
//! an external collaborator to the analysis engine, not part of it.
//!
//! # Usage
//!
//! ```text
//! tunnel_analyzer --tunnel-log tunnel.log [--ms-per-bin 500] \
//!     [--throughput-graph tput.png] [--delay-graph delay.png]
//!
//! RUST_LOG=debug tunnel_analyzer --tunnel-log tunnel.log
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use domain::{AnalysisResult, AnalyzerConfig};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = parse_args(std::env::args().skip(1))?;
    let analysis = run(&config)?;

    eprint!("{}", analysis.stats);
    Ok(())
}

/// Run the full pipeline for `config`, returning the assembled result.
fn run(config: &AnalyzerConfig) -> anyhow::Result<AnalysisResult> {
    tracing::info!(tunnel_log = %config.tunnel_log.display(), ms_per_bin = config.ms_per_bin, "run.start");

    let events = parser::parse_tunnel_log(&config.tunnel_log)
        .with_context(|| format!("failed to open tunnel log {}", config.tunnel_log.display()))?;

    let state = accumulator::Accumulator::accumulate(events, config.ms_per_bin)
        .context("failed to accumulate tunnel log events")?;
    tracing::debug!(flows = state.flows.len(), "run.accumulated");

    let metrics = reducer::reduce(&state, config.ms_per_bin);
    let result = assembler::assemble(&metrics, config);
    tracing::info!("run.complete");
    Ok(result)
}

/// Minimal hand-rolled flag parsing -- `--tunnel-log` is required;
/// `--throughput-graph`, `--delay-graph`, `--ms-per-bin` are optional.
fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<AnalyzerConfig> {
    let mut tunnel_log: Option<PathBuf> = None;
    let mut throughput_graph: Option<PathBuf> = None;
    let mut delay_graph: Option<PathBuf> = None;
    let mut ms_per_bin: Option<u32> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--tunnel-log" => {
                tunnel_log = Some(PathBuf::from(args.next().context("--tunnel-log requires a value")?));
            }
            "--throughput-graph" => {
                throughput_graph = Some(PathBuf::from(
                    args.next().context("--throughput-graph requires a value")?,
                ));
            }
            "--delay-graph" => {
                delay_graph = Some(PathBuf::from(args.next().context("--delay-graph requires a value")?));
            }
            "--ms-per-bin" => {
                let value = args.next().context("--ms-per-bin requires a value")?;
                ms_per_bin = Some(value.parse().context("--ms-per-bin must be a positive integer")?);
            }
            other => anyhow::bail!("unrecognized argument: {other}"),
        }
    }

    let tunnel_log = tunnel_log.context("--tunnel-log is required")?;
    let mut builder = AnalyzerConfig::builder(tunnel_log);
    if let Some(path) = throughput_graph {
        builder = builder.throughput_graph(path);
    }
    if let Some(path) = delay_graph {
        builder = builder.delay_graph(path);
    }
    if let Some(ms) = ms_per_bin {
        builder = builder.ms_per_bin(ms);
    }
    builder.build().context("failed to build analyzer configuration")
}

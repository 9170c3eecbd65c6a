// Rust guideline compliant 2026-07-28

//! Result Assembler component -- packages per-flow and aggregate metrics
//! into the final [`AnalysisResult`] plus its human-readable summary string.
//!
//! Entry point: [`assemble`].

use std::fmt::Write as _;

use domain::{AnalysisResult, AnalyzerConfig, FlowSummary, ReducedMetrics};
use indexmap::IndexMap;

/// Build the final [`AnalysisResult`] from reduced metrics.
///
/// `config` is only consulted for `ms_per_bin` (carried into the summary's
/// tracing span); `throughput_graph`/`delay_graph` are forwarded by the
/// caller to the plotting collaborator and never read here.
#[must_use]
pub fn assemble(metrics: &ReducedMetrics, config: &AnalyzerConfig) -> AnalysisResult {
    tracing::debug!(ms_per_bin = config.ms_per_bin, flows = metrics.per_flow.len(), "assembler.assemble");

    let stats = statistics_string(metrics);

    let mut flow_data: IndexMap<String, FlowSummary> = IndexMap::new();
    flow_data.insert(
        "all".to_owned(),
        FlowSummary {
            tput: Some(metrics.total_avg_egress),
            delay: metrics.total_percentile_delay,
            loss: metrics.total_loss_rate,
        },
    );
    for (&flow_id, flow) in &metrics.per_flow {
        if flow_id != 0 {
            flow_data.insert(
                flow_id.to_string(),
                FlowSummary {
                    tput: Some(flow.avg_egress),
                    delay: flow.percentile_delay,
                    loss: flow.loss_rate,
                },
            );
        }
    }

    AnalysisResult {
        throughput: Some(metrics.total_avg_egress),
        delay: metrics.total_percentile_delay,
        loss: metrics.total_loss_rate,
        duration_ms: metrics.total_duration_ms,
        stats,
        flow_data,
    }
}

/// Sectioned, line-oriented summary: see the summary-string format.
///
/// Unlike `flow_data` (which omits the default flow, id `0`, because its
/// metrics are already folded into `"all"`), this text includes a `-- Flow
/// <id>:` block for every flow the accumulator saw, including `0`.
fn statistics_string(metrics: &ReducedMetrics) -> String {
    let mut out = String::new();
    let flow_count = metrics.per_flow.len();
    let noun = if flow_count == 1 { "flow" } else { "flows" };
    writeln!(out, "-- Total of {flow_count} {noun}:").expect("writing to a String never fails");

    if let Some(avg_capacity) = metrics.avg_capacity {
        writeln!(out, "Average capacity: {avg_capacity:.2} Mbit/s").unwrap();
    }

    let mut throughput_line = format!("Average throughput: {:.2} Mbit/s", metrics.total_avg_egress);
    if let Some(avg_capacity) = metrics.avg_capacity {
        let utilization = 100.0 * metrics.total_avg_egress / avg_capacity;
        write!(throughput_line, " ({utilization:.1}% utilization)").unwrap();
    }
    writeln!(out, "{throughput_line}").unwrap();

    if let Some(total_percentile_delay) = metrics.total_percentile_delay {
        writeln!(out, "95th percentile per-packet one-way delay: {total_percentile_delay:.3} ms").unwrap();
    }

    if let Some(total_loss_rate) = metrics.total_loss_rate {
        writeln!(out, "Loss rate: {:.2}%", total_loss_rate * 100.0).unwrap();
    }

    for (&flow_id, flow) in &metrics.per_flow {
        writeln!(out, "-- Flow {flow_id}:").unwrap();
        writeln!(out, "Average throughput: {:.2} Mbit/s", flow.avg_egress).unwrap();
        if let Some(percentile_delay) = flow.percentile_delay {
            writeln!(out, "95th percentile per-packet one-way delay: {percentile_delay:.3} ms").unwrap();
        }
        if let Some(loss_rate) = flow.loss_rate {
            writeln!(out, "Loss rate: {:.2}%", loss_rate * 100.0).unwrap();
        }
    }

    out
}

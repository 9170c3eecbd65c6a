// Rust guideline compliant 2026-07-28

//! Shared domain types for the tunnel-log analyzer pipeline.
//!
//! Defines the `Event` record the parser emits, the per-flow and global
//! accumulator state, the `AnalysisResult` the assembler produces, the
//! `AnalyzerConfig` builder, and the unified `AnalyzerError` type. All
//! pipeline crates depend on this crate; no other crate is imported here.

use std::path::PathBuf;

use indexmap::IndexMap;

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A single parsed line from the tunnel log.
///
/// Ephemeral: lives only during parsing, never stored by the accumulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    /// Timestamp in milliseconds, as written in the log.
    pub timestamp_ms: f64,
    /// Which of the three event classes this line encodes.
    pub kind: EventKind,
    /// Payload size in bits (`byte_count * 8`).
    pub bits: u64,
    /// Flow identifier. Absent on capacity events; defaults to `0` when
    /// omitted on arrivals/departures.
    pub flow_id: Option<u32>,
    /// One-way delay in milliseconds. Present iff `kind == Departure`.
    pub delay_ms: Option<f64>,
}

/// The three event classes a tunnel-log line can encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// `#` — a link-layer transmission opportunity, independent of flows.
    Capacity,
    /// `+` — a packet entering the tunnel on the sender side.
    Arrival,
    /// `-` — a packet exiting the tunnel on the receiver side.
    Departure,
}

impl Event {
    /// Resolve this event's flow id, defaulting unlabeled arrivals/departures to `0`.
    #[must_use]
    pub fn resolved_flow_id(&self) -> u32 {
        self.flow_id.unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Bin identifiers
// ---------------------------------------------------------------------------

/// A fixed-width time-bin index, anchored at `0` on the first observed event.
pub type BinId = i64;

// ---------------------------------------------------------------------------
// Accumulator state
// ---------------------------------------------------------------------------

/// Global, flow-independent link-capacity observations.
#[derive(Debug, Clone, Default)]
pub struct CapacityStats {
    /// Total bits observed per bin.
    pub capacity_by_bin: std::collections::HashMap<BinId, u64>,
    /// Timestamp of the first capacity event, unset until observed.
    pub first_capacity_ms: Option<f64>,
    /// Timestamp of the most recent (strictly greatest) capacity event.
    pub last_capacity_ms: Option<f64>,
}

/// Per-flow arrival/departure/delay observations.
#[derive(Debug, Clone, Default)]
pub struct FlowStats {
    /// Total arrival bits observed per bin.
    pub arrivals_by_bin: std::collections::HashMap<BinId, u64>,
    /// Total departure bits observed per bin.
    pub departures_by_bin: std::collections::HashMap<BinId, u64>,
    /// One-way delay, ms, in arrival order.
    pub delays: Vec<f64>,
    /// `(timestamp - first_ts) / 1000`, seconds, parallel to `delays`.
    pub delay_times_s: Vec<f64>,
    /// Timestamp of this flow's first arrival.
    pub first_arrival_ms: Option<f64>,
    /// Timestamp of this flow's most recent (strictly greatest) arrival.
    pub last_arrival_ms: Option<f64>,
    /// Timestamp of this flow's first departure.
    pub first_departure_ms: Option<f64>,
    /// Timestamp of this flow's most recent (strictly greatest) departure.
    pub last_departure_ms: Option<f64>,
}

impl FlowStats {
    /// Total bits summed across `arrivals_by_bin`.
    #[must_use]
    pub fn total_arrival_bits(&self) -> u64 {
        self.arrivals_by_bin.values().sum()
    }

    /// Total bits summed across `departures_by_bin`.
    #[must_use]
    pub fn total_departure_bits(&self) -> u64 {
        self.departures_by_bin.values().sum()
    }

    /// Whether this flow has at least one recorded arrival.
    #[must_use]
    pub fn has_arrivals(&self) -> bool {
        !self.arrivals_by_bin.is_empty()
    }

    /// Whether this flow has at least one recorded departure.
    #[must_use]
    pub fn has_departures(&self) -> bool {
        !self.departures_by_bin.is_empty()
    }
}

/// Aggregate totals across every flow, independent of per-flow breakdowns.
#[derive(Debug, Clone, Default)]
pub struct GlobalStats {
    /// Sum of bits over every arrival event, any flow.
    pub total_arrivals_bits: u64,
    /// Sum of bits over every departure event, any flow.
    pub total_departures_bits: u64,
    /// Timestamp of the first arrival seen, any flow.
    pub total_first_arrival_ms: Option<f64>,
    /// Timestamp of the most recent arrival seen, any flow.
    pub total_last_arrival_ms: Option<f64>,
    /// Timestamp of the first departure seen, any flow.
    pub total_first_departure_ms: Option<f64>,
    /// Timestamp of the most recent departure seen, any flow.
    pub total_last_departure_ms: Option<f64>,
}

/// Full accumulator output: everything the reducer needs, nothing it mutates.
#[derive(Debug, Clone, Default)]
pub struct AccumulatorState {
    /// Link capacity observations, independent of flows.
    pub capacity: CapacityStats,
    /// Per-flow observations, keyed by flow id, in first-observed order.
    pub flows: IndexMap<u32, FlowStats>,
    /// Cross-flow totals.
    pub global: GlobalStats,
    /// The anchor timestamp fixed on the first event of any kind.
    pub first_ts: Option<f64>,
}

// ---------------------------------------------------------------------------
// Reduced / assembled output
// ---------------------------------------------------------------------------

/// A dense (bin, value) time series with a parallel seconds-axis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    /// Value per sample, Mbit/s.
    pub values: Vec<f64>,
    /// Time axis, seconds, parallel to `values`.
    pub times_s: Vec<f64>,
}

/// Derived per-flow metrics produced by the reducer.
#[derive(Debug, Clone, Default)]
pub struct FlowMetrics {
    /// Dense ingress (arrival) throughput series, Mbit/s over time.
    pub ingress_tput: TimeSeries,
    /// Dense egress (departure) throughput series, with the leading
    /// zero-sample and one-bin time shift specified for plot alignment.
    pub egress_tput: TimeSeries,
    /// Average ingress throughput, Mbit/s.
    pub avg_ingress: f64,
    /// Average egress throughput, Mbit/s.
    pub avg_egress: f64,
    /// 95th-percentile one-way delay, ms, nearest-rank. `None` if no delays.
    pub percentile_delay: Option<f64>,
    /// Arithmetic mean one-way delay, ms. `None` if no delays.
    pub avg_delay: Option<f64>,
    /// `1 - departures_bits / arrivals_bits`. `None` if no arrivals.
    pub loss_rate: Option<f64>,
}

/// Derived aggregate metrics produced by the reducer.
#[derive(Debug, Clone, Default)]
pub struct ReducedMetrics {
    /// Average link capacity, Mbit/s. `None` if no capacity events.
    pub avg_capacity: Option<f64>,
    /// Dense link-capacity series.
    pub link_capacity: TimeSeries,
    /// Per-flow metrics, in first-observed flow order.
    pub per_flow: IndexMap<u32, FlowMetrics>,
    /// `1 - total_departures_bits / total_arrivals_bits`. `None` if no arrivals.
    pub total_loss_rate: Option<f64>,
    /// Aggregate average egress throughput, Mbit/s.
    pub total_avg_egress: f64,
    /// Aggregate average ingress throughput, Mbit/s.
    pub total_avg_ingress: f64,
    /// Aggregate 95th-percentile one-way delay, ms, nearest-rank.
    pub total_percentile_delay: Option<f64>,
    /// Aggregate arithmetic mean one-way delay, ms.
    pub total_avg_delay: Option<f64>,
    /// `total_last_departure_ms - total_first_departure_ms`, or `0`.
    pub total_duration_ms: f64,
}

/// Per-flow summary surfaced in the final result record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowSummary {
    /// Average throughput, Mbit/s (egress for a named flow, aggregate for "all").
    pub tput: Option<f64>,
    /// 95th-percentile one-way delay, ms.
    pub delay: Option<f64>,
    /// Loss rate in `[0, 1]`.
    pub loss: Option<f64>,
}

/// The analyzer's final output: scalars, the human-readable summary, and
/// the per-flow breakdown.
#[derive(Debug, Clone, Default)]
pub struct AnalysisResult {
    /// Aggregate average egress throughput, Mbit/s.
    pub throughput: Option<f64>,
    /// Aggregate 95th-percentile one-way delay, ms.
    pub delay: Option<f64>,
    /// Aggregate loss rate in `[0, 1]`.
    pub loss: Option<f64>,
    /// Aggregate duration, ms.
    pub duration_ms: f64,
    /// Human-readable, line-oriented summary (see the summary-string format).
    pub stats: String,
    /// `"all"` plus one entry per non-default flow (flow id `!= 0`).
    pub flow_data: IndexMap<String, FlowSummary>,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Runtime configuration for a single analyzer run.
///
/// Construct via [`AnalyzerConfig::builder`].
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Path to the tunnel log to parse.
    pub tunnel_log: PathBuf,
    /// Optional throughput-plot output path, forwarded for the (out-of-scope)
    /// plotting collaborator; the core pipeline never opens this file.
    pub throughput_graph: Option<PathBuf>,
    /// Optional delay-plot output path, forwarded for the same collaborator.
    pub delay_graph: Option<PathBuf>,
    /// Bin width in milliseconds. Must be `>= 1`.
    pub ms_per_bin: u32,
}

/// Builder for [`AnalyzerConfig`].
///
/// Obtain via [`AnalyzerConfig::builder`]; finalize with [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct AnalyzerConfigBuilder {
    tunnel_log: PathBuf,
    throughput_graph: Option<PathBuf>,
    delay_graph: Option<PathBuf>,
    ms_per_bin: u32,
}

impl AnalyzerConfig {
    /// Create a builder. `tunnel_log` is the only required parameter.
    ///
    /// Default values: `throughput_graph = None`, `delay_graph = None`,
    /// `ms_per_bin = 500`.
    #[must_use]
    pub fn builder(tunnel_log: impl Into<PathBuf>) -> AnalyzerConfigBuilder {
        AnalyzerConfigBuilder {
            tunnel_log: tunnel_log.into(),
            throughput_graph: None,
            delay_graph: None,
            ms_per_bin: 500,
        }
    }
}

impl AnalyzerConfigBuilder {
    /// Request a throughput plot at `path` (forwarded only; not opened here).
    #[must_use]
    pub fn throughput_graph(mut self, path: impl Into<PathBuf>) -> Self {
        self.throughput_graph = Some(path.into());
        self
    }

    /// Request a delay plot at `path` (forwarded only; not opened here).
    #[must_use]
    pub fn delay_graph(mut self, path: impl Into<PathBuf>) -> Self {
        self.delay_graph = Some(path.into());
        self
    }

    /// Override the bin width, milliseconds.
    #[must_use]
    pub fn ms_per_bin(mut self, ms_per_bin: u32) -> Self {
        self.ms_per_bin = ms_per_bin;
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::InvalidConfig`] when `ms_per_bin == 0`.
    pub fn build(self) -> Result<AnalyzerConfig, AnalyzerError> {
        if self.ms_per_bin == 0 {
            return Err(AnalyzerError::InvalidConfig {
                reason: "ms_per_bin must be >= 1".to_owned(),
            });
        }
        Ok(AnalyzerConfig {
            tunnel_log: self.tunnel_log,
            throughput_graph: self.throughput_graph,
            delay_graph: self.delay_graph,
            ms_per_bin: self.ms_per_bin,
        })
    }
}

// ---------------------------------------------------------------------------
// AnalyzerError
// ---------------------------------------------------------------------------

/// Errors the analyzer pipeline can return.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    /// The supplied configuration is invalid.
    #[error("invalid analyzer configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
    /// A log line has the wrong arity for its kind, or a non-numeric token
    /// where a number was expected.
    #[error("malformed tunnel log line {line}: {reason}")]
    MalformedLine {
        /// 1-based line number in the source log.
        line: usize,
        /// Human-readable description of the problem.
        reason: String,
    },
    /// An event's timestamp precedes the anchor `first_ts`, yielding a
    /// negative bin id.
    #[error("negative bin at event #{event_index}: timestamp {timestamp_ms} ms precedes first_ts")]
    NegativeBin {
        /// 0-based position of the offending event in the parsed stream.
        event_index: usize,
        /// The offending event's timestamp, ms.
        timestamp_ms: f64,
    },
    /// A plot producer was invoked with no data of the relevant class. Non-fatal
    /// for the (out-of-scope) plotting collaborator; the core pipeline never
    /// constructs this variant.
    #[error("no data available to plot")]
    EmptyGraph,
    /// The log file could not be opened or read.
    #[error("I/O error reading tunnel log: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::{AnalyzerConfig, AnalyzerError, Event, EventKind};

    #[test]
    fn event_resolves_default_flow_id() {
        let ev = Event {
            timestamp_ms: 1.0,
            kind: EventKind::Arrival,
            bits: 8,
            flow_id: None,
            delay_ms: None,
        };
        assert_eq!(ev.resolved_flow_id(), 0);
    }

    #[test]
    fn event_resolves_explicit_flow_id() {
        let ev = Event {
            timestamp_ms: 1.0,
            kind: EventKind::Arrival,
            bits: 8,
            flow_id: Some(7),
            delay_ms: None,
        };
        assert_eq!(ev.resolved_flow_id(), 7);
    }

    #[test]
    fn config_builder_defaults() {
        let cfg = AnalyzerConfig::builder("log.txt").build().unwrap();
        assert_eq!(cfg.ms_per_bin, 500);
        assert!(cfg.throughput_graph.is_none());
        assert!(cfg.delay_graph.is_none());
    }

    #[test]
    fn config_builder_rejects_zero_bin_width() {
        let err = AnalyzerConfig::builder("log.txt")
            .ms_per_bin(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::InvalidConfig { .. }));
    }
}

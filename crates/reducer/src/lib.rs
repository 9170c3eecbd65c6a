// Rust guideline compliant 2026-07-28

//! Statistical Reducer component -- converts accumulator state into
//! throughput rates, per-flow averages, 95th-percentile delays, loss
//! rates, and their aggregate equivalents.
//!
//! Entry point: [`reduce`]. Pure: never fails, never mutates its input
//! (spec.md §7: "the reducer never throws on empty inputs").

use std::collections::HashMap;

use domain::{AccumulatorState, BinId, CapacityStats, FlowMetrics, FlowStats, ReducedMetrics, TimeSeries};
use indexmap::IndexMap;

/// Reduce a fully populated [`AccumulatorState`] into [`ReducedMetrics`].
#[must_use]
pub fn reduce(state: &AccumulatorState, ms_per_bin: u32) -> ReducedMetrics {
    let bin_width_ms = f64::from(ms_per_bin);

    let avg_capacity = avg_capacity(&state.capacity);
    let link_capacity = dense_series(&state.capacity.capacity_by_bin, bin_width_ms);

    let per_flow: IndexMap<u32, FlowMetrics> = state
        .flows
        .iter()
        .map(|(&flow_id, flow)| (flow_id, flow_metrics(flow, bin_width_ms)))
        .collect();

    let total_loss_rate = loss_rate(state.global.total_arrivals_bits, state.global.total_departures_bits);

    let (total_avg_egress, total_duration_ms) = avg_rate_and_span(
        state.global.total_first_departure_ms,
        state.global.total_last_departure_ms,
        state.global.total_departures_bits,
    );
    let (total_avg_ingress, _) = avg_rate_and_span(
        state.global.total_first_arrival_ms,
        state.global.total_last_arrival_ms,
        state.global.total_arrivals_bits,
    );

    // Concatenated in first-observed flow order, matching `flows`' insertion order.
    let all_delays: Vec<f64> = state.flows.values().flat_map(|flow| flow.delays.iter().copied()).collect();
    let (total_percentile_delay, total_avg_delay) = delay_stats(&all_delays);

    tracing::debug!(flows = per_flow.len(), "reducer.reduce.complete");

    ReducedMetrics {
        avg_capacity,
        link_capacity,
        per_flow,
        total_loss_rate,
        total_avg_egress,
        total_avg_ingress,
        total_percentile_delay,
        total_avg_delay,
        total_duration_ms,
    }
}

fn flow_metrics(flow: &FlowStats, bin_width_ms: f64) -> FlowMetrics {
    let ingress_tput = dense_series(&flow.arrivals_by_bin, bin_width_ms);
    let egress_tput = egress_series(flow, bin_width_ms);

    let avg_ingress = if flow.has_arrivals() {
        avg_rate_and_span(flow.first_arrival_ms, flow.last_arrival_ms, flow.total_arrival_bits()).0
    } else {
        0.0
    };
    let avg_egress = if flow.has_departures() {
        avg_rate_and_span(flow.first_departure_ms, flow.last_departure_ms, flow.total_departure_bits()).0
    } else {
        0.0
    };

    let (percentile_delay, avg_delay) = delay_stats(&flow.delays);

    let loss_rate = if flow.has_arrivals() && flow.has_departures() {
        loss_rate(flow.total_arrival_bits(), flow.total_departure_bits())
    } else {
        None
    };

    FlowMetrics {
        ingress_tput,
        egress_tput,
        avg_ingress,
        avg_egress,
        percentile_delay,
        avg_delay,
        loss_rate,
    }
}

/// `1 - departures / arrivals`, defined only when `arrivals > 0`.
fn loss_rate(arrivals_bits: u64, departures_bits: u64) -> Option<f64> {
    (arrivals_bits > 0).then(|| 1.0 - departures_bits as f64 / arrivals_bits as f64)
}

/// Average rate over `[first, last]` and the span itself, `(0, 0)` when the
/// window is degenerate (`first == last`) or absent (`None == None`).
fn avg_rate_and_span(first: Option<f64>, last: Option<f64>, bits: u64) -> (f64, f64) {
    match (first, last) {
        (Some(first), Some(last)) if last != first => (bits as f64 / (1000.0 * (last - first)), last - first),
        _ => (0.0, 0.0),
    }
}

fn avg_capacity(capacity: &CapacityStats) -> Option<f64> {
    if capacity.capacity_by_bin.is_empty() {
        return None;
    }
    let first = capacity.first_capacity_ms.expect("non-empty capacity implies first_capacity_ms is set");
    let last = capacity.last_capacity_ms.expect("non-empty capacity implies last_capacity_ms is set");
    if last == first {
        return Some(0.0);
    }
    let sum: u64 = capacity.capacity_by_bin.values().sum();
    Some(sum as f64 / (1000.0 * (last - first)))
}

/// Mean and 95th-percentile (nearest-rank) over `values`, `None` if empty.
fn delay_stats(values: &[f64]) -> (Option<f64>, Option<f64>) {
    if values.is_empty() {
        return (None, None);
    }
    (Some(percentile_95_nearest_rank(values)), Some(mean(values)))
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// 95th percentile, nearest-rank: sort ascending, pick index
/// `ceil(0.95 * n) - 1`, clamped to `[0, n - 1]`.
fn percentile_95_nearest_rank(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("delay samples are finite"));
    let n = sorted.len();
    let rank = ((0.95 * n as f64).ceil() as usize).saturating_sub(1).min(n - 1);
    sorted[rank]
}

/// Densify `map` over `[min_bin, max_bin]`, missing bins read as zero.
fn dense_series(map: &HashMap<BinId, u64>, bin_width_ms: f64) -> TimeSeries {
    let (Some(&min_bin), Some(&max_bin)) = (map.keys().min(), map.keys().max()) else {
        return TimeSeries::default();
    };

    let mut values = Vec::new();
    let mut times_s = Vec::new();
    let mut bin = min_bin;
    while bin <= max_bin {
        let bits = map.get(&bin).copied().unwrap_or(0);
        values.push(mbits(bits, bin_width_ms));
        times_s.push(bin_to_s(bin, bin_width_ms));
        bin += 1;
    }
    TimeSeries { values, times_s }
}

/// Egress series: a leading zero sample at the first departure bin's start
/// time, then the densified series shifted one bin later. Intentional, for
/// plot alignment; see spec.md Open Questions.
fn egress_series(flow: &FlowStats, bin_width_ms: f64) -> TimeSeries {
    let (Some(&min_bin), Some(&max_bin)) =
        (flow.departures_by_bin.keys().min(), flow.departures_by_bin.keys().max())
    else {
        return TimeSeries::default();
    };

    let mut values = vec![0.0];
    let mut times_s = vec![bin_to_s(min_bin, bin_width_ms)];

    let mut bin = min_bin;
    while bin <= max_bin {
        let bits = flow.departures_by_bin.get(&bin).copied().unwrap_or(0);
        values.push(mbits(bits, bin_width_ms));
        times_s.push(bin_to_s(bin + 1, bin_width_ms));
        bin += 1;
    }
    TimeSeries { values, times_s }
}

fn mbits(bits: u64, bin_width_ms: f64) -> f64 {
    bits as f64 / (1000.0 * bin_width_ms)
}

fn bin_to_s(bin_id: BinId, bin_width_ms: f64) -> f64 {
    bin_id as f64 * bin_width_ms / 1000.0
}

#[cfg(test)]
mod tests {
    use super::reduce;
    use accumulator::Accumulator;
    use domain::{AnalyzerError, Event, EventKind};

    fn ev(timestamp_ms: f64, kind: EventKind, bits: u64, flow_id: Option<u32>, delay_ms: Option<f64>) -> Result<Event, AnalyzerError> {
        Ok(Event { timestamp_ms, kind, bits, flow_id, delay_ms })
    }

    #[test]
    fn s1_single_flow_metrics() {
        let events = vec![
            ev(1000.0, EventKind::Arrival, 800, None, None),
            ev(1050.0, EventKind::Departure, 800, None, Some(40.0)),
        ];
        let state = Accumulator::accumulate(events, 500).unwrap();
        let metrics = reduce(&state, 500);

        let flow = &metrics.per_flow[&0];
        assert_eq!(flow.loss_rate, Some(0.0));
        assert_eq!(flow.percentile_delay, Some(40.0));
        assert_eq!(flow.avg_delay, Some(40.0));
        // single departure timestamp -> degenerate span -> avg_egress == 0
        assert_eq!(flow.avg_egress, 0.0);
        assert_eq!(metrics.total_duration_ms, 0.0);
    }

    #[test]
    fn s2_capacity_series_and_average() {
        let events = vec![
            ev(0.0, EventKind::Capacity, 1500 * 8, None, None),
            ev(1000.0, EventKind::Capacity, 1500 * 8, None, None),
        ];
        let state = Accumulator::accumulate(events, 500).unwrap();
        let metrics = reduce(&state, 500);

        // sum(capacity bits) = 2 * 1500 * 8 = 24000; delta = 1000 * (1000 - 0)
        assert!((metrics.avg_capacity.unwrap() - 0.024).abs() < 1e-12);
        assert_eq!(metrics.link_capacity.values.len(), 3);
        assert_eq!(metrics.link_capacity.values, vec![0.024, 0.0, 0.024]);
    }

    #[test]
    fn s3_two_flows_aggregate_percentile() {
        let events = vec![
            ev(0.0, EventKind::Arrival, 125 * 8, Some(1), None),
            ev(0.0, EventKind::Arrival, 125 * 8, Some(2), None),
            ev(10.0, EventKind::Departure, 125 * 8, Some(1), Some(5.0)),
            ev(20.0, EventKind::Departure, 125 * 8, Some(2), Some(3.0)),
        ];
        let state = Accumulator::accumulate(events, 500).unwrap();
        let metrics = reduce(&state, 500);

        assert_eq!(metrics.total_loss_rate, Some(0.0));
        // nearest-rank of [3, 5] at 95% -> index 1 -> 5.0
        assert_eq!(metrics.total_percentile_delay, Some(5.0));
    }

    #[test]
    fn s4_loss_rate_one_half() {
        let events = vec![
            ev(0.0, EventKind::Arrival, 8000, None, None),
            ev(5.0, EventKind::Arrival, 8000, None, None),
            ev(10.0, EventKind::Departure, 8000, None, Some(2.0)),
        ];
        let state = Accumulator::accumulate(events, 500).unwrap();
        let metrics = reduce(&state, 500);

        assert_eq!(metrics.per_flow[&0].loss_rate, Some(0.5));
    }

    #[test]
    fn empty_input_yields_null_scalars_and_zero_duration() {
        let events: Vec<Result<Event, AnalyzerError>> = vec![];
        let state = Accumulator::accumulate(events, 500).unwrap();
        let metrics = reduce(&state, 500);

        assert!(metrics.avg_capacity.is_none());
        assert!(metrics.total_loss_rate.is_none());
        assert!(metrics.total_percentile_delay.is_none());
        assert_eq!(metrics.total_duration_ms, 0.0);
        assert!(metrics.per_flow.is_empty());
    }

    #[test]
    fn egress_series_has_leading_zero_and_correct_length() {
        let events = vec![
            ev(0.0, EventKind::Departure, 800, None, Some(1.0)),
            ev(1200.0, EventKind::Departure, 800, None, Some(1.0)),
        ];
        let state = Accumulator::accumulate(events, 500).unwrap();
        let metrics = reduce(&state, 500);
        let egress = &metrics.per_flow[&0].egress_tput;

        // bins 0 and 2 are populated (1200ms / 500 = bin 2); max_bin - min_bin + 2 = 4
        assert_eq!(egress.values.len(), 4);
        assert_eq!(egress.values[0], 0.0);
    }

    #[test]
    fn bin_density_is_contiguous() {
        let events = vec![
            ev(0.0, EventKind::Capacity, 800, None, None),
            ev(2000.0, EventKind::Capacity, 800, None, None),
        ];
        let state = Accumulator::accumulate(events, 500).unwrap();
        let metrics = reduce(&state, 500);

        for window in metrics.link_capacity.times_s.windows(2) {
            assert!((window[1] - window[0] - 0.5).abs() < 1e-12);
        }
    }

    proptest::proptest! {
        #[test]
        fn percentile_is_permutation_invariant(mut values in proptest::collection::vec(0.0f64..1000.0, 1..50)) {
            let p1 = super::percentile_95_nearest_rank(&values);
            values.reverse();
            let p2 = super::percentile_95_nearest_rank(&values);
            proptest::prop_assert!((p1 - p2).abs() < 1e-9);
        }

        #[test]
        fn percentile_never_exceeds_max(values in proptest::collection::vec(0.0f64..1000.0, 1..50)) {
            let p = super::percentile_95_nearest_rank(&values);
            let max = values.iter().cloned().fold(f64::MIN, f64::max);
            proptest::prop_assert!(p <= max);
        }
    }
}

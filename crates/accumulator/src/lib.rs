// Rust guideline compliant 2026-07-28

//! Binning Accumulator component -- consumes the event stream once and
//! updates `CapacityStats`, per-flow `FlowStats`, and `GlobalStats`.
//!
//! Entry point: [`Accumulator::accumulate`].

use domain::{AccumulatorState, AnalyzerError, BinId, CapacityStats, Event, EventKind, FlowStats};

/// Stateless component that folds an event stream into an [`AccumulatorState`].
///
/// Carries no fields of its own: accumulation needs no adapter to be
/// pluggable, unlike the upstream stages in the broader pipeline family
/// this crate was modeled on.
#[derive(Debug, Default)]
pub struct Accumulator;

impl Accumulator {
    /// Consume `events` in order, accumulating capacity, per-flow, and
    /// global state. `ms_per_bin` is the configured bin width.
    ///
    /// # Errors
    ///
    /// Propagates any parser error from `events`. Returns
    /// [`AnalyzerError::NegativeBin`] if an event's timestamp precedes the
    /// anchor `first_ts` established by the first event of any kind.
    pub fn accumulate<I>(events: I, ms_per_bin: u32) -> Result<AccumulatorState, AnalyzerError>
    where
        I: IntoIterator<Item = Result<Event, AnalyzerError>>,
    {
        let mut state = AccumulatorState::default();
        let bin_width_ms = f64::from(ms_per_bin);

        for (index, event) in events.into_iter().enumerate() {
            let event = event?;

            let first_ts = *state.first_ts.get_or_insert(event.timestamp_ms);
            let bin_id = bin_id_for(event.timestamp_ms, first_ts, bin_width_ms);
            if bin_id < 0 {
                tracing::warn!(
                    event_index = index,
                    timestamp_ms = event.timestamp_ms,
                    "accumulator.negative_bin"
                );
                return Err(AnalyzerError::NegativeBin {
                    event_index: index,
                    timestamp_ms: event.timestamp_ms,
                });
            }

            match event.kind {
                EventKind::Capacity => accumulate_capacity(&mut state.capacity, &event, bin_id),
                EventKind::Arrival => accumulate_arrival(&mut state, &event, bin_id),
                EventKind::Departure => accumulate_departure(&mut state, &event, bin_id, first_ts),
            }
        }

        tracing::debug!(
            flows = state.flows.len(),
            "accumulator.accumulate.complete"
        );
        Ok(state)
    }
}

/// `floor((ts - first_ts) / bin_width_ms)`, per spec.
fn bin_id_for(timestamp_ms: f64, first_ts: f64, bin_width_ms: f64) -> BinId {
    ((timestamp_ms - first_ts) / bin_width_ms).floor() as i64
}

/// Set `*first` on its first observation only; never reassigned afterward.
fn set_first(first: &mut Option<f64>, ts: f64) {
    if first.is_none() {
        *first = Some(ts);
    }
}

/// Update `*last` only on strictly-greater timestamps; ties do not overwrite.
fn update_last(last: &mut Option<f64>, ts: f64) {
    match *last {
        None => *last = Some(ts),
        Some(prev) if ts > prev => *last = Some(ts),
        Some(_) => {}
    }
}

fn accumulate_capacity(capacity: &mut CapacityStats, event: &Event, bin_id: BinId) {
    *capacity.capacity_by_bin.entry(bin_id).or_insert(0) += event.bits;
    set_first(&mut capacity.first_capacity_ms, event.timestamp_ms);
    update_last(&mut capacity.last_capacity_ms, event.timestamp_ms);
}

fn accumulate_arrival(state: &mut AccumulatorState, event: &Event, bin_id: BinId) {
    let flow: &mut FlowStats = state.flows.entry(event.resolved_flow_id()).or_default();
    set_first(&mut flow.first_arrival_ms, event.timestamp_ms);
    update_last(&mut flow.last_arrival_ms, event.timestamp_ms);
    *flow.arrivals_by_bin.entry(bin_id).or_insert(0) += event.bits;

    state.global.total_arrivals_bits += event.bits;
    set_first(&mut state.global.total_first_arrival_ms, event.timestamp_ms);
    update_last(&mut state.global.total_last_arrival_ms, event.timestamp_ms);
}

fn accumulate_departure(state: &mut AccumulatorState, event: &Event, bin_id: BinId, first_ts: f64) {
    let flow: &mut FlowStats = state.flows.entry(event.resolved_flow_id()).or_default();
    set_first(&mut flow.first_departure_ms, event.timestamp_ms);
    update_last(&mut flow.last_departure_ms, event.timestamp_ms);
    *flow.departures_by_bin.entry(bin_id).or_insert(0) += event.bits;

    let delay_ms = event
        .delay_ms
        .expect("departure events always carry a one-way delay");
    flow.delays.push(delay_ms);
    flow.delay_times_s.push((event.timestamp_ms - first_ts) / 1000.0);

    state.global.total_departures_bits += event.bits;
    set_first(&mut state.global.total_first_departure_ms, event.timestamp_ms);
    update_last(&mut state.global.total_last_departure_ms, event.timestamp_ms);
}

#[cfg(test)]
mod tests {
    use super::Accumulator;
    use domain::{AnalyzerError, Event, EventKind};

    fn ev(timestamp_ms: f64, kind: EventKind, bits: u64, flow_id: Option<u32>, delay_ms: Option<f64>) -> Event {
        Event { timestamp_ms, kind, bits, flow_id, delay_ms }
    }

    #[test]
    fn s1_single_flow_one_arrival_one_departure() {
        let events = vec![
            Ok(ev(1000.0, EventKind::Arrival, 800, None, None)),
            Ok(ev(1050.0, EventKind::Departure, 800, None, Some(40.0))),
        ];
        let state = Accumulator::accumulate(events, 500).unwrap();

        assert_eq!(state.flows.len(), 1);
        let flow = &state.flows[&0];
        assert_eq!(flow.total_arrival_bits(), 800);
        assert_eq!(flow.total_departure_bits(), 800);
        assert_eq!(flow.delays, vec![40.0]);
        assert_eq!(state.global.total_arrivals_bits, 800);
        assert_eq!(state.global.total_departures_bits, 800);
    }

    #[test]
    fn s2_capacity_only_creates_no_flows() {
        let events = vec![
            Ok(ev(0.0, EventKind::Capacity, 1500 * 8, None, None)),
            Ok(ev(1000.0, EventKind::Capacity, 1500 * 8, None, None)),
        ];
        let state = Accumulator::accumulate(events, 500).unwrap();

        assert!(state.flows.is_empty());
        assert_eq!(state.capacity.first_capacity_ms, Some(0.0));
        assert_eq!(state.capacity.last_capacity_ms, Some(1000.0));
        assert_eq!(state.capacity.capacity_by_bin.values().sum::<u64>(), 1500 * 8 * 2);
    }

    #[test]
    fn s3_two_flows_insertion_order_preserved() {
        let events = vec![
            Ok(ev(0.0, EventKind::Arrival, 1000, Some(1), None)),
            Ok(ev(0.0, EventKind::Arrival, 1000, Some(2), None)),
            Ok(ev(10.0, EventKind::Departure, 1000, Some(1), Some(5.0))),
            Ok(ev(20.0, EventKind::Departure, 1000, Some(2), Some(3.0))),
        ];
        let state = Accumulator::accumulate(events, 500).unwrap();

        let ids: Vec<u32> = state.flows.keys().copied().collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(state.global.total_arrivals_bits, 2000);
        assert_eq!(state.global.total_departures_bits, 2000);
    }

    #[test]
    fn s4_loss_from_partial_departures() {
        let events = vec![
            Ok(ev(0.0, EventKind::Arrival, 8000, None, None)),
            Ok(ev(5.0, EventKind::Arrival, 8000, None, None)),
            Ok(ev(10.0, EventKind::Departure, 8000, None, Some(2.0))),
        ];
        let state = Accumulator::accumulate(events, 500).unwrap();

        assert_eq!(state.global.total_arrivals_bits, 16000);
        assert_eq!(state.global.total_departures_bits, 8000);
    }

    #[test]
    fn last_timestamp_does_not_overwrite_on_tie() {
        let events = vec![
            Ok(ev(100.0, EventKind::Arrival, 8, None, None)),
            Ok(ev(100.0, EventKind::Arrival, 8, None, None)),
        ];
        let state = Accumulator::accumulate(events, 500).unwrap();
        assert_eq!(state.flows[&0].last_arrival_ms, Some(100.0));
        assert_eq!(state.global.total_last_arrival_ms, Some(100.0));
    }

    #[test]
    fn out_of_order_timestamp_is_negative_bin_error() {
        let events = vec![
            Ok(ev(1000.0, EventKind::Arrival, 8, None, None)),
            Ok(ev(0.0, EventKind::Arrival, 8, None, None)),
        ];
        let err = Accumulator::accumulate(events, 500).unwrap_err();
        assert!(matches!(err, AnalyzerError::NegativeBin { .. }));
    }

    #[test]
    fn parser_error_short_circuits_accumulation() {
        let events: Vec<Result<Event, AnalyzerError>> = vec![
            Ok(ev(0.0, EventKind::Arrival, 8, None, None)),
            Err(AnalyzerError::MalformedLine { line: 2, reason: "bad".to_owned() }),
        ];
        let err = Accumulator::accumulate(events, 500).unwrap_err();
        assert!(matches!(err, AnalyzerError::MalformedLine { .. }));
    }

    proptest::proptest! {
        #[test]
        fn bit_accounting_holds_for_any_arrival_sequence(sizes in proptest::collection::vec(1u64..4096, 0..64)) {
            let events: Vec<Result<Event, AnalyzerError>> = sizes
                .iter()
                .enumerate()
                .map(|(i, &bytes)| Ok(ev(i as f64, EventKind::Arrival, bytes * 8, None, None)))
                .collect();
            let expected: u64 = sizes.iter().map(|&b| b * 8).sum();
            let state = Accumulator::accumulate(events, 500).unwrap();
            let flow_total: u64 = state.flows.get(&0).map_or(0, domain::FlowStats::total_arrival_bits);
            proptest::prop_assert_eq!(flow_total, expected);
            proptest::prop_assert_eq!(state.global.total_arrivals_bits, expected);
        }
    }
}

// Rust guideline compliant 2026-07-28

//! Event Parser component -- reads a tunnel log line by line and emits a
//! lazy sequence of typed [`Event`]s.
//!
//! Entry points: [`parse_tunnel_log`] (opens a file) and [`parse_events`]
//! (reader-generic core, usable directly on an in-memory buffer in tests).

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use domain::{AnalyzerError, Event, EventKind};

/// Lazy sequence of parsed events over a `BufRead`.
///
/// Owns the underlying reader; dropping the stream (including on an early
/// `?` return) releases it. Built via [`parse_events`] or [`parse_tunnel_log`].
#[derive(Debug)]
pub struct EventStream<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl<R: BufRead> Iterator for EventStream<R> {
    type Item = Result<Event, AnalyzerError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let raw = self.lines.next()?;
            self.line_no += 1;

            let line = match raw {
                Ok(line) => line,
                Err(err) => return Some(Err(AnalyzerError::Io(err))),
            };

            // Comment detection tests the raw line's own first character, matching
            // `tunnel_graph.py`'s `line.startswith('#')`; only blank-line detection trims.
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }

            return Some(parse_line(line.trim(), self.line_no));
        }
    }
}

/// Open `path` and return a lazy event stream over it.
///
/// # Errors
///
/// Returns [`AnalyzerError::Io`] if the file cannot be opened.
pub fn parse_tunnel_log(path: &Path) -> Result<EventStream<BufReader<File>>, AnalyzerError> {
    tracing::debug!(path = %path.display(), "parser.open");
    let file = File::open(path)?;
    Ok(parse_events(BufReader::new(file)))
}

/// Build a lazy event stream over any `BufRead`, e.g. an in-memory `Cursor`.
pub fn parse_events<R: BufRead>(reader: R) -> EventStream<R> {
    EventStream {
        lines: reader.lines(),
        line_no: 0,
    }
}

/// Parse one already-trimmed, non-comment, non-blank line into an [`Event`].
fn parse_line(line: &str, line_no: usize) -> Result<Event, AnalyzerError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 3 {
        return malformed(line_no, format!("expected at least 3 tokens, got {}", tokens.len()));
    }

    let timestamp_ms: f64 = match tokens[0].parse() {
        Ok(ts) => ts,
        Err(_) => return malformed(line_no, format!("non-numeric timestamp {:?}", tokens[0])),
    };

    let event = match tokens[1] {
        "#" => parse_capacity(&tokens, timestamp_ms, line_no)?,
        "+" => parse_arrival(&tokens, timestamp_ms, line_no)?,
        "-" => parse_departure(&tokens, timestamp_ms, line_no)?,
        other => return malformed(line_no, format!("unknown event kind tag {other:?}")),
    };
    Ok(event)
}

fn parse_capacity(tokens: &[&str], timestamp_ms: f64, line_no: usize) -> Result<Event, AnalyzerError> {
    if tokens.len() != 3 {
        return malformed(line_no, format!("capacity event expects 3 tokens, got {}", tokens.len()));
    }
    let bits = parse_bits(tokens[2], line_no)?;
    Ok(Event {
        timestamp_ms,
        kind: EventKind::Capacity,
        bits,
        flow_id: None,
        delay_ms: None,
    })
}

fn parse_arrival(tokens: &[&str], timestamp_ms: f64, line_no: usize) -> Result<Event, AnalyzerError> {
    if tokens.len() != 3 && tokens.len() != 4 {
        return malformed(line_no, format!("arrival event expects 3 or 4 tokens, got {}", tokens.len()));
    }
    let bits = parse_bits(tokens[2], line_no)?;
    let flow_id = match tokens.get(3) {
        Some(tok) => Some(parse_flow_id(tok, line_no)?),
        None => None,
    };
    Ok(Event {
        timestamp_ms,
        kind: EventKind::Arrival,
        bits,
        flow_id,
        delay_ms: None,
    })
}

fn parse_departure(tokens: &[&str], timestamp_ms: f64, line_no: usize) -> Result<Event, AnalyzerError> {
    if tokens.len() != 4 && tokens.len() != 5 {
        return malformed(line_no, format!("departure event expects 4 or 5 tokens, got {}", tokens.len()));
    }
    let bits = parse_bits(tokens[2], line_no)?;
    let delay_ms: f64 = tokens[3]
        .parse()
        .map_err(|_| analyzer_malformed(line_no, format!("non-numeric delay {:?}", tokens[3])))?;
    let flow_id = match tokens.get(4) {
        Some(tok) => Some(parse_flow_id(tok, line_no)?),
        None => None,
    };
    Ok(Event {
        timestamp_ms,
        kind: EventKind::Departure,
        bits,
        flow_id,
        delay_ms: Some(delay_ms),
    })
}

fn parse_bits(token: &str, line_no: usize) -> Result<u64, AnalyzerError> {
    let bytes: u64 = token
        .parse()
        .map_err(|_| analyzer_malformed(line_no, format!("non-numeric byte count {token:?}")))?;
    Ok(bytes * 8)
}

fn parse_flow_id(token: &str, line_no: usize) -> Result<u32, AnalyzerError> {
    token
        .parse()
        .map_err(|_| analyzer_malformed(line_no, format!("non-numeric flow id {token:?}")))
}

fn analyzer_malformed(line: usize, reason: String) -> AnalyzerError {
    AnalyzerError::MalformedLine { line, reason }
}

fn malformed<T>(line: usize, reason: String) -> Result<T, AnalyzerError> {
    tracing::warn!(line, %reason, "parser.malformed_line");
    Err(analyzer_malformed(line, reason))
}

/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

//! Trace events and the line format they are parsed from.
//!
//! Each trace line is `timestamp_us, KIND[, payload]`. Whitespace around
//! fields is insignificant and unknown kinds are carried through as
//! [`EventKind::Other`] so newer traces still parse.

use serde::{Deserialize, Serialize};

use crate::{AnalyzerError, Result};

/// Microseconds per millisecond for the fixed-point timestamp conversion.
pub const MICROS_PER_MILLI: i64 = 1000;

/// Largest timestamp magnitude accepted from a trace, in microseconds.
///
/// Keeps every derived key, offset and drift value inside `i64`.
pub const MAX_TIMESTAMP_US: i64 = i64::MAX / 4;

/// Minimum number of comma-separated fields in a usable record.
const MIN_FIELDS: usize = 2;

/// Convert microseconds to milliseconds, truncating toward zero.
///
/// `1999us` becomes `1ms` and `-1999us` becomes `-1ms`.
#[inline]
pub fn us_to_ms(timestamp_us: i64) -> i64 {
    timestamp_us / MICROS_PER_MILLI
}

fn in_range(timestamp_us: i64) -> bool {
    (-MAX_TIMESTAMP_US..=MAX_TIMESTAMP_US).contains(&timestamp_us)
}

/// Kind tag of a trace event, with its kind-dependent payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// `RXV`: a sample was received; carries its sender-side origin time
    ReceivedValue { origin_ms: i64 },
    /// `UNK`: the stream was unkeyed during the window
    Unkeyed,
    /// `POV`: a value was played out
    PlayoutValue { value: String },
    /// `POI`: the played value was interpolated
    PlayoutInterpolated,
    /// Any kind this analyzer does not know about
    Other { tag: String },
}

impl EventKind {
    /// The tag as it appears on the wire
    pub fn tag(&self) -> &str {
        match self {
            EventKind::ReceivedValue { .. } => "RXV",
            EventKind::Unkeyed => "UNK",
            EventKind::PlayoutValue { .. } => "POV",
            EventKind::PlayoutInterpolated => "POI",
            EventKind::Other { tag } => tag.as_str(),
        }
    }
}

/// A single parsed trace event. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Observer-side timestamp in microseconds
    pub timestamp_us: i64,
    /// Event kind and payload
    #[serde(flatten)]
    pub kind: EventKind,
}

impl TraceEvent {
    pub fn new(timestamp_us: i64, kind: EventKind) -> Self {
        Self { timestamp_us, kind }
    }

    /// Timestamp converted to milliseconds (see [`us_to_ms`])
    pub fn timestamp_ms(&self) -> i64 {
        us_to_ms(self.timestamp_us)
    }

    /// Origin time for `RXV` events
    pub fn origin_ms(&self) -> Option<i64> {
        match self.kind {
            EventKind::ReceivedValue { origin_ms } => Some(origin_ms),
            _ => None,
        }
    }
}

/// Parse one trace line.
///
/// Returns `Ok(None)` for malformed records that should be skipped: fewer
/// than two fields, or an `RXV`/`POV` record missing its payload. A
/// timestamp or `RXV` origin that is present but not an integer, or lies
/// beyond [`MAX_TIMESTAMP_US`] once in microseconds, is an error, since
/// guessing would corrupt the ordering analysis.
pub fn parse_line(line_number: usize, line: &str) -> Result<Option<TraceEvent>> {
    let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
    if fields.len() < MIN_FIELDS {
        log::debug!("Line {}: skipping record with {} field(s)", line_number, fields.len());
        return Ok(None);
    }

    let timestamp_us = fields[0]
        .parse::<i64>()
        .ok()
        .filter(|ts| in_range(*ts))
        .ok_or_else(|| AnalyzerError::InvalidTimestamp {
            line: line_number,
            value: fields[0].to_string(),
        })?;

    let payload = fields.get(2).copied().filter(|p| !p.is_empty());

    let kind = match fields[1] {
        "RXV" => {
            let Some(raw) = payload else {
                log::warn!("Line {}: RXV record without origin, skipping", line_number);
                return Ok(None);
            };
            let origin_ms = raw
                .parse::<i64>()
                .ok()
                .filter(|origin| origin.checked_mul(MICROS_PER_MILLI).is_some_and(in_range))
                .ok_or_else(|| AnalyzerError::InvalidPayload {
                    line: line_number,
                    kind: "RXV",
                    value: raw.to_string(),
                })?;
            EventKind::ReceivedValue { origin_ms }
        }
        "UNK" => EventKind::Unkeyed,
        "POV" => {
            let Some(value) = payload else {
                log::warn!("Line {}: POV record without value, skipping", line_number);
                return Ok(None);
            };
            EventKind::PlayoutValue {
                value: value.to_string(),
            }
        }
        "POI" => EventKind::PlayoutInterpolated,
        other => EventKind::Other {
            tag: other.to_string(),
        },
    };

    Ok(Some(TraceEvent::new(timestamp_us, kind)))
}

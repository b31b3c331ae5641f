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

//! Per-bucket sequencing, drift and playout diagnostics.
//!
//! The analyzer walks the bucket range in fixed report steps, visiting
//! every key whether or not any event landed there, so gaps in a capture
//! show up as empty rows instead of disappearing.

use std::fmt;

use serde::Serialize;

use crate::bucket::{BucketWidth, SortedBuckets};
use crate::config::TraceConfig;
use crate::event::{EventKind, TraceEvent, MICROS_PER_MILLI};
use crate::{AnalyzerError, Result};

/// What was played out during a bucket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PlayedValue {
    #[default]
    Nothing,
    Value(String),
    Interpolated,
}

impl fmt::Display for PlayedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayedValue::Nothing => Ok(()),
            PlayedValue::Value(value) => f.write_str(value),
            PlayedValue::Interpolated => f.write_str("INTERPOLATED"),
        }
    }
}

/// Diagnostic record for one visited bucket key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BucketDiagnostics {
    /// Bucket key in microseconds
    pub bucket_key: i64,
    /// Origin times of the `RXV` events, in processing order
    pub received_origins: Vec<i64>,
    /// An origin went backwards or jumped past the gap threshold
    pub sequence_fault: bool,
    /// An `UNK` event was seen
    pub unkeyed: bool,
    /// Clock-offset drift of the last `RXV` in the bucket relative to the
    /// run's first `RXV`, in microseconds; 0 without any `RXV`
    pub delta_us: i64,
    pub played: PlayedValue,
    /// Presentation hint: start a new group before this record
    pub separator_before: bool,
}

impl BucketDiagnostics {
    fn empty(bucket_key: i64) -> Self {
        Self {
            bucket_key,
            ..Default::default()
        }
    }
}

/// Run-scoped state carried from bucket to bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceState {
    /// Origin of the most recent `RXV`; 0 means none seen yet
    pub last_origin_ms: i64,
    /// Clock offset of the first `RXV` of the run
    pub first_delta_us: Option<i64>,
}

/// Sequence and drift analyzer for one trace
#[derive(Debug)]
pub struct SequenceAnalyzer {
    step_us: i64,
    step: usize,
    gap_threshold_ms: i64,
    separator_every_us: Option<i64>,
    state: SequenceState,
}

impl SequenceAnalyzer {
    pub fn new(config: &TraceConfig) -> Result<Self> {
        config.validate()?;
        let width = BucketWidth::from_ms(config.bucket_width_ms)?;
        if config.report_step_us % width.as_us() != 0 {
            log::warn!(
                "Report step {}us is not a multiple of the {}ms bucket width",
                config.report_step_us,
                config.bucket_width_ms
            );
        }
        let step = usize::try_from(config.report_step_us).map_err(|_| {
            AnalyzerError::InvalidConfig(format!(
                "report step {}us out of range",
                config.report_step_us
            ))
        })?;
        Ok(Self {
            step_us: config.report_step_us,
            step,
            gap_threshold_ms: config.gap_threshold_ms,
            separator_every_us: config.separator_every_us,
            state: SequenceState::default(),
        })
    }

    pub fn state(&self) -> SequenceState {
        self.state
    }

    /// Clear run state before analyzing a new trace
    pub fn reset(&mut self) {
        self.state = SequenceState::default();
    }

    /// Lazily analyze a whole trace, one record per report step from the
    /// lowest to the highest observed bucket key.
    ///
    /// Run state is reset before the first record. Records come out in
    /// ascending key order and must be consumed in that order.
    pub fn records<'a>(
        &'a mut self,
        buckets: &'a SortedBuckets,
    ) -> impl Iterator<Item = BucketDiagnostics> + 'a {
        self.reset();

        let keys = buckets.range().map(|range| {
            let end = range.high_key.saturating_add(self.step_us);
            (range.low_key..end).step_by(self.step)
        });

        keys.into_iter()
            .flatten()
            .map(move |key| self.analyze_bucket(key, buckets.get(key).unwrap_or(&[])))
    }

    /// Analyze a whole trace into a vector of records
    pub fn analyze(&mut self, buckets: &SortedBuckets) -> Vec<BucketDiagnostics> {
        let records: Vec<BucketDiagnostics> = self.records(buckets).collect();

        log::info!(
            "Analyzed {} buckets ({} faults) from {} events",
            records.len(),
            records.iter().filter(|r| r.sequence_fault).count(),
            buckets.event_count()
        );
        records
    }

    /// Analyze one bucket's chronologically sorted events
    pub fn analyze_bucket(&mut self, bucket_key: i64, events: &[TraceEvent]) -> BucketDiagnostics {
        let mut record = BucketDiagnostics::empty(bucket_key);
        record.separator_before = self
            .separator_every_us
            .is_some_and(|every| bucket_key.rem_euclid(every) == 0);

        let mut played_value = None;
        let mut interpolated = false;

        for event in events {
            match &event.kind {
                EventKind::ReceivedValue { origin_ms } => {
                    let origin_ms = *origin_ms;
                    record.received_origins.push(origin_ms);

                    if self.is_sequence_fault(origin_ms) {
                        log::debug!(
                            "Sequence fault in bucket {}: origin {}ms after {}ms",
                            bucket_key,
                            origin_ms,
                            self.state.last_origin_ms
                        );
                        record.sequence_fault = true;
                    }
                    self.state.last_origin_ms = origin_ms;

                    // Saturates only for events built outside `parse_line`
                    let offset_us = event
                        .timestamp_us
                        .saturating_sub(origin_ms.saturating_mul(MICROS_PER_MILLI));
                    let first_delta_us = *self.state.first_delta_us.get_or_insert(offset_us);
                    record.delta_us = first_delta_us.saturating_sub(offset_us);
                }
                EventKind::Unkeyed => record.unkeyed = true,
                EventKind::PlayoutValue { value } => played_value = Some(value.clone()),
                EventKind::PlayoutInterpolated => interpolated = true,
                EventKind::Other { .. } => {
                    log::trace!("Ignoring {} at {}us", event.kind.tag(), event.timestamp_us)
                }
            }
        }

        record.played = match (interpolated, played_value) {
            (true, _) => PlayedValue::Interpolated,
            (false, Some(value)) => PlayedValue::Value(value),
            (false, None) => PlayedValue::Nothing,
        };
        record
    }

    fn is_sequence_fault(&self, origin_ms: i64) -> bool {
        let last = self.state.last_origin_ms;
        last != 0 && (origin_ms < last || origin_ms > last.saturating_add(self.gap_threshold_ms))
    }
}

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

//! Fixed-width time bucketing of trace events.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::event::{TraceEvent, MICROS_PER_MILLI};
use crate::{AnalyzerError, Result};

/// Aggregation width in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketWidth(i64);

impl BucketWidth {
    pub fn from_ms(width_ms: i64) -> Result<Self> {
        if width_ms <= 0 {
            return Err(AnalyzerError::InvalidConfig(format!(
                "bucket width must be positive, got {width_ms}ms"
            )));
        }
        Ok(Self(width_ms))
    }

    pub fn as_us(&self) -> i64 {
        self.0 * MICROS_PER_MILLI
    }

    /// `floor(timestamp_ms / width) * width`, in milliseconds
    pub fn key_for_ms(&self, timestamp_ms: i64) -> i64 {
        timestamp_ms.div_euclid(self.0) * self.0
    }

    /// Bucket key of an event, rescaled to absolute microseconds
    pub fn key_for(&self, event: &TraceEvent) -> i64 {
        self.key_for_ms(event.timestamp_ms())
            .saturating_mul(MICROS_PER_MILLI)
    }
}

/// Lowest and highest bucket key observed over a trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketRange {
    pub low_key: i64,
    pub high_key: i64,
}

impl BucketRange {
    fn single(key: i64) -> Self {
        Self {
            low_key: key,
            high_key: key,
        }
    }

    fn include(&mut self, key: i64) {
        self.low_key = self.low_key.min(key);
        self.high_key = self.high_key.max(key);
    }
}

/// Accumulates events into buckets as they are read
#[derive(Debug)]
pub struct BucketAggregator {
    width: BucketWidth,
    buckets: HashMap<i64, Vec<TraceEvent>>,
    range: Option<BucketRange>,
    event_count: usize,
}

impl BucketAggregator {
    pub fn new(width: BucketWidth) -> Self {
        Self {
            width,
            buckets: HashMap::new(),
            range: None,
            event_count: 0,
        }
    }

    /// Assign an event to its bucket, returning the bucket key
    pub fn insert(&mut self, event: TraceEvent) -> i64 {
        let key = self.width.key_for(&event);
        self.buckets.entry(key).or_default().push(event);
        match self.range.as_mut() {
            Some(range) => range.include(key),
            None => self.range = Some(BucketRange::single(key)),
        }
        self.event_count += 1;
        key
    }

    /// Observed key range so far, `None` until the first event
    pub fn range(&self) -> Option<BucketRange> {
        self.range
    }

    /// Sort each bucket chronologically. Ties keep arrival order.
    pub fn finalize(self) -> SortedBuckets {
        let buckets: BTreeMap<i64, Vec<TraceEvent>> = self
            .buckets
            .into_iter()
            .map(|(key, mut events)| {
                events.sort_by_key(|event| event.timestamp_us);
                (key, events)
            })
            .collect();

        SortedBuckets {
            buckets,
            range: self.range,
            event_count: self.event_count,
        }
    }
}

impl Extend<TraceEvent> for BucketAggregator {
    fn extend<I: IntoIterator<Item = TraceEvent>>(&mut self, iter: I) {
        for event in iter {
            self.insert(event);
        }
    }
}

/// Finalized buckets, each sorted by timestamp
#[derive(Debug, Clone)]
pub struct SortedBuckets {
    buckets: BTreeMap<i64, Vec<TraceEvent>>,
    range: Option<BucketRange>,
    event_count: usize,
}

impl SortedBuckets {
    pub fn range(&self) -> Option<BucketRange> {
        self.range
    }

    /// Events of one bucket, `None` if nothing landed there
    pub fn get(&self, key: i64) -> Option<&[TraceEvent]> {
        self.buckets.get(&key).map(Vec::as_slice)
    }

    pub fn event_count(&self) -> usize {
        self.event_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    fn rxv(timestamp_us: i64, origin_ms: i64) -> TraceEvent {
        TraceEvent::new(timestamp_us, EventKind::ReceivedValue { origin_ms })
    }

    #[test]
    fn test_width_must_be_positive() {
        assert!(BucketWidth::from_ms(0).is_err());
        assert!(BucketWidth::from_ms(-4).is_err());
        assert_eq!(BucketWidth::from_ms(4).unwrap().as_us(), 4000);
    }

    #[test]
    fn test_key_is_floor_times_width() {
        let width = BucketWidth::from_ms(4).unwrap();
        assert_eq!(width.key_for_ms(0), 0);
        assert_eq!(width.key_for_ms(3), 0);
        assert_eq!(width.key_for_ms(4), 4);
        assert_eq!(width.key_for_ms(11), 8);
        assert_eq!(width.key_for_ms(-1), -4);
    }

    #[test]
    fn test_equal_timestamps_share_a_bucket() {
        let width = BucketWidth::from_ms(4).unwrap();
        let a = rxv(7999, 1);
        let b = TraceEvent::new(7999, EventKind::Unkeyed);
        assert_eq!(width.key_for(&a), width.key_for(&b));
        assert_eq!(width.key_for(&a), 4000);
    }

    #[test]
    fn test_boundary_microseconds_truncate() {
        let width = BucketWidth::from_ms(4).unwrap();
        // 3999us is 3ms, still the first bucket
        assert_eq!(width.key_for(&rxv(3999, 1)), 0);
        assert_eq!(width.key_for(&rxv(4000, 1)), 4000);
    }

    #[test]
    fn test_extreme_timestamps_saturate_keys() {
        let width = BucketWidth::from_ms(4).unwrap();
        assert_eq!(width.key_for(&rxv(i64::MIN, 1)), i64::MIN);
        assert_eq!(width.key_for(&rxv(i64::MAX, 1)), 9_223_372_036_854_772_000);
    }

    #[test]
    fn test_range_tracks_low_and_high() {
        let mut aggregator = BucketAggregator::new(BucketWidth::from_ms(4).unwrap());
        assert_eq!(aggregator.range(), None);

        aggregator.insert(rxv(9000, 1));
        aggregator.insert(rxv(1000, 2));
        aggregator.insert(rxv(17000, 3));

        assert_eq!(
            aggregator.range(),
            Some(BucketRange {
                low_key: 0,
                high_key: 16000
            })
        );
    }

    #[test]
    fn test_finalize_sorts_and_keeps_every_event() {
        let mut aggregator = BucketAggregator::new(BucketWidth::from_ms(4).unwrap());
        aggregator.extend(vec![
            rxv(3000, 3),
            rxv(1000, 1),
            TraceEvent::new(2000, EventKind::Unkeyed),
            rxv(2000, 2),
            rxv(6000, 4),
        ]);
        let buckets = aggregator.finalize();

        assert_eq!(buckets.event_count(), 5);
        assert!(buckets.get(4000).is_some());

        let first = buckets.get(0).unwrap();
        let timestamps: Vec<i64> = first.iter().map(|e| e.timestamp_us).collect();
        assert_eq!(timestamps, vec![1000, 2000, 2000, 3000]);
        // stable: UNK arrived before the RXV with the same timestamp
        assert_eq!(first[1].kind, EventKind::Unkeyed);
        assert_eq!(first[2].origin_ms(), Some(2));

        assert!(buckets.get(8000).is_none());
    }
}

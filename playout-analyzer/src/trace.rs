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

//! Capture analysis: events -> buckets -> per-bucket diagnostics.

use std::io::BufRead;

use serde::Serialize;

use crate::analyzer::{BucketDiagnostics, SequenceAnalyzer};
use crate::bucket::{BucketAggregator, BucketRange, BucketWidth, SortedBuckets};
use crate::config::TraceConfig;
use crate::source::{ReadSummary, TraceReader};
use crate::Result;

/// Diagnostics for one capture
#[derive(Debug, Clone, Serialize)]
pub struct TraceReport {
    pub summary: ReadSummary,
    pub range: Option<BucketRange>,
    pub records: Vec<BucketDiagnostics>,
}

/// Read a whole capture into sorted buckets
///
/// Buckets can then be streamed through [`SequenceAnalyzer::records`]
/// without materializing every record.
pub fn bucket_trace<R: BufRead>(
    config: &TraceConfig,
    reader: TraceReader<R>,
) -> Result<(SortedBuckets, ReadSummary)> {
    let mut aggregator = BucketAggregator::new(BucketWidth::from_ms(config.bucket_width_ms)?);

    let (events, summary) = reader.read_events()?;
    if summary.skipped > 0 {
        log::warn!("Skipped {} malformed record(s)", summary.skipped);
    }
    aggregator.extend(events);

    Ok((aggregator.finalize(), summary))
}

/// Read a whole capture and analyze it
pub fn analyze_trace<R: BufRead>(
    config: &TraceConfig,
    reader: TraceReader<R>,
) -> Result<TraceReport> {
    let mut analyzer = SequenceAnalyzer::new(config)?;
    let (buckets, summary) = bucket_trace(config, reader)?;
    let records = analyzer.analyze(&buckets);
    Ok(TraceReport {
        summary,
        range: buckets.range(),
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::PlayedValue;
    use std::io::Cursor;

    #[test]
    fn test_capture_with_all_kinds() {
        let capture = "\
            1000,RXV,5\n\
            2000,POV,17\n\
            5000,RXV,8\n\
            6000,UNK\n\
            9000,RXV,40\n\
            9500,POV,3\n\
            9600,POI\n\
            9700,NEW,kind\n";
        let report =
            analyze_trace(&TraceConfig::default(), TraceReader::new(Cursor::new(capture))).unwrap();

        assert_eq!(report.summary.accepted, 8);
        assert_eq!(
            report.range,
            Some(BucketRange {
                low_key: 0,
                high_key: 8000
            })
        );
        assert_eq!(report.records.len(), 3);

        let [first, second, third] = &report.records[..] else {
            panic!("expected three records");
        };
        assert_eq!(first.received_origins, vec![5]);
        assert_eq!(first.played, PlayedValue::Value("17".into()));
        assert_eq!(second.received_origins, vec![8]);
        assert!(second.unkeyed);
        assert!(!second.sequence_fault);
        assert_eq!(third.received_origins, vec![40]);
        assert!(third.sequence_fault);
        assert_eq!(third.played, PlayedValue::Interpolated);
        assert_eq!(report.records.iter().filter(|r| r.sequence_fault).count(), 1);
    }

    #[test]
    fn test_out_of_order_lines_are_sorted_within_bucket() {
        let capture = "3000,RXV,12\n1000,RXV,10\n2000,RXV,11\n";
        let report =
            analyze_trace(&TraceConfig::default(), TraceReader::new(Cursor::new(capture))).unwrap();
        assert_eq!(report.records[0].received_origins, vec![10, 11, 12]);
        assert!(!report.records[0].sequence_fault);
    }

    #[test]
    fn test_bucket_trace_keeps_summary_and_range() {
        let capture = "1000,RXV,5\nbroken\n9000,RXV,7\n4500,UNK\n";
        let (buckets, summary) =
            bucket_trace(&TraceConfig::default(), TraceReader::new(Cursor::new(capture))).unwrap();

        assert_eq!(summary.accepted, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(buckets.event_count(), 3);
        for key in [0, 4000, 8000] {
            assert!(buckets.get(key).is_some());
        }

        let mut analyzer = SequenceAnalyzer::new(&TraceConfig::default()).unwrap();
        let streamed: Vec<BucketDiagnostics> = analyzer.records(&buckets).collect();
        let report =
            analyze_trace(&TraceConfig::default(), TraceReader::new(Cursor::new(capture))).unwrap();
        assert_eq!(streamed, report.records);
    }

    #[test]
    fn test_overflowing_origin_aborts_the_trace() {
        let capture = "1000,RXV,5\n2000,RXV,10000000000000000\n";
        let err = analyze_trace(&TraceConfig::default(), TraceReader::new(Cursor::new(capture)))
            .unwrap_err();
        assert!(matches!(err, crate::AnalyzerError::InvalidPayload { line: 2, .. }));
    }
}

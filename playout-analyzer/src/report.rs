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

//! Text and JSON-lines renderings of analysis results.

use std::borrow::Borrow;
use std::io::Write;

use serde::Serialize;

use crate::analyzer::BucketDiagnostics;
use crate::estimator::PlayoutDecision;
use crate::statistics::MissStatistics;
use crate::Result;

const SEPARATOR: &str = "----------------------------------------";

/// One fixed-layout text row for a bucket
pub fn format_trace_row(record: &BucketDiagnostics) -> String {
    let origins = record
        .received_origins
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "{:>10} {:<32} {:<5} {:<7} {:>8} {}",
        record.bucket_key,
        origins,
        if record.sequence_fault { "FAULT" } else { "" },
        if record.unkeyed { "UNKEYED" } else { "" },
        record.delta_us,
        record.played
    )
    .trim_end()
    .to_string()
}

/// Write every record as a text row, with separators where requested
///
/// Accepts a slice as well as a lazy [`SequenceAnalyzer::records`] stream.
///
/// [`SequenceAnalyzer::records`]: crate::analyzer::SequenceAnalyzer::records
pub fn write_trace_report<W, I>(out: &mut W, records: I) -> Result<()>
where
    W: Write,
    I: IntoIterator,
    I::Item: Borrow<BucketDiagnostics>,
{
    for (index, record) in records.into_iter().enumerate() {
        let record = record.borrow();
        if record.separator_before && index > 0 {
            writeln!(out, "{SEPARATOR}")?;
        }
        writeln!(out, "{}", format_trace_row(record))?;
    }
    Ok(())
}

/// Write every record as one JSON object per line
pub fn write_trace_jsonl<W, I>(out: &mut W, records: I) -> Result<()>
where
    W: Write,
    I: IntoIterator,
    I::Item: Borrow<BucketDiagnostics>,
{
    for record in records {
        serde_json::to_writer(&mut *out, record.borrow())?;
        writeln!(out)?;
    }
    Ok(())
}

#[derive(Serialize)]
struct DecisionRow<'a> {
    index: usize,
    #[serde(flatten)]
    decision: &'a PlayoutDecision,
}

/// Write the arrival/playout series as JSON lines, one per sample
pub fn write_decisions_jsonl<W: Write>(out: &mut W, decisions: &[PlayoutDecision]) -> Result<()> {
    for (index, decision) in decisions.iter().enumerate() {
        serde_json::to_writer(&mut *out, &DecisionRow { index, decision })?;
        writeln!(out)?;
    }
    Ok(())
}

pub fn write_simulation_summary<W: Write>(out: &mut W, statistics: &MissStatistics) -> Result<()> {
    writeln!(out, "Missed packets {}", statistics.missed)?;
    writeln!(out, "Missed packet% {:.2}", statistics.miss_percent())?;
    if let Some(mean) = statistics.mean_playout_point() {
        writeln!(out, "Mean playout point {:.2}", mean)?;
    }
    Ok(())
}

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

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Serialize;

use crate::event::{parse_line, TraceEvent};
use crate::Result;

/// Counters describing one pass over a trace source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReadSummary {
    /// Lines read from the source
    pub lines: usize,
    /// Events accepted
    pub accepted: usize,
    /// Malformed records skipped
    pub skipped: usize,
}

/// Line-oriented reader for capture traces
pub struct TraceReader<R> {
    reader: R,
}

impl TraceReader<BufReader<File>> {
    /// Open a capture file on disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        log::info!("Reading trace from {}", path.as_ref().display());
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> TraceReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Read every event from the source.
    ///
    /// Malformed records are skipped and counted. The first unparseable
    /// timestamp or origin aborts the read.
    pub fn read_events(self) -> Result<(Vec<TraceEvent>, ReadSummary)> {
        let mut events = Vec::new();
        let mut summary = ReadSummary::default();

        for (index, line) in self.reader.lines().enumerate() {
            let line = line?;
            summary.lines += 1;
            match parse_line(index + 1, &line)? {
                Some(event) => {
                    events.push(event);
                    summary.accepted += 1;
                }
                None => summary.skipped += 1,
            }
        }

        log::debug!(
            "Trace read: {} lines, {} events, {} skipped",
            summary.lines,
            summary.accepted,
            summary.skipped
        );
        Ok((events, summary))
    }
}

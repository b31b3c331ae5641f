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

//! # Playout Analyzer
//!
//! Timing analysis for real-time packet streams. Two complementary paths:
//!
//! - **Trace analysis**: a captured event trace is bucketed into fixed time
//!   windows and each window is checked for sequencing faults, clock drift
//!   against the first received sample, unkeyed periods and playout
//!   decisions ([`trace::analyze_trace`]).
//! - **Playout simulation**: a synthetic flight-time series is fed through
//!   an adaptive EWMA delay/deviation estimator to measure how many packets
//!   would miss their playout point ([`simulation::simulate`]).
//!
//! Both paths are single-threaded batch computations; every run owns its
//! own state.

pub mod analyzer;
pub mod arrival;
pub mod bucket;
pub mod config;
pub mod error;
pub mod estimator;
pub mod event;
pub mod report;
pub mod simulation;
pub mod source;
pub mod statistics;
pub mod trace;

pub use analyzer::{BucketDiagnostics, PlayedValue, SequenceAnalyzer, SequenceState};
pub use arrival::{ArrivalDistribution, ArrivalModel};
pub use bucket::{BucketAggregator, BucketRange, BucketWidth, SortedBuckets};
pub use config::{AnalyzerConfig, SimulationConfig, TraceConfig};
pub use error::{AnalyzerError, Result};
pub use estimator::{DelayEstimator, EstimatorConfig, EstimatorState, Outcome, PlayoutDecision};
pub use event::{EventKind, TraceEvent};
pub use simulation::{simulate, SimulationReport};
pub use source::{ReadSummary, TraceReader};
pub use statistics::MissStatistics;
pub use trace::{analyze_trace, bucket_trace, TraceReport};

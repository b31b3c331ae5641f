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

use thiserror::Error;

/// Result type for trace analysis and playout simulation
pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Errors that can occur while reading traces, configuring a run, or
/// feeding the delay estimator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyzerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Line {line}: timestamp {value:?} is not an integer")]
    InvalidTimestamp { line: usize, value: String },

    #[error("Line {line}: {kind} payload {value:?} is not an integer")]
    InvalidPayload {
        line: usize,
        kind: &'static str,
        value: String,
    },

    #[error("Invalid estimator sample: {0}")]
    InvalidSample(f64),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for AnalyzerError {
    fn from(err: std::io::Error) -> Self {
        AnalyzerError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AnalyzerError {
    fn from(err: serde_json::Error) -> Self {
        AnalyzerError::Serialization(err.to_string())
    }
}

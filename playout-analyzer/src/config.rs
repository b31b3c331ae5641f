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

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::arrival::ArrivalDistribution;
use crate::estimator::EstimatorConfig;
use crate::event::{MAX_TIMESTAMP_US, MICROS_PER_MILLI};
use crate::{AnalyzerError, Result};

/// Default aggregation width
const DEFAULT_BUCKET_WIDTH_MS: i64 = 4;

/// Largest forward jump between consecutive origins before it is a gap
const DEFAULT_GAP_THRESHOLD_MS: i64 = 25;

const DEFAULT_SAMPLE_COUNT: usize = 10_000;

/// Configuration of the windowed trace analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Bucket aggregation width in milliseconds
    pub bucket_width_ms: i64,
    /// Distance between visited bucket keys, in microseconds
    pub report_step_us: i64,
    /// Maximum forward origin jump without a sequence fault
    pub gap_threshold_ms: i64,
    /// Emit a separator hint on keys divisible by this many microseconds
    pub separator_every_us: Option<i64>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            bucket_width_ms: DEFAULT_BUCKET_WIDTH_MS,
            report_step_us: DEFAULT_BUCKET_WIDTH_MS * MICROS_PER_MILLI,
            gap_threshold_ms: DEFAULT_GAP_THRESHOLD_MS,
            separator_every_us: None,
        }
    }
}

impl TraceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bucket_width_ms <= 0 {
            return Err(AnalyzerError::InvalidConfig(format!(
                "bucket_width_ms must be positive, got {}",
                self.bucket_width_ms
            )));
        }
        if self.bucket_width_ms > MAX_TIMESTAMP_US / MICROS_PER_MILLI {
            return Err(AnalyzerError::InvalidConfig(format!(
                "bucket_width_ms {} exceeds the trace timestamp range",
                self.bucket_width_ms
            )));
        }
        if self.report_step_us <= 0 {
            return Err(AnalyzerError::InvalidConfig(format!(
                "report_step_us must be positive, got {}",
                self.report_step_us
            )));
        }
        if self.gap_threshold_ms < 0 {
            return Err(AnalyzerError::InvalidConfig(format!(
                "gap_threshold_ms must not be negative, got {}",
                self.gap_threshold_ms
            )));
        }
        if let Some(every) = self.separator_every_us {
            if every <= 0 {
                return Err(AnalyzerError::InvalidConfig(format!(
                    "separator_every_us must be positive, got {every}"
                )));
            }
        }
        Ok(())
    }
}

/// Configuration of the playout simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub estimator: EstimatorConfig,
    /// Number of synthetic packets
    pub sample_count: usize,
    pub distribution: ArrivalDistribution,
    /// Seed for a reproducible series; random when unset
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            estimator: EstimatorConfig::default(),
            sample_count: DEFAULT_SAMPLE_COUNT,
            distribution: ArrivalDistribution::default(),
            seed: None,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        self.estimator.validate()?;
        self.distribution.validate()
    }
}

/// Top-level configuration, loadable from JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub trace: TraceConfig,
    pub simulation: SimulationConfig,
}

impl AnalyzerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        log::debug!("Loaded configuration from {}", path.as_ref().display());
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        self.trace.validate()?;
        self.simulation.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalyzerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.trace.bucket_width_ms, 4);
        assert_eq!(config.trace.report_step_us, 4000);
        assert_eq!(
            config.trace.report_step_us,
            config.trace.bucket_width_ms * MICROS_PER_MILLI
        );
        assert_eq!(config.trace.gap_threshold_ms, 25);
        assert_eq!(config.simulation.sample_count, 10_000);
        assert_eq!(config.simulation.estimator.alpha, 0.998002);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = AnalyzerConfig::from_json_str(
            r#"{
                "trace": { "report_step_us": 8000, "separator_every_us": 40000 },
                "simulation": {
                    "estimator": { "beta": 2.0 },
                    "distribution": { "type": "uniform", "low": 40.0, "high": 70.0 },
                    "seed": 9
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.trace.bucket_width_ms, 4);
        assert_eq!(config.trace.report_step_us, 8000);
        assert_eq!(config.trace.separator_every_us, Some(40_000));
        assert_eq!(config.simulation.estimator.beta, 2.0);
        assert_eq!(config.simulation.estimator.initial_delay, 60.0);
        assert_eq!(
            config.simulation.distribution,
            ArrivalDistribution::Uniform {
                low: 40.0,
                high: 70.0
            }
        );
        assert_eq!(config.simulation.seed, Some(9));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut trace = TraceConfig::default();
        trace.report_step_us = 0;
        assert!(matches!(
            trace.validate(),
            Err(AnalyzerError::InvalidConfig(_))
        ));

        let mut trace = TraceConfig::default();
        trace.separator_every_us = Some(-5);
        assert!(trace.validate().is_err());

        let mut trace = TraceConfig::default();
        trace.bucket_width_ms = i64::MAX / 10;
        assert!(trace.validate().is_err());

        let mut simulation = SimulationConfig::default();
        simulation.estimator.alpha = 1.5;
        assert!(simulation.validate().is_err());
    }

    #[test]
    fn test_malformed_json_is_a_serialization_error() {
        let err = AnalyzerConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, AnalyzerError::Serialization(_)));
    }
}

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

use serde::{Deserialize, Serialize};

use crate::{AnalyzerError, Result};

/// Smoothed delay before any sample has been seen, in ms
const DEFAULT_INITIAL_DELAY: f64 = 60.0;

/// Default smoothing factor.
/// Close to 1 so the estimate adapts over roughly 500 samples.
const DEFAULT_ALPHA: f64 = 0.998002;

/// Deviation multiplier for the playout point
const DEFAULT_BETA: f64 = 4.0;

/// Parameters of the adaptive delay estimator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Smoothing factor in (0, 1)
    pub alpha: f64,
    /// Deviation multiplier, >= 0
    pub beta: f64,
    /// Smoothed delay before the first sample
    pub initial_delay: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            beta: DEFAULT_BETA,
            initial_delay: DEFAULT_INITIAL_DELAY,
        }
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(AnalyzerError::InvalidConfig(format!(
                "alpha must be in (0, 1), got {}",
                self.alpha
            )));
        }
        if !self.beta.is_finite() || self.beta < 0.0 {
            return Err(AnalyzerError::InvalidConfig(format!(
                "beta must be finite and >= 0, got {}",
                self.beta
            )));
        }
        if !self.initial_delay.is_finite() || self.initial_delay < 0.0 {
            return Err(AnalyzerError::InvalidConfig(format!(
                "initial delay must be finite and >= 0, got {}",
                self.initial_delay
            )));
        }
        Ok(())
    }
}

/// Smoothed delay and deviation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EstimatorState {
    pub smoothed_delay: f64,
    pub smoothed_deviation: f64,
}

/// Whether a sample made its playout point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    OnTime,
    Missed,
}

/// Result of feeding one arrival sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlayoutDecision {
    /// Observed flight time
    pub sample: f64,
    pub smoothed_delay: f64,
    pub smoothed_deviation: f64,
    /// `smoothed_delay + beta * smoothed_deviation`
    pub playout_point: f64,
    pub outcome: Outcome,
}

impl PlayoutDecision {
    pub fn is_missed(&self) -> bool {
        self.outcome == Outcome::Missed
    }
}

/// EWMA delay/jitter estimator with a playout decision per sample.
///
/// Same family as the TCP retransmission timer (RFC 793 section 3.7,
/// Jacobson's congestion avoidance paper):
///
/// ```text
/// d_i = alpha * d_{i-1} + (1 - alpha) * n_i
/// v_i = alpha * v_{i-1} + (1 - alpha) * |d_i - n_i|
/// p_i = d_i + beta * v_i
/// ```
///
/// A sample with `n_i > p_i` arrived after it would have been played and
/// counts as missed. Samples must be fed in arrival order.
#[derive(Debug, Clone)]
pub struct DelayEstimator {
    config: EstimatorConfig,
    state: EstimatorState,
}

impl DelayEstimator {
    pub fn new(config: EstimatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: Self::initial_state(&config),
            config,
        })
    }

    fn initial_state(config: &EstimatorConfig) -> EstimatorState {
        EstimatorState {
            smoothed_delay: config.initial_delay,
            smoothed_deviation: 0.0,
        }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    pub fn state(&self) -> EstimatorState {
        self.state
    }

    /// Current playout point without feeding a sample
    pub fn playout_point(&self) -> f64 {
        self.state.smoothed_delay + self.config.beta * self.state.smoothed_deviation
    }

    /// Feed one arrival sample.
    ///
    /// Negative or non-finite samples are rejected and leave the state
    /// untouched.
    pub fn update(&mut self, sample: f64) -> Result<PlayoutDecision> {
        if !sample.is_finite() || sample < 0.0 {
            return Err(AnalyzerError::InvalidSample(sample));
        }

        let alpha = self.config.alpha;
        let delay = alpha * self.state.smoothed_delay + (1.0 - alpha) * sample;
        let deviation =
            alpha * self.state.smoothed_deviation + (1.0 - alpha) * (delay - sample).abs();
        self.state = EstimatorState {
            smoothed_delay: delay,
            smoothed_deviation: deviation,
        };

        let playout_point = self.playout_point();
        let outcome = if sample > playout_point {
            log::trace!(
                "Sample {:.3} missed playout point {:.3}",
                sample,
                playout_point
            );
            Outcome::Missed
        } else {
            Outcome::OnTime
        };

        Ok(PlayoutDecision {
            sample,
            smoothed_delay: delay,
            smoothed_deviation: deviation,
            playout_point,
            outcome,
        })
    }

    /// Return to the initial delay and zero deviation
    pub fn reset(&mut self) {
        self.state = Self::initial_state(&self.config);
    }
}

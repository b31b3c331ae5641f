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

//! Playout simulation: synthetic arrivals through the delay estimator.

use serde::Serialize;

use crate::config::SimulationConfig;
use crate::estimator::{DelayEstimator, EstimatorConfig, EstimatorState, PlayoutDecision};
use crate::statistics::MissStatistics;
use crate::Result;

/// Outcome of evaluating the estimator over a sample series
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub estimator: EstimatorConfig,
    pub statistics: MissStatistics,
    pub final_state: EstimatorState,
    /// One decision per sample, in arrival order
    #[serde(skip)]
    pub decisions: Vec<PlayoutDecision>,
}

/// Run the estimator over explicit samples, in order.
///
/// The first invalid sample aborts the run.
pub fn evaluate(config: EstimatorConfig, samples: &[f64]) -> Result<SimulationReport> {
    let mut estimator = DelayEstimator::new(config)?;
    let mut statistics = MissStatistics::new();
    let mut decisions = Vec::with_capacity(samples.len());

    for &sample in samples {
        let decision = estimator.update(sample)?;
        statistics.record(&decision);
        decisions.push(decision);
    }

    Ok(SimulationReport {
        estimator: *estimator.config(),
        statistics,
        final_state: estimator.state(),
        decisions,
    })
}

/// Generate the configured arrival series and evaluate it
pub fn simulate(config: &SimulationConfig) -> Result<SimulationReport> {
    config.validate()?;

    let mut arrivals = config.distribution.build(config.seed)?;
    let samples = arrivals.take_samples(config.sample_count);
    log::debug!(
        "Generated {} flight times from {:?}",
        samples.len(),
        config.distribution
    );

    let report = evaluate(config.estimator, &samples)?;
    log::info!(
        "Simulation: {} of {} packets missed ({:.2}%)",
        report.statistics.missed,
        report.statistics.total,
        report.statistics.miss_percent()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrival::ArrivalDistribution;
    use crate::AnalyzerError;

    #[test]
    fn test_exact_miss_rate() {
        let config = EstimatorConfig {
            alpha: 0.5,
            beta: 0.0,
            initial_delay: 10.0,
        };
        // playout points: 10, 15, 12.5, 11.25, 20.625
        let report = evaluate(config, &[10.0, 20.0, 10.0, 10.0, 30.0]).unwrap();

        let missed: Vec<bool> = report.decisions.iter().map(|d| d.is_missed()).collect();
        assert_eq!(missed, vec![false, true, false, false, true]);
        assert_eq!(report.statistics.missed, 2);
        assert_eq!(report.statistics.total, 5);
        assert_eq!(report.statistics.miss_rate(), 2.0 / 5.0);
        assert_eq!(report.final_state.smoothed_delay, 20.625);
    }

    #[test]
    fn test_invalid_sample_aborts_evaluation() {
        let err = evaluate(EstimatorConfig::default(), &[50.0, -1.0, 50.0]).unwrap_err();
        assert_eq!(err, AnalyzerError::InvalidSample(-1.0));
    }

    #[test]
    fn test_constant_simulation_never_misses() {
        let config = SimulationConfig {
            sample_count: 1000,
            distribution: ArrivalDistribution::Constant { value: 50.0 },
            ..Default::default()
        };
        let report = simulate(&config).unwrap();
        assert_eq!(report.statistics.total, 1000);
        assert_eq!(report.statistics.missed, 0);
        assert_eq!(report.decisions.len(), 1000);
    }

    #[test]
    fn test_seeded_simulation_is_deterministic() {
        let config = SimulationConfig {
            sample_count: 2000,
            seed: Some(1234),
            ..Default::default()
        };
        let a = simulate(&config).unwrap();
        let b = simulate(&config).unwrap();
        assert_eq!(a.statistics, b.statistics);
        assert_eq!(a.decisions, b.decisions);
    }

    #[test]
    fn test_larger_beta_misses_less() {
        let base = SimulationConfig {
            sample_count: 5000,
            seed: Some(99),
            ..Default::default()
        };
        let mut tight = base.clone();
        tight.estimator.beta = 0.5;

        let wide = simulate(&base).unwrap();
        let tight = simulate(&tight).unwrap();
        assert!(wide.statistics.missed < tight.statistics.missed);
    }
}

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

//! Synthetic flight-time generators used to exercise the delay estimator.
//!
//! The statistical model of real network jitter is still open, so the
//! generator is a trait and the distribution a configuration choice.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{AnalyzerError, Result};

/// Source of per-packet flight times
pub trait ArrivalModel {
    /// Next flight time. Never negative or non-finite.
    fn next_flight_time(&mut self) -> f64;

    /// Draw `count` consecutive flight times
    fn take_samples(&mut self, count: usize) -> Vec<f64> {
        (0..count).map(|_| self.next_flight_time()).collect()
    }
}

/// Normally distributed flight times (Box-Muller transform)
#[derive(Debug)]
pub struct NormalArrivals {
    mean: f64,
    std_dev: f64,
    rng: StdRng,
    spare: Option<f64>,
}

impl NormalArrivals {
    pub fn new(mean: f64, variance: f64, rng: StdRng) -> Result<Self> {
        if !mean.is_finite() || !variance.is_finite() || variance < 0.0 {
            return Err(AnalyzerError::InvalidConfig(format!(
                "normal arrivals need a finite mean and variance >= 0, got {mean} and {variance}"
            )));
        }
        Ok(Self {
            mean,
            std_dev: variance.sqrt(),
            rng,
            spare: None,
        })
    }

    fn standard_normal(&mut self) -> f64 {
        if let Some(spare) = self.spare.take() {
            return spare;
        }

        // (0, 1] so the log stays finite
        let u1 = 1.0 - self.rng.random::<f64>();
        let u2 = self.rng.random::<f64>();

        let magnitude = (-2.0 * u1.ln()).sqrt();
        let angle = 2.0 * PI * u2;

        self.spare = Some(magnitude * angle.sin());
        magnitude * angle.cos()
    }
}

impl ArrivalModel for NormalArrivals {
    fn next_flight_time(&mut self) -> f64 {
        // A packet cannot arrive before it was sent
        (self.mean + self.std_dev * self.standard_normal()).max(0.0)
    }
}

/// Flight times uniformly distributed over `[low, high)`
#[derive(Debug)]
pub struct UniformArrivals {
    low: f64,
    high: f64,
    rng: StdRng,
}

impl UniformArrivals {
    pub fn new(low: f64, high: f64, rng: StdRng) -> Result<Self> {
        if !low.is_finite() || !high.is_finite() || low < 0.0 || high < low {
            return Err(AnalyzerError::InvalidConfig(format!(
                "uniform arrivals need 0 <= low <= high, got low={low} high={high}"
            )));
        }
        Ok(Self { low, high, rng })
    }
}

impl ArrivalModel for UniformArrivals {
    fn next_flight_time(&mut self) -> f64 {
        self.low + (self.high - self.low) * self.rng.random::<f64>()
    }
}

/// The same flight time for every packet
#[derive(Debug, Clone, Copy)]
pub struct ConstantArrivals {
    value: f64,
}

impl ConstantArrivals {
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() || value < 0.0 {
            return Err(AnalyzerError::InvalidConfig(format!(
                "constant flight time must be finite and >= 0, got {value}"
            )));
        }
        Ok(Self { value })
    }
}

impl ArrivalModel for ConstantArrivals {
    fn next_flight_time(&mut self) -> f64 {
        self.value
    }
}

/// Mean flight time of the default normal distribution
pub const DEFAULT_MEAN: f64 = 50.0;
/// Variance of the default normal distribution
pub const DEFAULT_VARIANCE: f64 = 12.0;
/// Bounds used when switching to a uniform distribution without explicit ones
pub const DEFAULT_UNIFORM_RANGE: (f64, f64) = (40.0, 60.0);

/// Configured arrival distribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArrivalDistribution {
    Normal { mean: f64, variance: f64 },
    Uniform { low: f64, high: f64 },
    Constant { value: f64 },
}

impl Default for ArrivalDistribution {
    fn default() -> Self {
        ArrivalDistribution::Normal {
            mean: DEFAULT_MEAN,
            variance: DEFAULT_VARIANCE,
        }
    }
}

impl ArrivalDistribution {
    /// Build a generator. A fixed `seed` makes the series reproducible.
    pub fn build(&self, seed: Option<u64>) -> Result<Box<dyn ArrivalModel>> {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };

        Ok(match *self {
            ArrivalDistribution::Normal { mean, variance } => {
                Box::new(NormalArrivals::new(mean, variance, rng)?)
            }
            ArrivalDistribution::Uniform { low, high } => {
                Box::new(UniformArrivals::new(low, high, rng)?)
            }
            ArrivalDistribution::Constant { value } => Box::new(ConstantArrivals::new(value)?),
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.build(Some(0)).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn mean_and_variance(samples: &[f64]) -> (f64, f64) {
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        (mean, variance)
    }

    #[test]
    fn test_normal_arrivals_statistics() {
        let mut model = ArrivalDistribution::default().build(Some(7)).unwrap();
        let samples = model.take_samples(20_000);
        let (mean, variance) = mean_and_variance(&samples);

        assert_abs_diff_eq!(mean, 50.0, epsilon = 0.2);
        assert_abs_diff_eq!(variance, 12.0, epsilon = 0.6);
        assert!(samples.iter().all(|s| *s >= 0.0));
    }

    #[test]
    fn test_seeded_series_is_reproducible() {
        let distribution = ArrivalDistribution::Uniform {
            low: 10.0,
            high: 20.0,
        };
        let a = distribution.build(Some(42)).unwrap().take_samples(100);
        let b = distribution.build(Some(42)).unwrap().take_samples(100);
        assert_eq!(a, b);
        assert!(a.iter().all(|s| (10.0..20.0).contains(s)));
    }

    #[test]
    fn test_normal_is_clamped_at_zero() {
        let rng = StdRng::seed_from_u64(1);
        let mut model = NormalArrivals::new(0.0, 100.0, rng).unwrap();
        assert!(model.take_samples(1000).iter().all(|s| *s >= 0.0));
    }

    #[test]
    fn test_constant_arrivals() {
        let mut model = ArrivalDistribution::Constant { value: 50.0 }
            .build(None)
            .unwrap();
        assert_eq!(model.take_samples(3), vec![50.0, 50.0, 50.0]);
    }

    #[test]
    fn test_invalid_parameters_are_rejected() {
        assert!(ArrivalDistribution::Normal {
            mean: 50.0,
            variance: -1.0
        }
        .validate()
        .is_err());
        assert!(ArrivalDistribution::Uniform {
            low: 20.0,
            high: 10.0
        }
        .validate()
        .is_err());
        assert!(ArrivalDistribution::Constant { value: -3.0 }
            .validate()
            .is_err());
    }
}

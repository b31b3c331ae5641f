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

use crate::estimator::{Outcome, PlayoutDecision};

/// Miss accounting over a run of playout decisions
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MissStatistics {
    /// Samples evaluated
    pub total: u64,
    /// Samples that arrived after their playout point
    pub missed: u64,
    /// Sum of playout points, for the mean buffering delay
    playout_point_sum: f64,
}

impl MissStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, decision: &PlayoutDecision) {
        self.total += 1;
        if decision.outcome == Outcome::Missed {
            self.missed += 1;
        }
        self.playout_point_sum += decision.playout_point;
    }

    /// `missed / total`, 0 when nothing was recorded
    pub fn miss_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.missed as f64 / self.total as f64
        }
    }

    pub fn miss_percent(&self) -> f64 {
        100.0 * self.miss_rate()
    }

    /// Average playout point, i.e. how much delay the buffer added
    pub fn mean_playout_point(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.playout_point_sum / self.total as f64)
        }
    }
}

impl<'a> Extend<&'a PlayoutDecision> for MissStatistics {
    fn extend<I: IntoIterator<Item = &'a PlayoutDecision>>(&mut self, iter: I) {
        for decision in iter {
            self.record(decision);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(playout_point: f64, outcome: Outcome) -> PlayoutDecision {
        PlayoutDecision {
            sample: 0.0,
            smoothed_delay: playout_point,
            smoothed_deviation: 0.0,
            playout_point,
            outcome,
        }
    }

    #[test]
    fn test_empty_statistics() {
        let stats = MissStatistics::new();
        assert_eq!(stats.miss_rate(), 0.0);
        assert_eq!(stats.mean_playout_point(), None);
    }

    #[test]
    fn test_miss_rate_and_mean_playout() {
        let mut stats = MissStatistics::new();
        stats.extend(&[
            decision(10.0, Outcome::OnTime),
            decision(20.0, Outcome::Missed),
            decision(30.0, Outcome::OnTime),
            decision(40.0, Outcome::OnTime),
        ]);

        assert_eq!(stats.total, 4);
        assert_eq!(stats.missed, 1);
        assert_eq!(stats.miss_rate(), 0.25);
        assert_eq!(stats.miss_percent(), 25.0);
        assert_eq!(stats.mean_playout_point(), Some(25.0));
    }
}

//! Stagnation detection over a sliding window of best scores.

use crate::common::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceConfig {
    /// Largest first-to-last change across the window still counted as stalled.
    pub threshold: f64,
    /// Number of consecutive best scores compared.
    pub window: usize,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            threshold: 1e-6,
            window: 20,
        }
    }
}

impl ConvergenceConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.window < 2 {
            return Err(ConfigError::InvalidParameter(format!(
                "convergence window must be at least 2 (got {})",
                self.window
            )));
        }
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(ConfigError::InvalidParameter(format!(
                "convergence threshold must be a non-negative number (got {})",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// Once converged, stays converged for the rest of the run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceTracker {
    config: ConvergenceConfig,
    scores: VecDeque<f64>,
    converged: bool,
}

impl ConvergenceTracker {
    pub fn new(config: ConvergenceConfig) -> Self {
        Self {
            config,
            scores: VecDeque::with_capacity(config.window + 1),
            converged: false,
        }
    }

    pub fn config(&self) -> &ConvergenceConfig {
        &self.config
    }

    /// Record the best score of the iteration just completed.
    pub fn observe(&mut self, best_score: f64) -> bool {
        self.scores.push_back(best_score);
        while self.scores.len() > self.config.window {
            self.scores.pop_front();
        }
        if self.scores.len() < self.config.window {
            return self.converged;
        }

        if let (Some(first), Some(last)) = (self.scores.front(), self.scores.back()) {
            if (last - first).abs() < self.config.threshold {
                self.converged = true;
            }
        }
        self.converged
    }

    pub fn is_converged(&self) -> bool {
        self.converged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_full_window() {
        let mut tracker = ConvergenceTracker::new(ConvergenceConfig {
            threshold: 1e-3,
            window: 3,
        });
        assert!(!tracker.observe(1.0));
        assert!(!tracker.observe(1.0));
        assert!(tracker.observe(1.0));
        assert!(tracker.is_converged());
    }

    #[test]
    fn test_improving_scores_do_not_converge() {
        let mut tracker = ConvergenceTracker::new(ConvergenceConfig {
            threshold: 1e-3,
            window: 3,
        });
        for score in [10.0, 9.0, 8.0, 7.0, 6.0] {
            assert!(!tracker.observe(score));
        }
    }

    #[test]
    fn test_infinite_scores_never_converge() {
        let mut tracker = ConvergenceTracker::new(ConvergenceConfig {
            threshold: 1.0,
            window: 2,
        });
        tracker.observe(f64::INFINITY);
        assert!(!tracker.observe(f64::INFINITY));
    }

    #[test]
    fn test_validate() {
        assert!(ConvergenceConfig::default().validate().is_ok());
        assert!(ConvergenceConfig { threshold: 1e-6, window: 1 }.validate().is_err());
        assert!(ConvergenceConfig { threshold: -1.0, window: 5 }.validate().is_err());
    }
}

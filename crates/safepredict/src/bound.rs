//! Error Bound
//!
//! Evaluates the guarantee the exponential-weights update provides after `t`
//! rounds. Against the abstain expert, whose cumulative loss is `eps * t`,
//! the mixture's regret is at most
//!
//! ```text
//! R_t = ln(1 / (1 - w0)) / eta + eta * t / 8 + t * ln(1 / (1 - alpha)) / eta
//! ```
//!
//! which rearranges to `sum p_s * loss_s - eps * sum p_s <= R_t`, i.e. the
//! expected error rate among predictions is at most `eps + R_t / sum p_s`.

use serde::{Deserialize, Serialize};

use crate::config::SafePredictConfig;
use crate::state::ControllerState;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorBound {
    /// Configured target error rate
    pub target_error: f64,
    /// Errors over emitted predictions
    pub realized_error_rate: f64,
    /// Expected errors over expected predictions
    pub expected_error_rate: f64,
    /// Regret bound at the current round
    pub regret_bound: f64,
    /// Allowed excess of the expected error rate over the target
    pub excess_bound: f64,
}

impl ErrorBound {
    pub fn from_state(state: &ControllerState, config: &SafePredictConfig) -> Self {
        let regret_bound = regret_bound(
            state.round,
            config.initial_predict_weight,
            config.effective_learning_rate(),
            config.effective_weight_shift(),
        );
        let excess_bound = if state.expected_predictions > 0.0 {
            regret_bound / state.expected_predictions
        } else {
            f64::INFINITY
        };

        Self {
            target_error: config.target_error,
            realized_error_rate: state.error_rate(),
            expected_error_rate: state.expected_error_rate(),
            regret_bound,
            excess_bound,
        }
    }

    /// Upper limit on the expected error rate
    pub fn limit(&self) -> f64 {
        self.target_error + self.excess_bound
    }

    pub fn within_target(&self) -> bool {
        self.expected_error_rate <= self.limit()
    }
}

/// Regret of the predict/abstain mixture against always abstaining
pub fn regret_bound(rounds: u64, initial_predict_weight: f64, learning_rate: f64, weight_shift: f64) -> f64 {
    let t = rounds as f64;
    let prior = (1.0 / (1.0 - initial_predict_weight)).ln();
    let shift = (1.0 / (1.0 - weight_shift)).ln();
    prior / learning_rate + learning_rate * t / 8.0 + t * shift / learning_rate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regret_bound_terms() {
        // Only the prior term at t = 0
        let r = regret_bound(0, 0.5, 0.5, 0.01);
        assert!((r - 2.0_f64.ln() / 0.5).abs() < 1e-12);

        // No shift: prior plus the variance term
        let r = regret_bound(800, 0.5, 0.2, 0.0);
        assert!((r - (2.0_f64.ln() / 0.2 + 20.0)).abs() < 1e-9);
    }

    #[test]
    fn test_bound_without_predictions_is_vacuous() {
        let state = ControllerState::seeded(0.5, 10);
        let bound = ErrorBound::from_state(&state, &SafePredictConfig::new(0.1));

        assert!(bound.excess_bound.is_infinite());
        assert!(bound.within_target());
    }

    #[test]
    fn test_bound_tightens_with_predictions() {
        let config = SafePredictConfig::new(0.1).with_learning_rate(0.3);
        let mut state = ControllerState::seeded(0.5, 0);
        let mut previous = f64::INFINITY;
        for i in 0..400 {
            let correct = i % 20 != 0;
            state.apply_round(true, correct, 0.1, 0.3, config.effective_weight_shift());
            let bound = ErrorBound::from_state(&state, &config);
            assert!(bound.within_target());
            if i > 50 {
                assert!(bound.excess_bound <= previous + 1e-9);
            }
            previous = bound.excess_bound;
        }
    }
}

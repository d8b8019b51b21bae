//! Controller State
//!
//! Sufficient statistics of the stream plus the acceptance probability for the
//! next round. The record is flat so it snapshots cleanly to JSON.
//!
//! The acceptance probability is the normalized weight of a "predict" expert
//! competing against an "abstain" expert under exponential weights:
//!
//! ```text
//! logit(p~)  = logit(p_t) - eta * (loss_t - eps)
//! p_{t+1}    = p~ + alpha * (1 - p~)
//! ```
//!
//! `loss_t` is the base estimator's 0/1 loss, the abstain expert always pays
//! `eps`, and the second line moves a fixed share `alpha` of the abstain
//! weight back to the predict expert so the controller can recover after a
//! change point.

use serde::{Deserialize, Serialize};

use crate::error::{SafePredictError, SafePredictResult};

/// Bound on the log-odds of the predict weight; keeps p off exactly 0 or 1
const LOGIT_LIMIT: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControllerState {
    /// Rounds resolved since seeding
    pub round: u64,
    /// Rounds where the prediction was emitted
    pub predictions: u64,
    /// Emitted predictions that were wrong
    pub errors: u64,
    /// Sum of acceptance probabilities over resolved rounds
    pub expected_predictions: f64,
    /// Sum of acceptance probability times base-estimator loss
    pub expected_errors: f64,
    /// Acceptance probability for the next round
    pub predict_weight: f64,
    /// Size of the batch the controller was seeded with
    pub seed_size: u64,
}

impl ControllerState {
    /// Fresh state right after seeding
    pub fn seeded(initial_predict_weight: f64, seed_size: u64) -> Self {
        Self {
            round: 0,
            predictions: 0,
            errors: 0,
            expected_predictions: 0.0,
            expected_errors: 0.0,
            predict_weight: initial_predict_weight,
            seed_size,
        }
    }

    /// Fold one resolved round into the statistics and reweight the experts.
    ///
    /// `base_correct` is whether the base estimator's prediction matched the
    /// label, which the update needs even on abstained rounds.
    pub fn apply_round(
        &mut self,
        predicted: bool,
        base_correct: bool,
        target_error: f64,
        learning_rate: f64,
        weight_shift: f64,
    ) {
        let p = self.predict_weight;
        let loss = if base_correct { 0.0 } else { 1.0 };

        self.round += 1;
        self.expected_predictions += p;
        self.expected_errors += p * loss;
        if predicted {
            self.predictions += 1;
            if !base_correct {
                self.errors += 1;
            }
        }

        let log_odds = (logit(p) - learning_rate * (loss - target_error))
            .clamp(-LOGIT_LIMIT, LOGIT_LIMIT);
        let shifted = sigmoid(log_odds);
        self.predict_weight = shifted + weight_shift * (1.0 - shifted);
    }

    /// Fraction of emitted predictions that were wrong
    pub fn error_rate(&self) -> f64 {
        if self.predictions == 0 {
            0.0
        } else {
            self.errors as f64 / self.predictions as f64
        }
    }

    /// Fraction of resolved rounds where the prediction was emitted
    pub fn prediction_rate(&self) -> f64 {
        if self.round == 0 {
            0.0
        } else {
            self.predictions as f64 / self.round as f64
        }
    }

    /// Expected error rate given the acceptance probabilities actually used
    pub fn expected_error_rate(&self) -> f64 {
        if self.expected_predictions <= 0.0 {
            0.0
        } else {
            self.expected_errors / self.expected_predictions
        }
    }

    /// Reject records that could not have come out of `apply_round`
    pub fn validate(&self) -> SafePredictResult<()> {
        let p = self.predict_weight;
        if !(p.is_finite() && (0.0..=1.0).contains(&p)) {
            return Err(SafePredictError::InvalidInput(format!(
                "predict_weight must be in [0, 1], got {p}"
            )));
        }
        if self.predictions > self.round {
            return Err(SafePredictError::InvalidInput(format!(
                "{} predictions over {} rounds",
                self.predictions, self.round
            )));
        }
        if self.errors > self.predictions {
            return Err(SafePredictError::InvalidInput(format!(
                "{} errors over {} predictions",
                self.errors, self.predictions
            )));
        }
        let expected_ok = self.expected_predictions.is_finite()
            && self.expected_errors.is_finite()
            && self.expected_errors >= 0.0
            && self.expected_predictions >= self.expected_errors;
        if !expected_ok {
            return Err(SafePredictError::InvalidInput(format!(
                "inconsistent expected counts: {} errors over {} predictions",
                self.expected_errors, self.expected_predictions
            )));
        }
        Ok(())
    }
}

fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_round_raises_weight() {
        let mut state = ControllerState::seeded(0.5, 10);
        state.apply_round(true, true, 0.1, 0.5, 0.0);

        assert_eq!(state.round, 1);
        assert_eq!(state.predictions, 1);
        assert_eq!(state.errors, 0);
        // logit moves up by eta * eps
        assert!((state.predict_weight - sigmoid(0.05)).abs() < 1e-12);
    }

    #[test]
    fn test_wrong_round_lowers_weight_even_when_abstained() {
        let mut state = ControllerState::seeded(0.5, 10);
        state.apply_round(false, false, 0.1, 0.5, 0.0);

        assert_eq!(state.predictions, 0);
        assert_eq!(state.errors, 0);
        assert!((state.predict_weight - sigmoid(-0.45)).abs() < 1e-12);
        assert!((state.expected_errors - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_weight_shift_sets_floor() {
        let mut state = ControllerState::seeded(0.5, 0);
        for _ in 0..2000 {
            state.apply_round(false, false, 0.05, 1.0, 0.01);
        }
        assert!(state.predict_weight >= 0.01);
        assert!(state.predict_weight.is_finite());
    }

    #[test]
    fn test_extreme_weights_stay_finite() {
        let mut state = ControllerState::seeded(0.5, 0);
        for _ in 0..5000 {
            state.apply_round(true, true, 0.5, 1.0, 0.0);
        }
        assert!(state.predict_weight <= 1.0);

        let mut state = ControllerState::seeded(0.5, 0);
        for _ in 0..5000 {
            state.apply_round(false, false, 0.5, 1.0, 0.0);
        }
        assert!(state.predict_weight > 0.0);
        assert!(state.predict_weight.is_finite());
    }

    #[test]
    fn test_saturated_weight_still_reacts() {
        let mut state = ControllerState::seeded(0.5, 0);
        for _ in 0..5000 {
            state.apply_round(true, true, 0.5, 1.0, 0.0);
        }
        let saturated = state.predict_weight;
        assert!(saturated < 1.0);

        state.apply_round(true, false, 0.5, 1.0, 0.0);
        assert!(state.predict_weight < saturated);
    }

    #[test]
    fn test_rates() {
        let mut state = ControllerState::seeded(0.5, 0);
        assert_eq!(state.error_rate(), 0.0);
        assert_eq!(state.prediction_rate(), 0.0);

        state.apply_round(true, false, 0.1, 0.1, 0.0);
        state.apply_round(true, true, 0.1, 0.1, 0.0);
        state.apply_round(false, true, 0.1, 0.1, 0.0);
        state.apply_round(false, true, 0.1, 0.1, 0.0);

        assert_eq!(state.error_rate(), 0.5);
        assert_eq!(state.prediction_rate(), 0.5);
    }

    #[test]
    fn test_validate_rejects_inconsistent_records() {
        let good = ControllerState::seeded(0.5, 3);
        assert!(good.validate().is_ok());

        let mut bad = good;
        bad.predict_weight = 1.5;
        assert!(bad.validate().is_err());

        let mut bad = good;
        bad.predictions = 2;
        assert!(bad.validate().is_err());

        let mut bad = good;
        bad.round = 5;
        bad.predictions = 2;
        bad.errors = 3;
        assert!(bad.validate().is_err());

        let mut bad = good;
        bad.expected_errors = 1.0;
        assert!(bad.validate().is_err());
    }
}

//! Controller Configuration
//!
//! Construction options for the SafePredict controller. Everything except the
//! target error rate has a default. The defaults for the learning rate and the
//! weight shift are constants, so the controller keeps reacting to change
//! points however long the stream runs.

use serde::{Deserialize, Serialize};

use crate::error::{SafePredictError, SafePredictResult};

/// Learning rate used when none is given.
pub const DEFAULT_LEARNING_RATE: f64 = 1.0;

/// Weight shift used when none is given; also the floor on the acceptance probability.
pub const DEFAULT_WEIGHT_SHIFT: f64 = 0.001;

/// Starting weight of the "predict" expert.
pub const DEFAULT_INITIAL_PREDICT_WEIGHT: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafePredictConfig {
    /// Target error rate among emitted predictions, in (0, 1)
    pub target_error: f64,
    /// Multiplicative-weights learning rate (eta). [`DEFAULT_LEARNING_RATE`] when unset.
    #[serde(default)]
    pub learning_rate: Option<f64>,
    /// Fraction of the abstain weight moved to the predict expert each round (alpha).
    /// [`DEFAULT_WEIGHT_SHIFT`] when unset; 0 disables weight shifting.
    #[serde(default)]
    pub weight_shift: Option<f64>,
    /// Initial acceptance probability, in (0, 1)
    #[serde(default = "default_initial_predict_weight")]
    pub initial_predict_weight: f64,
    /// Seed for the accept/abstain coin flips. Entropy-seeded when unset.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_initial_predict_weight() -> f64 {
    DEFAULT_INITIAL_PREDICT_WEIGHT
}

impl SafePredictConfig {
    /// Config with the given target and every other option at its default
    pub fn new(target_error: f64) -> Self {
        Self {
            target_error,
            learning_rate: None,
            weight_shift: None,
            initial_predict_weight: DEFAULT_INITIAL_PREDICT_WEIGHT,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = Some(learning_rate);
        self
    }

    pub fn with_weight_shift(mut self, weight_shift: f64) -> Self {
        self.weight_shift = Some(weight_shift);
        self
    }

    pub fn with_initial_predict_weight(mut self, weight: f64) -> Self {
        self.initial_predict_weight = weight;
        self
    }

    /// Check every option, reporting the first violation
    pub fn validate(&self) -> SafePredictResult<()> {
        let eps = self.target_error;
        if !(eps.is_finite() && eps > 0.0 && eps < 1.0) {
            return Err(SafePredictError::Configuration(format!(
                "target_error must be in (0, 1), got {eps}"
            )));
        }

        if let Some(eta) = self.learning_rate {
            if !(eta.is_finite() && eta > 0.0) {
                return Err(SafePredictError::Configuration(format!(
                    "learning_rate must be positive and finite, got {eta}"
                )));
            }
        }

        if let Some(alpha) = self.weight_shift {
            if !(alpha.is_finite() && (0.0..1.0).contains(&alpha)) {
                return Err(SafePredictError::Configuration(format!(
                    "weight_shift must be in [0, 1), got {alpha}"
                )));
            }
        }

        let w0 = self.initial_predict_weight;
        if !(w0.is_finite() && w0 > 0.0 && w0 < 1.0) {
            return Err(SafePredictError::Configuration(format!(
                "initial_predict_weight must be in (0, 1), got {w0}"
            )));
        }

        Ok(())
    }

    pub fn effective_learning_rate(&self) -> f64 {
        self.learning_rate.unwrap_or(DEFAULT_LEARNING_RATE)
    }

    pub fn effective_weight_shift(&self) -> f64 {
        self.weight_shift.unwrap_or(DEFAULT_WEIGHT_SHIFT)
    }
}

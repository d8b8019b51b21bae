//! SafePredict Controller
//!
//! Wraps a base estimator and decides, round by round, whether to surface its
//! prediction or abstain. The acceptance probability comes from
//! [`ControllerState`]; a coin flip from the injected RNG turns it into a
//! decision, and the revealed label feeds back into the state.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bound::ErrorBound;
use crate::config::SafePredictConfig;
use crate::decision::{Decision, DecisionRecord, PendingRound};
use crate::error::{SafePredictError, SafePredictResult};
use crate::estimator::{BaseEstimator, EstimatorFactory};
use crate::estimators::KNearestNeighbors;
use crate::state::ControllerState;

/// Online predict-or-abstain controller around a base estimator
///
/// Starts unseeded; [`SafePredict::seed`] is the only way in. Every decision
/// takes `&mut self`, so rounds on one instance are strictly ordered. Run one
/// controller per stream.
///
/// The accept/abstain draw is made once per round. Querying the same round
/// again reuses it, so a round cannot be re-rolled until it predicts.
pub struct SafePredict<E, R = StdRng> {
    config: SafePredictConfig,
    learning_rate: f64,
    weight_shift: f64,
    estimator: E,
    rng: R,
    state: Option<ControllerState>,
    /// Round and uniform draw of the outstanding query
    pending_draw: Option<(u64, f64)>,
}

impl SafePredict<KNearestNeighbors<i64>> {
    /// Controller around the default k-nearest-neighbours classifier
    pub fn new(config: SafePredictConfig) -> SafePredictResult<Self> {
        Self::with_estimator(config, KNearestNeighbors::default())
    }
}

impl<E: BaseEstimator> SafePredict<E> {
    /// Controller around `estimator`, with coin flips seeded from the config
    pub fn with_estimator(config: SafePredictConfig, estimator: E) -> SafePredictResult<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, estimator, rng)
    }

    /// Controller around a freshly built estimator
    pub fn with_factory<F>(config: SafePredictConfig, factory: F) -> SafePredictResult<Self>
    where
        F: EstimatorFactory<E>,
    {
        config.validate()?;
        let estimator = factory.build().map_err(|e| {
            SafePredictError::Configuration(format!("estimator factory failed: {e}"))
        })?;
        Self::with_estimator(config, estimator)
    }
}

impl<E: BaseEstimator, R: Rng> SafePredict<E, R> {
    /// Controller with an explicit random source for the accept/abstain draws
    pub fn with_rng(config: SafePredictConfig, estimator: E, rng: R) -> SafePredictResult<Self> {
        config.validate()?;
        let learning_rate = config.effective_learning_rate();
        let weight_shift = config.effective_weight_shift();

        tracing::debug!(
            "SafePredict configured: target_error={}, eta={:.4}, alpha={:.5}, w0={}",
            config.target_error,
            learning_rate,
            weight_shift,
            config.initial_predict_weight
        );

        Ok(Self {
            config,
            learning_rate,
            weight_shift,
            estimator,
            rng,
            state: None,
            pending_draw: None,
        })
    }

    /// Fit the base estimator on a batch and reset the round statistics
    pub fn seed(&mut self, features: &[Vec<f64>], labels: &[E::Label]) -> SafePredictResult<()> {
        if features.is_empty() {
            return Err(SafePredictError::InvalidInput(
                "seed batch is empty".to_string(),
            ));
        }
        if features.len() != labels.len() {
            return Err(SafePredictError::InvalidInput(format!(
                "seed batch has {} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }

        self.estimator.fit(features, labels).map_err(|e| {
            tracing::warn!("Base estimator failed to fit seed batch: {e}");
            SafePredictError::from(e)
        })?;

        self.state = Some(ControllerState::seeded(
            self.config.initial_predict_weight,
            features.len() as u64,
        ));
        self.pending_draw = None;
        tracing::info!(
            "SafePredict seeded on {} points (target_error={})",
            features.len(),
            self.config.target_error
        );
        Ok(())
    }

    /// Refit the base estimator without touching the round statistics
    pub fn refit(&mut self, features: &[Vec<f64>], labels: &[E::Label]) -> SafePredictResult<()> {
        self.current_state()?;
        self.estimator.fit(features, labels)?;
        tracing::debug!("Base estimator refit on {} points", features.len());
        Ok(())
    }

    /// Decide the current round without knowing its label yet
    ///
    /// Estimator failures leave the state and the random source untouched.
    /// Repeated queries before [`SafePredict::resolve`] reuse the round's draw
    /// and so return the same decision.
    pub fn query(&mut self, features: &[f64]) -> SafePredictResult<PendingRound<E::Label>> {
        let state = *self.current_state()?;

        let (raw_prediction, confidence) =
            self.estimator.predict_with_confidence(features).map_err(|e| {
                tracing::warn!("Base estimator failed on round {}: {e}", state.round);
                SafePredictError::from(e)
            })?;

        let prediction_probability = state.predict_weight;
        let draw = match self.pending_draw {
            Some((round, draw)) if round == state.round => draw,
            _ => {
                let draw: f64 = self.rng.gen();
                self.pending_draw = Some((state.round, draw));
                draw
            }
        };
        let abstained = draw >= prediction_probability;

        Ok(PendingRound {
            round: state.round,
            raw_prediction,
            confidence,
            prediction_probability,
            abstained,
        })
    }

    /// Apply the revealed label for a pending round and advance the state
    pub fn resolve(
        &mut self,
        pending: PendingRound<E::Label>,
        y_true: &E::Label,
    ) -> SafePredictResult<DecisionRecord<E::Label>> {
        let (target_error, learning_rate, weight_shift) =
            (self.config.target_error, self.learning_rate, self.weight_shift);
        let state = self.state.as_mut().ok_or(SafePredictError::NotSeeded)?;
        if pending.round != state.round {
            return Err(SafePredictError::RoundMismatch {
                expected: state.round,
                got: pending.round,
            });
        }

        let base_correct = pending.raw_prediction == *y_true;
        state.apply_round(
            !pending.abstained,
            base_correct,
            target_error,
            learning_rate,
            weight_shift,
        );
        self.pending_draw = None;

        tracing::debug!(
            "Round {}: p={:.4} {} base_correct={} next_p={:.4}",
            pending.round,
            pending.prediction_probability,
            if pending.abstained { "ABSTAIN" } else { "PREDICT" },
            base_correct,
            state.predict_weight
        );

        Ok(DecisionRecord {
            round: pending.round,
            raw_prediction: pending.raw_prediction,
            confidence: pending.confidence,
            prediction_probability: pending.prediction_probability,
            abstained: pending.abstained,
            correct: (!pending.abstained).then_some(base_correct),
            base_correct,
        })
    }

    /// Decide one round and update on its label, returning the full record
    pub fn decide_recorded(
        &mut self,
        features: &[f64],
        y_true: &E::Label,
    ) -> SafePredictResult<DecisionRecord<E::Label>> {
        let pending = self.query(features)?;
        self.resolve(pending, y_true)
    }

    /// Decide one round and update on its label
    pub fn decide(&mut self, features: &[f64], y_true: &E::Label) -> SafePredictResult<Decision<E::Label>> {
        Ok(self.decide_recorded(features, y_true)?.decision())
    }

    /// Decide a sequence of rounds in order, stopping at the first failure
    pub fn decide_batch(
        &mut self,
        rounds: &[(Vec<f64>, E::Label)],
    ) -> SafePredictResult<Vec<Decision<E::Label>>> {
        rounds
            .iter()
            .map(|(features, label)| self.decide(features, label))
            .collect()
    }

    pub fn is_seeded(&self) -> bool {
        self.state.is_some()
    }

    /// Acceptance probability for the next round
    pub fn prediction_probability(&self) -> SafePredictResult<f64> {
        Ok(self.current_state()?.predict_weight)
    }

    pub fn state(&self) -> Option<&ControllerState> {
        self.state.as_ref()
    }

    /// Copy of the state for checkpointing
    pub fn snapshot(&self) -> SafePredictResult<ControllerState> {
        self.current_state().copied()
    }

    /// Resume from a checkpoint; the estimator is left as it is
    pub fn restore(&mut self, state: ControllerState) -> SafePredictResult<()> {
        state.validate()?;
        self.state = Some(state);
        self.pending_draw = None;
        tracing::info!(
            "SafePredict restored at round {} (p={:.4})",
            state.round,
            state.predict_weight
        );
        Ok(())
    }

    pub fn error_bound(&self) -> SafePredictResult<ErrorBound> {
        Ok(ErrorBound::from_state(self.current_state()?, &self.config))
    }

    pub fn config(&self) -> &SafePredictConfig {
        &self.config
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn weight_shift(&self) -> f64 {
        self.weight_shift
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    pub fn estimator_mut(&mut self) -> &mut E {
        &mut self.estimator
    }

    fn current_state(&self) -> SafePredictResult<&ControllerState> {
        self.state.as_ref().ok_or(SafePredictError::NotSeeded)
    }
}

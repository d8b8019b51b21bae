//! Per-round decisions and the records they leave behind.

use serde::{Deserialize, Serialize};

/// Outcome of one round: the base estimator's label, or an explicit abstention
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision<L> {
    Predict(L),
    Abstain,
}

impl<L> Decision<L> {
    pub fn is_abstain(&self) -> bool {
        matches!(self, Decision::Abstain)
    }

    pub fn label(&self) -> Option<&L> {
        match self {
            Decision::Predict(label) => Some(label),
            Decision::Abstain => None,
        }
    }

    pub fn into_option(self) -> Option<L> {
        match self {
            Decision::Predict(label) => Some(label),
            Decision::Abstain => None,
        }
    }

    /// Flatten to a label, mapping abstention to `sentinel` (e.g. `-1`).
    ///
    /// Only use this when the sentinel is outside the label space; the enum
    /// itself never confuses the two.
    pub fn label_or(self, sentinel: L) -> L {
        self.into_option().unwrap_or(sentinel)
    }
}

/// Everything known about a round once its label has been revealed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord<L> {
    /// Zero-based round index since seeding
    pub round: u64,
    /// What the base estimator predicted, surfaced or not
    pub raw_prediction: L,
    /// Base estimator's probability for its own prediction, if it reports one
    pub confidence: Option<f64>,
    /// Acceptance probability used for the coin flip
    pub prediction_probability: f64,
    pub abstained: bool,
    /// Correctness of the emitted prediction; `None` when abstained
    pub correct: Option<bool>,
    /// Whether the base estimator was right, regardless of abstention
    pub base_correct: bool,
}

impl<L: Clone> DecisionRecord<L> {
    pub fn decision(&self) -> Decision<L> {
        if self.abstained {
            Decision::Abstain
        } else {
            Decision::Predict(self.raw_prediction.clone())
        }
    }
}

/// A decided round waiting for its true label
///
/// Only [`crate::SafePredict::query`] produces these.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingRound<L> {
    pub(crate) round: u64,
    pub(crate) raw_prediction: L,
    pub(crate) confidence: Option<f64>,
    pub(crate) prediction_probability: f64,
    pub(crate) abstained: bool,
}

impl<L: Clone> PendingRound<L> {
    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn prediction_probability(&self) -> f64 {
        self.prediction_probability
    }

    /// The decision to surface now, before the label is known
    pub fn decision(&self) -> Decision<L> {
        if self.abstained {
            Decision::Abstain
        } else {
            Decision::Predict(self.raw_prediction.clone())
        }
    }
}

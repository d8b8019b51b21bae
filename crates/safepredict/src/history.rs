//! Decision History Module
//!
//! Caller-side tracker for decision records. Keeps running totals over the
//! whole stream and a rolling window for error-rate and prediction-rate
//! curves over time. The controller never needs this to operate.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::decision::DecisionRecord;
use crate::error::{SafePredictError, SafePredictResult};

/// Rates over a run of rounds
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WindowStats {
    pub rounds: usize,
    pub predictions: usize,
    pub errors: usize,
    pub base_errors: usize,
}

impl WindowStats {
    /// Fraction of rounds where the prediction was emitted
    pub fn prediction_rate(&self) -> f64 {
        if self.rounds == 0 {
            0.0
        } else {
            self.predictions as f64 / self.rounds as f64
        }
    }

    /// Errors among emitted predictions
    pub fn error_rate(&self) -> f64 {
        if self.predictions == 0 {
            0.0
        } else {
            self.errors as f64 / self.predictions as f64
        }
    }

    /// Error rate the base estimator would have had without abstention
    pub fn base_error_rate(&self) -> f64 {
        if self.rounds == 0 {
            0.0
        } else {
            self.base_errors as f64 / self.rounds as f64
        }
    }

    /// Count one more round; usable on its own as a cumulative-only tracker
    pub fn record<L>(&mut self, record: &DecisionRecord<L>) {
        self.rounds += 1;
        if !record.abstained {
            self.predictions += 1;
        }
        if record.correct == Some(false) {
            self.errors += 1;
        }
        if !record.base_correct {
            self.base_errors += 1;
        }
    }

    fn remove<L>(&mut self, record: &DecisionRecord<L>) {
        self.rounds -= 1;
        if !record.abstained {
            self.predictions -= 1;
        }
        if record.correct == Some(false) {
            self.errors -= 1;
        }
        if !record.base_correct {
            self.base_errors -= 1;
        }
    }
}

pub struct DecisionHistory<L> {
    window_size: usize,
    window: VecDeque<DecisionRecord<L>>,
    window_stats: WindowStats,
    cumulative: WindowStats,
}

impl<L: Clone> DecisionHistory<L> {
    pub fn new(window_size: usize) -> SafePredictResult<Self> {
        if window_size == 0 {
            return Err(SafePredictError::InvalidInput(
                "history window must hold at least one round".to_string(),
            ));
        }
        Ok(Self {
            window_size,
            window: VecDeque::with_capacity(window_size),
            window_stats: WindowStats::default(),
            cumulative: WindowStats::default(),
        })
    }

    pub fn record(&mut self, record: &DecisionRecord<L>) {
        if self.window.len() == self.window_size {
            if let Some(evicted) = self.window.pop_front() {
                self.window_stats.remove(&evicted);
            }
        }
        self.window_stats.record(record);
        self.cumulative.record(record);
        self.window.push_back(record.clone());
    }

    pub fn window_stats(&self) -> WindowStats {
        self.window_stats
    }

    pub fn cumulative(&self) -> WindowStats {
        self.cumulative
    }

    /// Records currently inside the window, oldest first
    pub fn recent(&self) -> impl Iterator<Item = &DecisionRecord<L>> {
        self.window.iter()
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }
}

//! SafePredict
//!
//! Online predict-or-abstain controller around an arbitrary base classifier.
//! Each round it either surfaces the classifier's label or abstains, keeping
//! the error rate among surfaced predictions near a target even when the
//! stream shifts under the classifier.

pub mod bound;
pub mod config;
pub mod controller;
pub mod decision;
pub mod error;
pub mod estimator;
pub mod estimators;
pub mod history;
pub mod state;


pub use bound::ErrorBound;
pub use config::SafePredictConfig;
pub use controller::SafePredict;
pub use decision::{Decision, DecisionRecord, PendingRound};
pub use error::{EstimatorError, SafePredictError, SafePredictResult};
pub use estimator::{BaseEstimator, EstimatorFactory};
pub use estimators::{ConstantEstimator, KNearestNeighbors};
pub use history::{DecisionHistory, WindowStats};
pub use state::ControllerState;

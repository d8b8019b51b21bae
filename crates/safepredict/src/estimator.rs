use std::fmt::Debug;

use crate::error::EstimatorError;

/// Trait for classifiers wrapped by the controller
///
/// Re-fitting replaces previously learned parameters entirely.
pub trait BaseEstimator {
    type Label: Clone + PartialEq + Debug;

    fn fit(&mut self, features: &[Vec<f64>], labels: &[Self::Label]) -> Result<(), EstimatorError>;

    fn predict(&self, features: &[f64]) -> Result<Self::Label, EstimatorError>;

    /// Probability per label, if the estimator can produce one
    fn predict_proba(
        &self,
        _features: &[f64],
    ) -> Result<Option<Vec<(Self::Label, f64)>>, EstimatorError> {
        Ok(None)
    }

    /// Predicted label plus its probability, if the estimator reports one.
    ///
    /// The controller calls this once per round. Override it when the label
    /// and its probability come out of the same computation.
    fn predict_with_confidence(
        &self,
        features: &[f64],
    ) -> Result<(Self::Label, Option<f64>), EstimatorError> {
        let label = self.predict(features)?;
        let confidence = self.predict_proba(features)?.and_then(|proba| {
            proba
                .into_iter()
                .find(|(candidate, _)| *candidate == label)
                .map(|(_, p)| p)
        });
        Ok((label, confidence))
    }
}

/// Produces a fresh estimator for a controller
pub trait EstimatorFactory<E: BaseEstimator> {
    fn build(self) -> Result<E, EstimatorError>;
}

impl<E, F> EstimatorFactory<E> for F
where
    E: BaseEstimator,
    F: FnOnce() -> Result<E, EstimatorError>,
{
    fn build(self) -> Result<E, EstimatorError> {
        self()
    }
}

impl<E: BaseEstimator + ?Sized> BaseEstimator for Box<E> {
    type Label = E::Label;

    fn fit(&mut self, features: &[Vec<f64>], labels: &[Self::Label]) -> Result<(), EstimatorError> {
        (**self).fit(features, labels)
    }

    fn predict(&self, features: &[f64]) -> Result<Self::Label, EstimatorError> {
        (**self).predict(features)
    }

    fn predict_proba(
        &self,
        features: &[f64],
    ) -> Result<Option<Vec<(Self::Label, f64)>>, EstimatorError> {
        (**self).predict_proba(features)
    }

    fn predict_with_confidence(
        &self,
        features: &[f64],
    ) -> Result<(Self::Label, Option<f64>), EstimatorError> {
        (**self).predict_with_confidence(features)
    }
}

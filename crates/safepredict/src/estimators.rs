//! Bundled Base Estimators
//!
//! A k-nearest-neighbours classifier used as the default wrapped model, and a
//! constant oracle that is handy for stubbing streams.

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::error::EstimatorError;
use crate::estimator::BaseEstimator;

pub const DEFAULT_NEIGHBORS: usize = 5;

/// k-nearest-neighbours classifier with Euclidean distance and majority vote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNearestNeighbors<L = i64> {
    k: usize,
    features: Vec<Vec<f64>>,
    labels: Vec<L>,
}

impl<L> Default for KNearestNeighbors<L> {
    fn default() -> Self {
        Self {
            k: DEFAULT_NEIGHBORS,
            features: Vec::new(),
            labels: Vec::new(),
        }
    }
}

impl<L> KNearestNeighbors<L> {
    /// Unfitted classifier voting over `k` neighbours; `k` must be positive
    pub fn new(k: usize) -> Result<Self, EstimatorError> {
        if k == 0 {
            return Err(EstimatorError::InvalidParameter(
                "k-nearest-neighbours needs k >= 1".to_string(),
            ));
        }
        Ok(Self {
            k,
            features: Vec::new(),
            labels: Vec::new(),
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn is_fitted(&self) -> bool {
        !self.features.is_empty()
    }

    fn dimension(&self) -> usize {
        self.features.first().map(|f| f.len()).unwrap_or(0)
    }

    /// Training indices of the nearest neighbours, closest first
    fn neighbors(&self, query: &[f64]) -> Result<Vec<usize>, EstimatorError> {
        if !self.is_fitted() {
            return Err(EstimatorError::NotFitted);
        }
        let dim = self.dimension();
        if query.len() != dim {
            return Err(EstimatorError::DimensionMismatch {
                expected: dim,
                got: query.len(),
            });
        }

        let mut distances: Vec<(usize, f64)> = self
            .features
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let d2: f64 = row
                    .iter()
                    .zip(query)
                    .map(|(a, b)| (a - b).powi(2))
                    .sum();
                // NaN rows rank last
                (i, if d2.is_nan() { f64::INFINITY } else { d2 })
            })
            .collect();
        distances.sort_by(|a, b| a.1.total_cmp(&b.1));

        Ok(distances
            .into_iter()
            .take(self.k)
            .map(|(i, _)| i)
            .collect())
    }
}

impl<L: Clone + Ord + Debug> KNearestNeighbors<L> {
    /// Vote count per label plus the rank of its closest neighbour
    fn votes(&self, query: &[f64]) -> Result<BTreeMap<L, (usize, usize)>, EstimatorError> {
        let mut votes: BTreeMap<L, (usize, usize)> = BTreeMap::new();
        for (rank, idx) in self.neighbors(query)?.into_iter().enumerate() {
            let entry = votes.entry(self.labels[idx].clone()).or_insert((0, rank));
            entry.0 += 1;
        }
        Ok(votes)
    }

    /// Most votes wins; ties go to the label with the nearer neighbour
    fn winner(votes: &BTreeMap<L, (usize, usize)>) -> Result<L, EstimatorError> {
        votes
            .iter()
            .max_by(|(_, (ca, ra)), (_, (cb, rb))| ca.cmp(cb).then(rb.cmp(ra)))
            .map(|(label, _)| label.clone())
            .ok_or(EstimatorError::NotFitted)
    }

    fn shares(votes: BTreeMap<L, (usize, usize)>) -> Option<Vec<(L, f64)>> {
        let total: usize = votes.values().map(|(count, _)| count).sum();
        if total == 0 {
            return None;
        }
        Some(
            votes
                .into_iter()
                .map(|(label, (count, _))| (label, count as f64 / total as f64))
                .collect(),
        )
    }
}

impl<L: Clone + Ord + Debug> BaseEstimator for KNearestNeighbors<L> {
    type Label = L;

    fn fit(&mut self, features: &[Vec<f64>], labels: &[L]) -> Result<(), EstimatorError> {
        if features.is_empty() {
            return Err(EstimatorError::InvalidTrainingData(
                "training batch is empty".to_string(),
            ));
        }
        if features.len() != labels.len() {
            return Err(EstimatorError::InvalidTrainingData(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        let dim = features[0].len();
        if let Some(row) = features.iter().find(|row| row.len() != dim) {
            return Err(EstimatorError::DimensionMismatch {
                expected: dim,
                got: row.len(),
            });
        }

        self.features = features.to_vec();
        self.labels = labels.to_vec();
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> Result<L, EstimatorError> {
        Self::winner(&self.votes(features)?)
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Option<Vec<(L, f64)>>, EstimatorError> {
        Ok(Self::shares(self.votes(features)?))
    }

    fn predict_with_confidence(&self, features: &[f64]) -> Result<(L, Option<f64>), EstimatorError> {
        let votes = self.votes(features)?;
        let label = Self::winner(&votes)?;
        let total: usize = votes.values().map(|(count, _)| count).sum();
        let confidence = votes
            .get(&label)
            .map(|(count, _)| *count as f64 / total as f64);
        Ok((label, confidence))
    }
}

/// Oracle that always answers with the same label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantEstimator<L> {
    label: L,
}

impl<L> ConstantEstimator<L> {
    pub fn new(label: L) -> Self {
        Self { label }
    }
}

impl<L: Clone + PartialEq + Debug> BaseEstimator for ConstantEstimator<L> {
    type Label = L;

    fn fit(&mut self, _features: &[Vec<f64>], _labels: &[L]) -> Result<(), EstimatorError> {
        Ok(())
    }

    fn predict(&self, _features: &[f64]) -> Result<L, EstimatorError> {
        Ok(self.label.clone())
    }

    fn predict_proba(&self, _features: &[f64]) -> Result<Option<Vec<(L, f64)>>, EstimatorError> {
        Ok(Some(vec![(self.label.clone(), 1.0)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_clusters() -> (Vec<Vec<f64>>, Vec<i64>) {
        let features = vec![
            vec![0.0, 0.0],
            vec![0.1, 0.2],
            vec![0.2, 0.1],
            vec![5.0, 5.0],
            vec![5.1, 4.9],
            vec![4.8, 5.2],
        ];
        let labels = vec![0, 0, 0, 1, 1, 1];
        (features, labels)
    }

    #[test]
    fn test_knn_predicts_cluster_label() {
        let (x, y) = two_clusters();
        let mut knn = KNearestNeighbors::new(3).unwrap();
        knn.fit(&x, &y).unwrap();

        assert_eq!(knn.predict(&[0.05, 0.05]).unwrap(), 0);
        assert_eq!(knn.predict(&[5.0, 5.1]).unwrap(), 1);
    }

    #[test]
    fn test_knn_tie_goes_to_nearest() {
        let mut knn = KNearestNeighbors::new(2).unwrap();
        knn.fit(&[vec![0.0], vec![1.0]], &[7, 9]).unwrap();

        // One vote each, label 9 is closer
        assert_eq!(knn.predict(&[0.9]).unwrap(), 9);
        assert_eq!(knn.predict(&[0.1]).unwrap(), 7);
    }

    #[test]
    fn test_knn_predict_proba_vote_shares() {
        let (x, y) = two_clusters();
        let mut knn = KNearestNeighbors::new(4).unwrap();
        knn.fit(&x, &y).unwrap();

        let proba = knn.predict_proba(&[0.0, 0.1]).unwrap().unwrap();
        assert_eq!(proba, vec![(0, 0.75), (1, 0.25)]);
        let total: f64 = proba.iter().map(|(_, p)| p).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_knn_errors() {
        let knn: KNearestNeighbors<i64> = KNearestNeighbors::default();
        assert_eq!(knn.predict(&[0.0]), Err(EstimatorError::NotFitted));

        let (x, y) = two_clusters();
        let mut knn = KNearestNeighbors::new(3).unwrap();
        assert!(matches!(
            knn.fit(&x, &y[..2]),
            Err(EstimatorError::InvalidTrainingData(_))
        ));
        assert!(matches!(
            knn.fit(&[], &[]),
            Err(EstimatorError::InvalidTrainingData(_))
        ));
        assert!(matches!(
            knn.fit(&[vec![0.0, 1.0], vec![1.0]], &[0, 1]),
            Err(EstimatorError::DimensionMismatch { expected: 2, got: 1 })
        ));

        knn.fit(&x, &y).unwrap();
        assert_eq!(
            knn.predict(&[1.0, 2.0, 3.0]),
            Err(EstimatorError::DimensionMismatch { expected: 2, got: 3 })
        );
    }

    #[test]
    fn test_knn_refit_replaces_training_set() {
        let mut knn = KNearestNeighbors::new(1).unwrap();
        knn.fit(&[vec![0.0]], &[1]).unwrap();
        assert_eq!(knn.predict(&[0.0]).unwrap(), 1);

        knn.fit(&[vec![0.0]], &[2]).unwrap();
        assert_eq!(knn.predict(&[0.0]).unwrap(), 2);
    }

    #[test]
    fn test_k_larger_than_training_set() {
        let mut knn = KNearestNeighbors::new(50).unwrap();
        knn.fit(&[vec![0.0], vec![1.0], vec![2.0]], &[1, 1, 0]).unwrap();
        assert_eq!(knn.predict(&[2.0]).unwrap(), 1);
    }

    #[test]
    fn test_knn_rejects_zero_neighbors() {
        assert!(matches!(
            KNearestNeighbors::<i64>::new(0),
            Err(EstimatorError::InvalidParameter(_))
        ));
        assert_eq!(KNearestNeighbors::<i64>::default().k(), DEFAULT_NEIGHBORS);
    }

    #[test]
    fn test_knn_confidence_matches_vote_share() {
        let (x, y) = two_clusters();
        let mut knn = KNearestNeighbors::new(4).unwrap();
        knn.fit(&x, &y).unwrap();

        assert_eq!(knn.predict_with_confidence(&[0.0, 0.1]).unwrap(), (0, Some(0.75)));
        assert_eq!(knn.predict_with_confidence(&[5.0, 5.0]).unwrap(), (1, Some(0.75)));
    }

    #[test]
    fn test_knn_nan_distances_sort_stably() {
        let mut knn = KNearestNeighbors::new(1).unwrap();
        knn.fit(&[vec![f64::NAN], vec![1.0], vec![3.0]], &[9, 1, 3]).unwrap();

        // The NaN row ranks last, so the nearest finite point wins
        assert_eq!(knn.predict(&[1.2]).unwrap(), 1);
        assert_eq!(knn.predict(&[2.9]).unwrap(), 3);
    }

    #[test]
    fn test_constant_estimator() {
        let mut stub = ConstantEstimator::new(-1i64);
        stub.fit(&[], &[]).unwrap();
        assert_eq!(stub.predict(&[1.0, 2.0]).unwrap(), -1);
        assert_eq!(stub.predict_proba(&[]).unwrap(), Some(vec![(-1, 1.0)]));
    }
}

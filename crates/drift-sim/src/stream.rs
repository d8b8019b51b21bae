//! Synthetic labeled streams with a single change point.

use anyhow::{Context, Result};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::Normal;

use crate::config::{Scenario, SimConfig};

/// Distance of each cluster centre from the origin along both axes
const CLUSTER_OFFSET: f64 = 1.5;

#[derive(Debug, Clone, PartialEq)]
pub struct StreamPoint {
    pub features: Vec<f64>,
    pub label: i64,
}

/// Seeding batch plus the rounds replayed through the controller
#[derive(Debug, Clone)]
pub struct Stream {
    pub seed_batch: Vec<StreamPoint>,
    pub rounds: Vec<StreamPoint>,
}

impl Stream {
    pub fn generate(config: &SimConfig) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let noise = Normal::new(0.0, 1.0).context("invalid feature noise distribution")?;

        let mut point = |shifted: bool| -> StreamPoint {
            match config.scenario {
                Scenario::LabelFlip => {
                    let cluster: i64 = rng.gen_range(0..=1);
                    let centre = if cluster == 1 { CLUSTER_OFFSET } else { -CLUSTER_OFFSET };
                    let features = vec![
                        centre + noise.sample(&mut rng),
                        centre + noise.sample(&mut rng),
                    ];
                    let label = if shifted { 1 - cluster } else { cluster };
                    StreamPoint { features, label }
                }
                Scenario::ConstantShift => StreamPoint {
                    features: vec![noise.sample(&mut rng)],
                    label: if shifted { 0 } else { 1 },
                },
            }
        };

        let seed_batch = (0..config.seed_size).map(|_| point(false)).collect();
        let rounds = (0..config.rounds).map(|t| point(t >= config.shift_at)).collect();

        Ok(Self { seed_batch, rounds })
    }

    pub fn seed_features(&self) -> Vec<Vec<f64>> {
        self.seed_batch.iter().map(|p| p.features.clone()).collect()
    }

    pub fn seed_labels(&self) -> Vec<i64> {
        self.seed_batch.iter().map(|p| p.label).collect()
    }
}

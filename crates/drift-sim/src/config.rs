use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Which synthetic stream to replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Two Gaussian clusters whose labels swap at the shift point; k-NN base model
    LabelFlip,
    /// Base model always answers 1; labels are 1 before the shift and 0 after
    ConstantShift,
}

impl FromStr for Scenario {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "label-flip" | "knn" => Ok(Scenario::LabelFlip),
            "constant-shift" | "constant" => Ok(Scenario::ConstantShift),
            other => bail!("unknown scenario '{other}' (expected label-flip or constant-shift)"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    // Controller targets, one independent stream each
    pub targets: Vec<f64>,

    // Stream shape
    pub scenario: Scenario,
    pub rounds: usize,
    pub shift_at: usize,
    pub seed_size: usize,

    // Controller tuning
    pub learning_rate: Option<f64>,
    pub weight_shift: Option<f64>,
    pub neighbors: usize,

    // Reporting
    pub window: usize,
    pub seed: u64,
}

impl SimConfig {
    pub fn from_env() -> Result<Self> {
        let rounds: usize = env::var("SIM_ROUNDS")
            .unwrap_or_else(|_| "1000".to_string())
            .parse()
            .context("SIM_ROUNDS must be a positive integer")?;

        let config = Self {
            targets: env::var("SIM_TARGETS")
                .unwrap_or_else(|_| "0.05,0.1".to_string())
                .split(',')
                .map(|s| s.trim().parse::<f64>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("SIM_TARGETS must be a comma-separated list of numbers")?,

            scenario: env::var("SIM_SCENARIO")
                .unwrap_or_else(|_| "label-flip".to_string())
                .parse()?,
            rounds,
            shift_at: env::var("SIM_SHIFT_AT")
                .unwrap_or_else(|_| (rounds / 2).to_string())
                .parse()
                .context("SIM_SHIFT_AT must be an integer")?,
            seed_size: env::var("SIM_SEED_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .context("SIM_SEED_SIZE must be an integer")?,

            learning_rate: env::var("SIM_LEARNING_RATE")
                .ok()
                .map(|v| v.parse::<f64>())
                .transpose()
                .context("SIM_LEARNING_RATE must be a number")?,
            weight_shift: env::var("SIM_WEIGHT_SHIFT")
                .ok()
                .map(|v| v.parse::<f64>())
                .transpose()
                .context("SIM_WEIGHT_SHIFT must be a number")?,
            neighbors: env::var("SIM_NEIGHBORS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("SIM_NEIGHBORS must be an integer")?,

            window: env::var("SIM_WINDOW")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .context("SIM_WINDOW must be an integer")?,
            seed: env::var("SIM_SEED")
                .unwrap_or_else(|_| "7".to_string())
                .parse()
                .context("SIM_SEED must be an integer")?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            bail!("SIM_TARGETS must name at least one target error rate");
        }
        if self.rounds == 0 {
            bail!("SIM_ROUNDS must be positive");
        }
        if self.shift_at > self.rounds {
            bail!(
                "SIM_SHIFT_AT ({}) is past the end of the stream ({} rounds)",
                self.shift_at,
                self.rounds
            );
        }
        if self.seed_size == 0 {
            bail!("SIM_SEED_SIZE must be positive");
        }
        if self.neighbors == 0 {
            bail!("SIM_NEIGHBORS must be positive");
        }
        if self.window == 0 {
            bail!("SIM_WINDOW must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SimConfig {
        SimConfig {
            targets: vec![0.05],
            scenario: Scenario::ConstantShift,
            rounds: 100,
            shift_at: 50,
            seed_size: 10,
            learning_rate: None,
            weight_shift: None,
            neighbors: 5,
            window: 10,
            seed: 1,
        }
    }

    #[test]
    fn test_scenario_parse() {
        assert_eq!("label-flip".parse::<Scenario>().unwrap(), Scenario::LabelFlip);
        assert_eq!("KNN".parse::<Scenario>().unwrap(), Scenario::LabelFlip);
        assert_eq!(" constant ".parse::<Scenario>().unwrap(), Scenario::ConstantShift);
        assert!("random-forest".parse::<Scenario>().is_err());
    }

    #[test]
    fn test_validate() {
        assert!(sample().validate().is_ok());

        let mut config = sample();
        config.targets.clear();
        assert!(config.validate().is_err());

        let mut config = sample();
        config.shift_at = 101;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.neighbors = 0;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.window = 0;
        assert!(config.validate().is_err());
    }
}

use anyhow::{Context, Result};
use rayon::prelude::*;
use safepredict::{
    BaseEstimator, ConstantEstimator, DecisionHistory, ErrorBound, EstimatorError,
    KNearestNeighbors, SafePredict, SafePredictConfig, WindowStats,
};
use serde::{Deserialize, Serialize};

use crate::config::{Scenario, SimConfig};
use crate::stream::Stream;

type BoxedEstimator = Box<dyn BaseEstimator<Label = i64> + Send>;

/// One sample of the rolling-window curves
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurvePoint {
    pub round: usize,
    pub prediction_probability: f64,
    pub window_prediction_rate: f64,
    pub window_error_rate: f64,
    pub cumulative_error_rate: f64,
}

/// Outcome of replaying the stream against one target error rate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub target_error: f64,
    pub scenario: Scenario,
    pub learning_rate: f64,
    pub weight_shift: f64,
    pub overall: WindowStats,
    pub before_shift: WindowStats,
    pub after_shift: WindowStats,
    pub bound: ErrorBound,
    pub curve: Vec<CurvePoint>,
}

fn build_estimator(config: &SimConfig) -> Result<BoxedEstimator, EstimatorError> {
    let estimator: BoxedEstimator = match config.scenario {
        Scenario::LabelFlip => Box::new(KNearestNeighbors::<i64>::new(config.neighbors)?),
        Scenario::ConstantShift => Box::new(ConstantEstimator::new(1i64)),
    };
    Ok(estimator)
}

/// Replay `stream` through a fresh controller targeting `target_error`
pub fn run_target(config: &SimConfig, stream: &Stream, target_error: f64) -> Result<RunReport> {
    let mut controller_config = SafePredictConfig::new(target_error).with_seed(config.seed);
    controller_config.learning_rate = config.learning_rate;
    controller_config.weight_shift = config.weight_shift;

    let mut controller = SafePredict::with_factory(controller_config, || build_estimator(config))
        .with_context(|| format!("invalid controller config for target {target_error}"))?;
    controller
        .seed(&stream.seed_features(), &stream.seed_labels())
        .context("failed to seed controller")?;

    let mut history = DecisionHistory::new(config.window)?;
    let mut before_shift = WindowStats::default();
    let mut after_shift = WindowStats::default();
    let mut curve = Vec::with_capacity(config.rounds / config.window + 1);

    for (t, point) in stream.rounds.iter().enumerate() {
        let record = controller
            .decide_recorded(&point.features, &point.label)
            .with_context(|| format!("round {t} failed"))?;

        history.record(&record);
        if t < config.shift_at {
            before_shift.record(&record);
        } else {
            after_shift.record(&record);
        }

        if (t + 1) % config.window == 0 {
            let window = history.window_stats();
            curve.push(CurvePoint {
                round: t + 1,
                prediction_probability: controller.prediction_probability()?,
                window_prediction_rate: window.prediction_rate(),
                window_error_rate: window.error_rate(),
                cumulative_error_rate: history.cumulative().error_rate(),
            });
        }
    }

    let bound = controller.error_bound()?;
    tracing::info!(
        "target={:.3}: error_rate={:.4} prediction_rate={:.3} (base error {:.3}), bound limit {:.3}",
        target_error,
        bound.realized_error_rate,
        history.cumulative().prediction_rate(),
        history.cumulative().base_error_rate(),
        bound.limit()
    );

    Ok(RunReport {
        target_error,
        scenario: config.scenario,
        learning_rate: controller.learning_rate(),
        weight_shift: controller.weight_shift(),
        overall: history.cumulative(),
        before_shift,
        after_shift,
        bound,
        curve,
    })
}

/// Run every configured target on its own controller, in parallel
pub fn run_all(config: &SimConfig) -> Result<Vec<RunReport>> {
    let stream = Stream::generate(config)?;
    tracing::info!(
        "Generated {:?} stream: {} seed points, {} rounds, shift at {}",
        config.scenario,
        stream.seed_batch.len(),
        stream.rounds.len(),
        config.shift_at
    );

    config
        .targets
        .par_iter()
        .map(|&target| run_target(config, &stream, target))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(scenario: Scenario) -> SimConfig {
        SimConfig {
            targets: vec![0.05, 0.1, 0.2],
            scenario,
            rounds: 1000,
            shift_at: 500,
            seed_size: 100,
            learning_rate: None,
            weight_shift: None,
            neighbors: 5,
            window: 50,
            seed: 7,
        }
    }

    #[test]
    fn test_constant_shift_run() {
        let reports = run_all(&config(Scenario::ConstantShift)).unwrap();
        assert_eq!(reports.len(), 3);

        let strict = &reports[0];
        assert_eq!(strict.target_error, 0.05);
        assert_eq!(strict.overall.rounds, 1000);
        assert_eq!(strict.curve.len(), 20);
        assert!(strict.bound.realized_error_rate < 0.07);
        assert!(strict.after_shift.prediction_rate() < 0.1);
        assert!(strict.before_shift.prediction_rate() > 0.9);
        assert_eq!(strict.after_shift.base_error_rate(), 1.0);
    }

    #[test]
    fn test_label_flip_run_beats_base_model() {
        let reports = run_all(&config(Scenario::LabelFlip)).unwrap();

        for report in &reports {
            assert!(report.bound.within_target());
            assert!(report.overall.error_rate() < report.target_error + 0.03);
            // Without abstention the k-NN model is wrong on most post-shift rounds
            assert!(report.after_shift.base_error_rate() > 0.8);
            assert!(report.overall.error_rate() < report.overall.base_error_rate());
        }
    }

    #[test]
    fn test_zero_neighbors_rejected() {
        let mut config = config(Scenario::LabelFlip);
        config.neighbors = 0;
        assert!(build_estimator(&config).is_err());
    }

    #[test]
    fn test_report_serializes() {
        let mut config = config(Scenario::ConstantShift);
        config.targets = vec![0.1];
        config.rounds = 100;
        config.shift_at = 50;
        let reports = run_all(&config).unwrap();

        let json = serde_json::to_value(&reports).unwrap();
        assert_eq!(json[0]["scenario"], "constant-shift");
        assert!(json[0]["curve"].as_array().is_some());
    }
}

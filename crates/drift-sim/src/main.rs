use anyhow::Result;

mod config;
mod runner;
mod stream;

use config::SimConfig;

fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    // 2. Load configuration
    let config = SimConfig::from_env()?;
    tracing::info!("Starting drift simulation");
    tracing::info!("  Scenario: {:?}", config.scenario);
    tracing::info!("  Targets: {:?}", config.targets);
    tracing::info!(
        "  Rounds: {} (shift at {}), seed batch {}",
        config.rounds,
        config.shift_at,
        config.seed_size
    );
    tracing::info!(
        "  Learning rate: {}, weight shift: {}, seed {}",
        config
            .learning_rate
            .map_or_else(|| "default".to_string(), |v| v.to_string()),
        config
            .weight_shift
            .map_or_else(|| "default".to_string(), |v| v.to_string()),
        config.seed
    );

    // 3. Replay the stream for every target
    let reports = runner::run_all(&config)?;

    for report in &reports {
        if !report.bound.within_target() {
            tracing::warn!(
                "target {:.3}: expected error {:.4} exceeds bound limit {:.4}",
                report.target_error,
                report.bound.expected_error_rate,
                report.bound.limit()
            );
        }
    }

    // 4. Reports go to stdout, logs to stderr
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

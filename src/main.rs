use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use resonance_engine::config::EngineConfig;
use resonance_engine::engine::Engine;
use resonance_engine::feed::{MarketFeed, SyntheticFeed};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = EngineConfig::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    info!("{}", "=".repeat(60));
    info!("Resonance engine starting up");
    info!("Symbol: {}", cfg.symbol);
    info!("Tick interval: {}s", cfg.tick_interval_secs);
    info!(
        "Learning: {}",
        if cfg.learning_enabled { "ON" } else { "OFF" }
    );
    info!("{}", "=".repeat(60));

    let tick_interval = std::time::Duration::from_secs(cfg.tick_interval_secs.max(1));
    let mut feed = SyntheticFeed::new(&cfg.symbol, 5_000.0, rand::random());
    let mut engine = Engine::new(cfg);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                engine.log_status();
                return Ok(());
            }
            bundle = feed.next_bundle() => {
                match bundle {
                    Ok(bundle) => {
                        engine.tick(&bundle);
                    }
                    Err(e) => error!("feed error: {e}"),
                }
                tokio::time::sleep(tick_interval).await;
            }
        }
    }
}

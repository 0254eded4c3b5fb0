use anyhow::Result;
use pv_string_sim::{config, controller, telemetry};
use config::Config;
use telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::load()?;

    init_tracing(cfg.telemetry.format, cfg.telemetry.filter.as_deref());

    if cfg.tables.is_empty() {
        warn!("no tables configured - nothing to simulate");
    }

    let app_state = controller::AppState::new(cfg.clone()).await?;

    info!(
        live_tick_ms = cfg.live.tick_millis,
        refresh_interval_s = cfg.refresh.interval_seconds,
        snapshot_dir = %cfg.refresh.snapshot_dir.display(),
        "starting PV string simulator"
    );

    controller::spawn_simulation_tasks(app_state);

    telemetry::shutdown_signal().await;

    warn!("shutdown complete");
    Ok(())
}

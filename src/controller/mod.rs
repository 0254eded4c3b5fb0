pub mod store;

use anyhow::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::simulation::{
    FaultSummary, LiveDriver, Phase, RefreshDriver, StringSimulator, TableSnapshot, TableTopology,
};
use crate::telemetry;

pub use store::{SnapshotStore, StoredSnapshot};

/// Shared state of the simulation daemon.
///
/// The engine is stateless per table; what is shared here is the RNG-owning
/// simulator and the per-table snapshots each driver keeps.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub topologies: Arc<Vec<TableTopology>>,
    pub simulator: Arc<Mutex<StringSimulator>>,
    pub live: Arc<RwLock<HashMap<String, LiveDriver>>>,
    pub store: SnapshotStore,
}

impl AppState {
    pub async fn new(cfg: Config) -> Result<Self> {
        let topologies = cfg.topologies()?;
        let store = SnapshotStore::new(cfg.refresh.snapshot_dir.clone());
        store.ensure_dir().await?;

        let live = topologies
            .iter()
            .map(|t| {
                (
                    t.table_id().to_string(),
                    LiveDriver::new(t.clone(), cfg.live.phases),
                )
            })
            .collect();

        info!(
            tables = topologies.len(),
            panels = topologies.iter().map(TableTopology::total_panels).sum::<usize>(),
            "simulation state initialized"
        );

        Ok(Self {
            simulator: Arc::new(Mutex::new(StringSimulator::new(cfg.engine.clone()))),
            topologies: Arc::new(topologies),
            live: Arc::new(RwLock::new(live)),
            store,
            cfg,
        })
    }

    /// Latest live snapshot of a table
    pub async fn live_snapshot(&self, table_id: &str) -> Option<TableSnapshot> {
        self.live
            .read()
            .await
            .get(table_id)
            .and_then(|d| d.snapshot().cloned())
    }

    /// Open faults across all live tables
    pub async fn live_faults(&self) -> Vec<FaultSummary> {
        self.live
            .read()
            .await
            .values()
            .filter_map(LiveDriver::snapshot)
            .flat_map(TableSnapshot::faults)
            .collect()
    }

    /// One live step for every table
    pub async fn live_step(&self) {
        let delta = self.cfg.live.tick();
        let mut drivers = self.live.write().await;
        let mut sim = self.simulator.lock();

        for (table_id, driver) in drivers.iter_mut() {
            let before = driver.phase();
            let had_fault = driver
                .snapshot()
                .is_some_and(|s| !s.faults().is_empty());

            let snapshot = driver.step(&mut sim, delta);

            if snapshot.phase != before {
                info!(
                    table = %table_id,
                    phase = %snapshot.phase,
                    elapsed_s = snapshot.elapsed_seconds,
                    power_w = snapshot.total_power_w(),
                    "live phase change"
                );
            }
            if !had_fault && snapshot.phase == Phase::FaultDetected {
                telemetry::report_faults("live", snapshot);
            }
        }
    }

    /// One refresh of every table's persisted snapshot.
    ///
    /// A table that fails to persist is logged and skipped; the others are
    /// still refreshed. Returns the number of tables persisted.
    pub async fn refresh_all(&self) -> usize {
        let driver = RefreshDriver::new(self.cfg.refresh.phases, self.cfg.refresh.interval());

        let mut persisted_tables = 0;
        for topology in self.topologies.iter() {
            match self.refresh_table(&driver, topology).await {
                Ok(()) => persisted_tables += 1,
                Err(e) => {
                    warn!(table = topology.table_id(), error = %e, "snapshot refresh failed")
                }
            }
        }
        persisted_tables
    }

    async fn refresh_table(&self, driver: &RefreshDriver, topology: &TableTopology) -> Result<()> {
        let persisted = self.store.load(topology.table_id()).await;
        let next = {
            let mut sim = self.simulator.lock();
            driver.refresh(&mut sim, topology, persisted.as_ref().map(|s| &s.snapshot))
        };
        telemetry::report_faults("refresh", &next);
        self.store.save(&next).await
    }
}

pub fn spawn_simulation_tasks(state: AppState) {
    let live = state.clone();
    tokio::spawn(async move {
        {
            let mut drivers = live.live.write().await;
            let mut sim = live.simulator.lock();
            for driver in drivers.values_mut() {
                driver.prime(&mut sim);
            }
        }
        let mut interval = tokio::time::interval(live.cfg.live.tick());
        loop {
            interval.tick().await;
            live.live_step().await;
        }
    });

    let refresh = state;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(refresh.cfg.refresh.interval());
        loop {
            interval.tick().await;
            let persisted = refresh.refresh_all().await;
            debug!(tables = persisted, "snapshot refresh done");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LiveConfig, RefreshConfig, TableConfig, TelemetryConfig};
    use crate::simulation::{FaultInjectorConfig, PhaseThresholds, StringSimulatorConfig};

    fn config(name: &str) -> Config {
        Config {
            engine: StringSimulatorConfig {
                injector: FaultInjectorConfig {
                    injection_probability: 1.0,
                    ..Default::default()
                },
                random_seed: Some(3),
                ..Default::default()
            },
            live: LiveConfig {
                tick_millis: 1000,
                phases: PhaseThresholds::default(),
            },
            refresh: RefreshConfig {
                interval_seconds: 15,
                phases: PhaseThresholds::new(30.0, 60.0, 300.0).unwrap(),
                snapshot_dir: std::env::temp_dir()
                    .join(format!("pv-string-sim-app-{name}-{}", std::process::id())),
            },
            telemetry: TelemetryConfig::default(),
            tables: vec![
                TableConfig {
                    id: "T1".into(),
                    top_row_panels: 10,
                    bottom_row_panels: 5,
                    nominal_voltage_v: 20.0,
                    nominal_current_a: 10.0,
                },
                TableConfig {
                    id: "T2".into(),
                    top_row_panels: 6,
                    bottom_row_panels: 6,
                    nominal_voltage_v: 36.0,
                    nominal_current_a: 9.5,
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_live_steps_reach_fault() {
        let state = AppState::new(config("live")).await.unwrap();
        for _ in 0..4 {
            state.live_step().await;
        }
        let snapshot = state.live_snapshot("T1").await.unwrap();
        assert_eq!(snapshot.elapsed_seconds, 4.0);
        assert_eq!(state.live_faults().await.len(), 4);

        tokio::fs::remove_dir_all(&state.cfg.refresh.snapshot_dir).await.ok();
    }

    #[tokio::test]
    async fn test_refresh_persists_and_advances() {
        let state = AppState::new(config("refresh")).await.unwrap();
        assert_eq!(state.refresh_all().await, 2);
        assert_eq!(state.refresh_all().await, 2);

        let stored = state.store.load("T1").await.unwrap();
        assert_eq!(stored.snapshot.elapsed_seconds, 30.0);
        assert_eq!(stored.snapshot.phase, Phase::FaultDetected);
        assert_eq!(stored.snapshot.faults().len(), 2);

        tokio::fs::remove_dir_all(&state.cfg.refresh.snapshot_dir).await.ok();
    }

    #[tokio::test]
    async fn test_refresh_continues_past_failed_table() {
        let state = AppState::new(config("partial")).await.unwrap();
        // a directory in place of T1's file makes the rename fail
        tokio::fs::create_dir_all(state.store.dir().join("T1.json"))
            .await
            .unwrap();

        assert_eq!(state.refresh_all().await, 1);
        assert!(state.store.load("T1").await.is_none());
        let stored = state.store.load("T2").await.unwrap();
        assert_eq!(stored.snapshot.elapsed_seconds, 15.0);

        tokio::fs::remove_dir_all(&state.cfg.refresh.snapshot_dir).await.ok();
    }
}

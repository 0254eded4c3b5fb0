use anyhow::{Context, Result};
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::{ElectricalRating, SimulationError};
use crate::simulation::{PhaseThresholds, StringSimulatorConfig, TableTopology};
use crate::telemetry::LogFormat;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub engine: StringSimulatorConfig,
    pub live: LiveConfig,
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// Fallback filter directive when `RUST_LOG` is unset
    pub filter: Option<String>,
}

/// Fast local driver
#[derive(Debug, Clone, Deserialize)]
pub struct LiveConfig {
    pub tick_millis: u64,
    pub phases: PhaseThresholds,
}
impl LiveConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis.max(1))
    }
}

/// Periodic refresh driver over persisted snapshots
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    pub interval_seconds: u64,
    pub phases: PhaseThresholds,
    pub snapshot_dir: PathBuf,
}
impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableConfig {
    pub id: String,
    pub top_row_panels: i64,
    pub bottom_row_panels: i64,
    pub nominal_voltage_v: f64,
    pub nominal_current_a: f64,
}
impl TableConfig {
    pub fn topology(&self) -> Result<TableTopology, SimulationError> {
        let rating = ElectricalRating::new(self.nominal_voltage_v, self.nominal_current_a)?;
        Ok(TableTopology::from_counts(
            self.id.clone(),
            self.top_row_panels,
            self.bottom_row_panels,
            rating,
        ))
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let cfg: Config = Self::figment()
            .extract()
            .context("failed to load configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("PVSIM__").split("__"))
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        self.engine.validate()?;
        self.live.phases.validate()?;
        self.refresh.phases.validate()?;

        let mut seen = std::collections::HashSet::new();
        for table in &self.tables {
            if table.id.trim().is_empty() {
                return Err(SimulationError::InvalidConfig("table id must not be empty".into()));
            }
            if !seen.insert(table.id.as_str()) {
                return Err(SimulationError::InvalidConfig(format!(
                    "duplicate table id: {}",
                    table.id
                )));
            }
            table.topology()?;
        }
        Ok(())
    }

    /// Topologies of all configured tables
    pub fn topologies(&self) -> Result<Vec<TableTopology>, SimulationError> {
        self.tables.iter().map(TableConfig::topology).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::PositionPolicy;
    use figment::Jail;

    const DEFAULT_TOML: &str = r#"
        [engine]
        injection_probability = 0.35
        electrical_fault_share = 0.5
        voltage_jitter_fraction = 0.03
        initial_health_min = 85.0

        [engine.position_policy]
        kind = "fixed_fraction"
        fraction = 0.7

        [live]
        tick_millis = 500
        [live.phases]
        fault_start_s = 3.0
        repair_start_s = 5.0
        cycle_complete_s = 15.0

        [refresh]
        interval_seconds = 15
        snapshot_dir = "data/snapshots"
        [refresh.phases]
        fault_start_s = 30.0
        repair_start_s = 60.0
        cycle_complete_s = 300.0

        [[tables]]
        id = "T1"
        top_row_panels = 20
        bottom_row_panels = 20
        nominal_voltage_v = 20.0
        nominal_current_a = 10.0
    "#;

    #[test]
    fn test_load_with_env_override() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file("config/default.toml", DEFAULT_TOML)?;
            jail.set_env("PVSIM__ENGINE__INJECTION_PROBABILITY", "0.9");
            jail.set_env("PVSIM__LIVE__TICK_MILLIS", "250");

            let cfg = Config::load().map_err(|e| e.to_string())?;
            assert_eq!(cfg.engine.injector.injection_probability, 0.9);
            assert_eq!(
                cfg.engine.injector.position_policy,
                PositionPolicy::FixedFraction { fraction: 0.7 }
            );
            assert_eq!(cfg.live.tick(), Duration::from_millis(250));
            assert_eq!(cfg.refresh.interval(), Duration::from_secs(15));
            assert_eq!(cfg.telemetry.format, LogFormat::Json);
            assert_eq!(cfg.topologies().map_err(|e| e.to_string())?.len(), 1);
            Ok(())
        });
    }

    #[test]
    fn test_rejects_unordered_thresholds() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file("config/default.toml", DEFAULT_TOML)?;
            jail.set_env("PVSIM__LIVE__PHASES__REPAIR_START_S", "20.0");

            assert!(Config::load().is_err());
            Ok(())
        });
    }

    #[test]
    fn test_rejects_duplicate_tables() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            let doubled = format!(
                "{DEFAULT_TOML}\n[[tables]]\nid = \"T1\"\ntop_row_panels = 4\nbottom_row_panels = 4\nnominal_voltage_v = 20.0\nnominal_current_a = 10.0\n"
            );
            jail.create_file("config/default.toml", &doubled)?;

            let err = Config::load().unwrap_err();
            assert!(err.to_string().contains("duplicate table id"));
            Ok(())
        });
    }
}

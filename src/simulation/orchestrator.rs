//! # String Simulation Orchestrator
//!
//! Composes the engine for one table per tick: carry the prior health forward,
//! progress open repairs, roll for new faults, compute readings, propagate the
//! series cascade and mirror repair fields onto followers.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    cascade, compute_reading, sample_voltage_jitter, FaultInjector, FaultInjectorConfig,
    PanelReading, Phase, PhaseThresholds, RepairRecord, RowSnapshot, SeriesString, TableSnapshot,
    TableTopology,
};
use crate::domain::{
    clamp_percent, PanelState, RepairStage, SimulationError, FULL_HEALTH, GOOD_HEALTH_LIMIT,
};

/// How the clock reaches a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockInput {
    /// Cycle-relative elapsed seconds from a free-running clock
    Elapsed(f64),
    /// One refresh interval (seconds) has passed since the prior snapshot
    Interval(f64),
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StringSimulatorConfig {
    #[serde(flatten)]
    pub injector: FaultInjectorConfig,
    /// Bound of the per-panel voltage jitter as a fraction of nominal
    pub voltage_jitter_fraction: f64,
    /// Lower bound of the health a fresh panel starts with
    pub initial_health_min: f64,
    /// Random seed for reproducibility (None = random)
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for StringSimulatorConfig {
    fn default() -> Self {
        Self {
            injector: FaultInjectorConfig::default(),
            voltage_jitter_fraction: 0.03,
            initial_health_min: 85.0,
            random_seed: None,
        }
    }
}

impl StringSimulatorConfig {
    pub fn validate(&self) -> Result<(), SimulationError> {
        self.injector.validate()?;
        if !(0.0..=0.05).contains(&self.voltage_jitter_fraction) {
            return Err(SimulationError::InvalidConfig(format!(
                "voltage_jitter_fraction must be within 0..=0.05, got {}",
                self.voltage_jitter_fraction
            )));
        }
        if !(GOOD_HEALTH_LIMIT..=FULL_HEALTH).contains(&self.initial_health_min) {
            return Err(SimulationError::InvalidConfig(format!(
                "initial_health_min must be within {GOOD_HEALTH_LIMIT}..={FULL_HEALTH}, got {}",
                self.initial_health_min
            )));
        }
        Ok(())
    }
}

/// Working state of one string during a tick
#[derive(Debug, Clone)]
struct RowWork {
    health: Vec<f64>,
    repair: Option<RepairRecord>,
    /// Originator of a repair that completed earlier in this cycle
    completed: Option<usize>,
    reinitialized: bool,
}

/// Repair fields mirrored onto the originator and its followers
#[derive(Debug, Clone, Copy)]
struct Mirror {
    origin_index: usize,
    stage: RepairStage,
    progress: f64,
}

/// Simulates the series strings of any number of tables.
///
/// Holds no per-table state: every call to [`tick`](Self::tick) receives the
/// prior snapshot explicitly and returns a new one.
pub struct StringSimulator {
    config: StringSimulatorConfig,
    injector: FaultInjector,
    rng: StdRng,
}

impl StringSimulator {
    pub fn new(config: StringSimulatorConfig) -> Self {
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            injector: FaultInjector::new(config.injector),
            config,
            rng,
        }
    }

    pub fn config(&self) -> &StringSimulatorConfig {
        &self.config
    }

    /// Advance one table by one tick.
    ///
    /// With [`ClockInput::Interval`] the elapsed value stored in `prior` is
    /// advanced by the interval (wrapping after cycle completion); with
    /// [`ClockInput::Elapsed`] the given value is used as is.
    pub fn tick(
        &mut self,
        topology: &TableTopology,
        prior: Option<&TableSnapshot>,
        clock: ClockInput,
        thresholds: &PhaseThresholds,
    ) -> TableSnapshot {
        let prior_elapsed = prior.map(|p| p.elapsed_seconds);
        let elapsed_s = match clock {
            ClockInput::Elapsed(elapsed_s) if elapsed_s.is_finite() => elapsed_s.max(0.0),
            ClockInput::Elapsed(_) => 0.0,
            ClockInput::Interval(step_s) => {
                super::advance_elapsed(prior_elapsed.unwrap_or(0.0), step_s, thresholds)
            }
        };
        let phase = thresholds.phase_for(elapsed_s);
        let new_cycle = prior_elapsed.is_some_and(|previous| elapsed_s < previous);

        let rows = topology
            .strings()
            .map(|string| {
                let prior_row = prior.and_then(|p| p.rows.iter().find(|r| r.row == string.row));
                self.tick_row(topology, string, prior_row, elapsed_s, phase, new_cycle, thresholds)
            })
            .collect();

        TableSnapshot {
            table_id: topology.table_id().to_string(),
            elapsed_seconds: elapsed_s,
            phase,
            rows,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn tick_row(
        &mut self,
        topology: &TableTopology,
        string: SeriesString,
        prior: Option<&RowSnapshot>,
        elapsed_s: f64,
        phase: Phase,
        new_cycle: bool,
        thresholds: &PhaseThresholds,
    ) -> RowSnapshot {
        let mut work = self.carry_forward(topology, string, prior);

        if new_cycle {
            resolve_cycle(&mut work);
            work.completed = None;
        }

        let mut mirror = None;
        if let Some(repair) = work.repair.as_mut() {
            if let Some(step) = repair.advance(elapsed_s, thresholds) {
                work.health[repair.origin_index] = step.health;
            }
            mirror = Some(Mirror {
                origin_index: repair.origin_index,
                stage: repair.stage,
                progress: repair.progress,
            });
            if repair.is_complete() {
                work.completed = Some(repair.origin_index);
                debug!(
                    table = topology.table_id(),
                    row = %string.row,
                    position = repair.origin_index + 1,
                    "repair complete"
                );
                heal(&mut work.health);
                work.repair = None;
            }
        }

        if let Some(event) =
            self.injector
                .maybe_inject(&work.health, work.repair.is_some(), phase, &mut self.rng)
        {
            debug!(
                table = topology.table_id(),
                row = %string.row,
                position = event.index + 1,
                class = %event.class,
                health = event.health,
                "fault injected"
            );
            work.health[event.index] = clamp_percent(event.health);
            let repair = RepairRecord::from(event);
            mirror = Some(Mirror {
                origin_index: repair.origin_index,
                stage: repair.stage,
                progress: repair.progress,
            });
            work.repair = Some(repair);
        }

        // a finished repair stays on display until the clock wraps
        if mirror.is_none() && phase == Phase::CycleComplete {
            mirror = work.completed.map(|origin_index| Mirror {
                origin_index,
                stage: RepairStage::Complete,
                progress: 100.0,
            });
        }

        let rating = topology.rating();
        let max_jitter = self.config.voltage_jitter_fraction;
        let mut panels: Vec<PanelReading> = work
            .health
            .iter()
            .enumerate()
            .map(|(index, health)| {
                let jitter = sample_voltage_jitter(&mut self.rng, max_jitter);
                PanelReading {
                    position: index + 1,
                    health: *health,
                    state: PanelState::from_health(*health),
                    reading: compute_reading(rating, *health, jitter, max_jitter),
                    repair_stage: RepairStage::NotStarted,
                    repair_progress: 0.0,
                    affected_by_series: false,
                }
            })
            .collect();

        let originating_fault_index = cascade::propagate(&mut panels);

        if let Some(mirror) = mirror {
            for panel in panels.iter_mut().skip(mirror.origin_index) {
                panel.repair_stage = mirror.stage;
                panel.repair_progress = mirror.progress;
            }
        }

        let (series_health, series_state) = match originating_fault_index {
            Some(index) => (panels[index].health, panels[index].state),
            None => {
                let weakest = work
                    .health
                    .iter()
                    .copied()
                    .fold(FULL_HEALTH, f64::min);
                (weakest, PanelState::from_health(weakest))
            }
        };

        RowSnapshot {
            row: string.row,
            panels,
            series_health,
            series_state,
            originating_fault_index,
            repair: work.repair,
            reinitialized: work.reinitialized,
        }
    }

    /// Health and repair record from the prior row, or a fresh string.
    ///
    /// A prior row is discarded and the string starts over when its length or
    /// repair index does not fit the topology, when its record holds non-finite
    /// values, or when a panel is degraded without a record to repair it.
    fn carry_forward(
        &mut self,
        topology: &TableTopology,
        string: SeriesString,
        prior: Option<&RowSnapshot>,
    ) -> RowWork {
        match prior {
            Some(row) if fits(row, string) => RowWork {
                health: row.health(),
                repair: row.repair.map(|mut repair| {
                    repair.progress = clamp_percent(repair.progress);
                    repair.injected_health = clamp_percent(repair.injected_health);
                    repair
                }),
                completed: row
                    .panels
                    .iter()
                    .position(|p| p.repair_stage == RepairStage::Complete),
                reinitialized: false,
            },
            Some(row) => {
                warn!(
                    table = topology.table_id(),
                    row = %string.row,
                    snapshot_panels = row.panels.len(),
                    topology_panels = string.panel_count,
                    has_repair = row.repair.is_some(),
                    "snapshot does not match topology, reinitializing string"
                );
                RowWork {
                    health: self.fresh_health(string.panel_count),
                    repair: None,
                    completed: None,
                    reinitialized: true,
                }
            }
            None => RowWork {
                health: self.fresh_health(string.panel_count),
                repair: None,
                completed: None,
                reinitialized: false,
            },
        }
    }

    fn fresh_health(&mut self, panel_count: usize) -> Vec<f64> {
        let min = self.config.initial_health_min.clamp(GOOD_HEALTH_LIMIT, FULL_HEALTH);
        (0..panel_count)
            .map(|_| self.rng.gen_range(min..=FULL_HEALTH))
            .collect()
    }
}

fn fits(row: &RowSnapshot, string: SeriesString) -> bool {
    if row.panels.len() != string.panel_count {
        return false;
    }
    match row.repair {
        Some(repair) => {
            repair.origin_index < string.panel_count
                && repair.progress.is_finite()
                && repair.injected_health.is_finite()
        }
        None => row.health().iter().all(|h| *h >= GOOD_HEALTH_LIMIT),
    }
}

/// A clock that went backwards started a new cycle: whatever was still open
/// from the previous one counts as serviced.
fn resolve_cycle(work: &mut RowWork) {
    if work.repair.take().is_some() {
        heal(&mut work.health);
    }
}

/// A completed repair services the whole string
fn heal(health: &mut [f64]) {
    health.iter_mut().for_each(|h| *h = FULL_HEALTH);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ElectricalRating, FaultClass, RowId};
    use crate::simulation::PositionPolicy;

    fn topology(top: usize, bottom: usize) -> TableTopology {
        TableTopology::new("T1", top, bottom, ElectricalRating::new(20.0, 10.0).unwrap())
    }

    fn simulator(injection_probability: f64) -> StringSimulator {
        StringSimulator::new(StringSimulatorConfig {
            injector: FaultInjectorConfig {
                injection_probability,
                electrical_fault_share: 1.0,
                position_policy: PositionPolicy::default(),
            },
            random_seed: Some(42),
            ..Default::default()
        })
    }

    #[test]
    fn test_fresh_table_is_healthy() {
        let mut sim = simulator(1.0);
        let snapshot = sim.tick(
            &topology(20, 10),
            None,
            ClockInput::Elapsed(0.0),
            &PhaseThresholds::default(),
        );

        assert_eq!(snapshot.panel_count(), 30);
        assert_eq!(snapshot.phase, Phase::Normal);
        for row in &snapshot.rows {
            assert_eq!(row.originating_fault_index, None);
            assert!(row.series_health >= 85.0);
            assert_eq!(row.series_state, PanelState::Good);
            for panel in &row.panels {
                assert!(panel.health >= 85.0 && panel.health <= 100.0);
                assert_eq!(panel.state, PanelState::Good);
            }
        }
    }

    #[test]
    fn test_fault_then_repair_then_heal() {
        let mut sim = simulator(1.0);
        let topo = topology(20, 0);
        let thresholds = PhaseThresholds::default();

        let t0 = sim.tick(&topo, None, ClockInput::Elapsed(0.0), &thresholds);
        let t3 = sim.tick(&topo, Some(&t0), ClockInput::Elapsed(3.0), &thresholds);
        let row = t3.row(RowId::Top).unwrap();
        assert_eq!(row.originating_fault_index, Some(14));
        assert_eq!(row.repair.unwrap().class, FaultClass::ElectricalFault);
        assert_eq!(row.panels[14].repair_stage, RepairStage::NotStarted);

        let t10 = sim.tick(&topo, Some(&t3), ClockInput::Elapsed(10.0), &thresholds);
        let row = t10.row(RowId::Top).unwrap();
        assert_eq!(row.panels[14].repair_stage, RepairStage::MidStage);
        assert_eq!(row.panels[19].repair_stage, RepairStage::MidStage);
        assert_eq!(row.panels[19].repair_progress, 50.0);
        assert_eq!(row.panels[13].repair_stage, RepairStage::NotStarted);

        let t15 = sim.tick(&topo, Some(&t10), ClockInput::Elapsed(15.0), &thresholds);
        let row = t15.row(RowId::Top).unwrap();
        assert!(row.repair.is_none());
        assert_eq!(row.panels[14].repair_stage, RepairStage::Complete);
        assert!(row.panels.iter().all(|p| p.health == 100.0));
        assert!(row.panels.iter().all(|p| p.state == PanelState::Good));
        assert_eq!(row.series_health, 100.0);

        let later = sim.tick(&topo, Some(&t15), ClockInput::Elapsed(15.0), &thresholds);
        let row = later.row(RowId::Top).unwrap();
        assert!(row.panels.iter().all(|p| p.health == 100.0));
        assert!(row.repair.is_none());
    }

    #[test]
    fn test_snapshot_mismatch_reinitializes_row() {
        let mut sim = simulator(0.0);
        let thresholds = PhaseThresholds::default();
        let before = sim.tick(&topology(10, 4), None, ClockInput::Elapsed(1.0), &thresholds);

        let resized = topology(12, 4);
        let after = sim.tick(&resized, Some(&before), ClockInput::Elapsed(2.0), &thresholds);

        let top = after.row(RowId::Top).unwrap();
        assert!(top.reinitialized);
        assert_eq!(top.panels.len(), 12);

        let bottom = after.row(RowId::Bottom).unwrap();
        assert!(!bottom.reinitialized);
        assert_eq!(bottom.health(), before.row(RowId::Bottom).unwrap().health());
    }

    #[test]
    fn test_interval_clock_advances_prior_elapsed() {
        let mut sim = simulator(0.0);
        let thresholds = PhaseThresholds::new(30.0, 60.0, 300.0).unwrap();
        let topo = topology(4, 4);

        let first = sim.tick(&topo, None, ClockInput::Interval(15.0), &thresholds);
        assert_eq!(first.elapsed_seconds, 15.0);
        let second = sim.tick(&topo, Some(&first), ClockInput::Interval(15.0), &thresholds);
        assert_eq!(second.elapsed_seconds, 30.0);
        assert_eq!(second.phase, Phase::FaultDetected);
    }

    #[test]
    fn test_clock_reset_mid_repair_resolves_record() {
        let mut sim = simulator(1.0);
        let topo = topology(10, 0);
        let thresholds = PhaseThresholds::default();

        let t3 = sim.tick(&topo, None, ClockInput::Elapsed(3.0), &thresholds);
        let t8 = sim.tick(&topo, Some(&t3), ClockInput::Elapsed(8.0), &thresholds);
        assert!(t8.row(RowId::Top).unwrap().repair.is_some());

        let reset = sim.tick(&topo, Some(&t8), ClockInput::Elapsed(1.0), &thresholds);
        let row = reset.row(RowId::Top).unwrap();
        assert!(row.repair.is_none());
        assert!(row.panels.iter().all(|p| p.health == 100.0));
        for panel in &row.panels {
            assert!((0.0..=100.0).contains(&panel.repair_progress));
        }
    }

    #[test]
    fn test_no_second_fault_while_recovering() {
        let mut sim = simulator(1.0);
        let topo = topology(20, 0);
        let thresholds = PhaseThresholds::default();

        let mut snapshot = sim.tick(&topo, None, ClockInput::Elapsed(3.0), &thresholds);
        let origin = snapshot.row(RowId::Top).unwrap().repair.unwrap();
        for elapsed in [3.5, 4.0, 4.5, 6.0, 9.0] {
            snapshot = sim.tick(&topo, Some(&snapshot), ClockInput::Elapsed(elapsed), &thresholds);
            let row = snapshot.row(RowId::Top).unwrap();
            let repair = row.repair.unwrap();
            assert_eq!(repair.origin_index, origin.origin_index);
            assert_eq!(repair.injected_health, origin.injected_health);
        }
    }

    #[test]
    fn test_faults_summary() {
        let mut sim = simulator(1.0);
        let snapshot = sim.tick(
            &topology(20, 10),
            None,
            ClockInput::Elapsed(4.0),
            &PhaseThresholds::default(),
        );
        let faults = snapshot.faults();
        assert_eq!(faults.len(), 2);
        assert_eq!(faults[0].row, RowId::Top);
        assert_eq!(faults[0].position, 15);
        assert_eq!(faults[0].affected_panels, 5);
        assert_eq!(faults[1].position, 8);
        assert_eq!(faults[1].affected_panels, 2);
    }

    #[test]
    fn test_degraded_panel_without_record_reinitializes_row() {
        let mut sim = simulator(1.0);
        let topo = topology(10, 0);
        let thresholds = PhaseThresholds::default();

        let mut prior = sim.tick(&topo, None, ClockInput::Elapsed(1.0), &thresholds);
        prior.rows[0].panels[2].health = 50.0;
        prior.rows[0].repair = None;

        let next = sim.tick(&topo, Some(&prior), ClockInput::Elapsed(2.0), &thresholds);
        let row = next.row(RowId::Top).unwrap();
        assert!(row.reinitialized);
        assert!(row.originating_panel().is_none());
        assert!(row.panels.iter().all(|p| p.health >= 85.0));

        // the rebuilt string degrades and recovers on schedule
        let t3 = sim.tick(&topo, Some(&next), ClockInput::Elapsed(3.0), &thresholds);
        assert_eq!(t3.row(RowId::Top).unwrap().originating_fault_index, Some(7));
        let t15 = sim.tick(&topo, Some(&t3), ClockInput::Elapsed(15.0), &thresholds);
        assert!(t15.row(RowId::Top).unwrap().panels.iter().all(|p| p.health == 100.0));
    }

    #[test]
    fn test_nan_health_without_record_reinitializes_row() {
        let mut sim = simulator(0.0);
        let topo = topology(6, 0);
        let thresholds = PhaseThresholds::default();

        let mut prior = sim.tick(&topo, None, ClockInput::Elapsed(1.0), &thresholds);
        prior.rows[0].panels[4].health = f64::NAN;

        let next = sim.tick(&topo, Some(&prior), ClockInput::Elapsed(2.0), &thresholds);
        assert!(next.rows[0].reinitialized);
        assert!(next.rows[0].health().iter().all(|h| *h >= 85.0));
    }

    #[test]
    fn test_out_of_range_progress_still_completes() {
        let mut sim = simulator(1.0);
        let topo = topology(20, 0);
        let thresholds = PhaseThresholds::default();

        let mut snapshot = sim.tick(&topo, None, ClockInput::Elapsed(3.0), &thresholds);
        if let Some(repair) = snapshot.rows[0].repair.as_mut() {
            repair.progress = 150.0;
        }
        for elapsed in [6.0, 10.0, 15.0] {
            snapshot = sim.tick(&topo, Some(&snapshot), ClockInput::Elapsed(elapsed), &thresholds);
            if let Some(repair) = snapshot.rows[0].repair {
                assert!((0.0..=100.0).contains(&repair.progress));
            }
        }

        let row = snapshot.row(RowId::Top).unwrap();
        assert!(row.repair.is_none());
        assert!(row.panels.iter().all(|p| p.health == 100.0));
    }

    #[test]
    fn test_non_finite_record_reinitializes_row() {
        let mut sim = simulator(1.0);
        let topo = topology(20, 0);
        let thresholds = PhaseThresholds::default();

        let mut prior = sim.tick(&topo, None, ClockInput::Elapsed(3.0), &thresholds);
        if let Some(repair) = prior.rows[0].repair.as_mut() {
            repair.injected_health = f64::NAN;
        }

        let next = sim.tick(&topo, Some(&prior), ClockInput::Elapsed(6.0), &thresholds);
        let row = next.row(RowId::Top).unwrap();
        assert!(row.reinitialized);
        assert!(row.repair.is_none());
    }

    #[test]
    fn test_complete_stage_shown_until_wrap() {
        let mut sim = simulator(1.0);
        let topo = topology(20, 0);
        let thresholds = PhaseThresholds::default();

        let mut snapshot = sim.tick(&topo, None, ClockInput::Elapsed(3.0), &thresholds);
        for elapsed in [15.0, 16.0, 40.0] {
            snapshot = sim.tick(&topo, Some(&snapshot), ClockInput::Elapsed(elapsed), &thresholds);
            let row = snapshot.row(RowId::Top).unwrap();
            assert!(row.repair.is_none());
            assert_eq!(row.panels[14].repair_stage, RepairStage::Complete);
            assert_eq!(row.panels[19].repair_progress, 100.0);
            assert_eq!(row.panels[13].repair_stage, RepairStage::NotStarted);
        }

        let wrapped = sim.tick(&topo, Some(&snapshot), ClockInput::Elapsed(0.5), &thresholds);
        let row = wrapped.row(RowId::Top).unwrap();
        assert!(row
            .panels
            .iter()
            .all(|p| p.repair_stage == RepairStage::NotStarted && p.repair_progress == 0.0));
    }

    #[test]
    fn test_config_validation() {
        assert!(StringSimulatorConfig::default().validate().is_ok());
        let bad = StringSimulatorConfig {
            voltage_jitter_fraction: 0.2,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = StringSimulatorConfig {
            initial_health_min: 50.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}

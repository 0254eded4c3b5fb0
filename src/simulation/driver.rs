//! # Clock Drivers
//!
//! Two adapters over [`StringSimulator::tick`]:
//!
//! - [`LiveDriver`] owns a free-running [`SimulationClock`] and the latest
//!   snapshot of one table, stepping every few hundred milliseconds.
//! - [`RefreshDriver`] owns nothing; it advances a persisted snapshot by one
//!   refresh interval. The caller loads and stores the snapshot.
//!
//! The drivers never share clock state.

use std::time::Duration;

use super::{
    ClockInput, Phase, PhaseThresholds, SimulationClock, StringSimulator, TableSnapshot,
    TableTopology,
};

/// Fast local driver for one table
#[derive(Debug, Clone)]
pub struct LiveDriver {
    topology: TableTopology,
    clock: SimulationClock,
    snapshot: Option<TableSnapshot>,
}

impl LiveDriver {
    pub fn new(topology: TableTopology, thresholds: PhaseThresholds) -> Self {
        Self {
            topology,
            clock: SimulationClock::new(thresholds),
            snapshot: None,
        }
    }

    pub fn topology(&self) -> &TableTopology {
        &self.topology
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    pub fn snapshot(&self) -> Option<&TableSnapshot> {
        self.snapshot.as_ref()
    }

    /// Compute the snapshot for the current clock value without advancing it
    pub fn prime(&mut self, sim: &mut StringSimulator) -> &TableSnapshot {
        let elapsed_s = self.clock.elapsed_s();
        self.run(sim, elapsed_s)
    }

    /// Advance the clock by `delta` and recompute
    pub fn step(&mut self, sim: &mut StringSimulator, delta: Duration) -> &TableSnapshot {
        let elapsed_s = self.clock.advance(delta);
        self.run(sim, elapsed_s)
    }

    /// Replace the topology after an external resize; the next step reconciles
    /// the snapshot against it
    pub fn set_topology(&mut self, topology: TableTopology) {
        self.topology = topology;
    }

    pub fn phase(&self) -> Phase {
        self.clock.phase()
    }

    fn run(&mut self, sim: &mut StringSimulator, elapsed_s: f64) -> &TableSnapshot {
        let thresholds = *self.clock.thresholds();
        let next = sim.tick(
            &self.topology,
            self.snapshot.as_ref(),
            ClockInput::Elapsed(elapsed_s),
            &thresholds,
        );
        self.snapshot.insert(next)
    }
}

/// Slow refresh driver advancing persisted snapshots
#[derive(Debug, Clone, Copy)]
pub struct RefreshDriver {
    thresholds: PhaseThresholds,
    interval: Duration,
}

impl RefreshDriver {
    pub fn new(thresholds: PhaseThresholds, interval: Duration) -> Self {
        Self {
            thresholds,
            interval,
        }
    }

    pub fn thresholds(&self) -> &PhaseThresholds {
        &self.thresholds
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Advance `persisted` by one interval. A missing snapshot starts a fresh
    /// table at the first interval of a cycle.
    pub fn refresh(
        &self,
        sim: &mut StringSimulator,
        topology: &TableTopology,
        persisted: Option<&TableSnapshot>,
    ) -> TableSnapshot {
        sim.tick(
            topology,
            persisted,
            ClockInput::Interval(self.interval.as_secs_f64()),
            &self.thresholds,
        )
    }
}

//! # Simulation Clock
//!
//! Phase is a pure function of elapsed seconds against three ordered
//! thresholds. The free-running [`SimulationClock`] and the persisted-snapshot
//! refresh path share [`advance_elapsed`], so both observe the cycle-complete
//! instant once before wrapping back to zero.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::Display;

use crate::domain::SimulationError;

/// Clock-derived period gating which engine behaviors are active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    /// `[0, fault_start)`
    Normal,
    /// `[fault_start, repair_start)`: new faults may be injected
    FaultDetected,
    /// `[repair_start, cycle_complete)`: repairs progress
    RepairStarted,
    /// `>= cycle_complete`
    CycleComplete,
}

/// Phase thresholds in seconds since the start of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseThresholds {
    pub fault_start_s: f64,
    pub repair_start_s: f64,
    pub cycle_complete_s: f64,
}

impl Default for PhaseThresholds {
    fn default() -> Self {
        Self {
            fault_start_s: 3.0,
            repair_start_s: 5.0,
            cycle_complete_s: 15.0,
        }
    }
}

impl PhaseThresholds {
    pub fn new(
        fault_start_s: f64,
        repair_start_s: f64,
        cycle_complete_s: f64,
    ) -> Result<Self, SimulationError> {
        let thresholds = Self {
            fault_start_s,
            repair_start_s,
            cycle_complete_s,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Thresholds must be finite and satisfy `0 <= fault < repair < complete`
    pub fn validate(&self) -> Result<(), SimulationError> {
        let finite = self.fault_start_s.is_finite()
            && self.repair_start_s.is_finite()
            && self.cycle_complete_s.is_finite();
        let ordered = self.fault_start_s >= 0.0
            && self.fault_start_s < self.repair_start_s
            && self.repair_start_s < self.cycle_complete_s;
        if finite && ordered {
            Ok(())
        } else {
            Err(SimulationError::InvalidThresholds {
                fault_start_s: self.fault_start_s,
                repair_start_s: self.repair_start_s,
                cycle_complete_s: self.cycle_complete_s,
            })
        }
    }

    /// Seconds between repair start and cycle completion
    pub fn repair_duration_s(&self) -> f64 {
        self.cycle_complete_s - self.repair_start_s
    }

    pub fn phase_for(&self, elapsed_s: f64) -> Phase {
        phase_for(elapsed_s, self)
    }
}

/// Phase for an elapsed time. Negative or NaN elapsed counts as the cycle start.
pub fn phase_for(elapsed_s: f64, thresholds: &PhaseThresholds) -> Phase {
    let elapsed_s = if elapsed_s.is_nan() { 0.0 } else { elapsed_s };
    if elapsed_s >= thresholds.cycle_complete_s {
        Phase::CycleComplete
    } else if elapsed_s >= thresholds.repair_start_s {
        Phase::RepairStarted
    } else if elapsed_s >= thresholds.fault_start_s {
        Phase::FaultDetected
    } else {
        Phase::Normal
    }
}

/// Advance a cyclic elapsed value by `step_s`.
///
/// A step never jumps past `fault_start_s` or `cycle_complete_s`: it stops on
/// them, so every cycle reports a fault-detection tick and the completion
/// instant however coarse the step. The call after completion resets to zero.
pub fn advance_elapsed(elapsed_s: f64, step_s: f64, thresholds: &PhaseThresholds) -> f64 {
    if !elapsed_s.is_finite() || elapsed_s < 0.0 || elapsed_s >= thresholds.cycle_complete_s {
        return 0.0;
    }
    let step_s = if step_s.is_finite() { step_s.max(0.0) } else { 0.0 };
    let next = (elapsed_s + step_s).min(thresholds.cycle_complete_s);
    if elapsed_s < thresholds.fault_start_s && next > thresholds.fault_start_s {
        thresholds.fault_start_s
    } else {
        next
    }
}

/// Free-running cyclic clock owned by a fast local driver
#[derive(Debug, Clone)]
pub struct SimulationClock {
    thresholds: PhaseThresholds,
    elapsed_s: f64,
}

impl SimulationClock {
    pub fn new(thresholds: PhaseThresholds) -> Self {
        Self {
            thresholds,
            elapsed_s: 0.0,
        }
    }

    pub fn thresholds(&self) -> &PhaseThresholds {
        &self.thresholds
    }

    pub fn elapsed_s(&self) -> f64 {
        self.elapsed_s
    }

    pub fn phase(&self) -> Phase {
        self.thresholds.phase_for(self.elapsed_s)
    }

    /// Advance by `delta` and return the new elapsed seconds
    pub fn advance(&mut self, delta: Duration) -> f64 {
        self.elapsed_s = advance_elapsed(self.elapsed_s, delta.as_secs_f64(), &self.thresholds);
        self.elapsed_s
    }
}

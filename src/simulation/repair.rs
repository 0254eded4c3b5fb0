//! # Repair Progression
//!
//! Timed recovery of an originating panel. Progress is the share of the repair
//! window (`repair_start .. cycle_complete`) that has elapsed:
//!
//! | class            | stages                           | health curve          |
//! |------------------|----------------------------------|-----------------------|
//! | electrical fault | Early (first 40%) → Mid → Complete | 30→50, then 50→100 |
//! | cleaning         | Mid → Complete                   | 70→100                |
//!
//! Followers never hold their own copy of this state; the row keeps a single
//! [`RepairRecord`] and readings look it up by index.

use serde::{Deserialize, Serialize};

use super::{FaultEvent, Phase, PhaseThresholds};
use crate::domain::{clamp_percent, FaultClass, RepairStage, FULL_HEALTH};

/// Share of the repair window spent in the early stage
pub const EARLY_STAGE_SHARE: f64 = 0.4;

const EARLY_STAGE_HEALTH: (f64, f64) = (30.0, 50.0);
const MID_STAGE_HEALTH: (f64, f64) = (50.0, FULL_HEALTH);
const CLEANING_HEALTH: (f64, f64) = (70.0, FULL_HEALTH);

/// Repair state attached to a string with an originating panel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairRecord {
    /// 0-based index of the originating panel
    pub origin_index: usize,
    pub class: FaultClass,
    /// Health the panel dropped to when the event was injected
    pub injected_health: f64,
    pub stage: RepairStage,
    /// 0..=100
    pub progress: f64,
}

impl From<FaultEvent> for RepairRecord {
    fn from(event: FaultEvent) -> Self {
        Self {
            origin_index: event.index,
            class: event.class,
            injected_health: clamp_percent(event.health),
            stage: RepairStage::NotStarted,
            progress: 0.0,
        }
    }
}

/// Where the repair stands at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairStep {
    pub stage: RepairStage,
    pub progress: f64,
    /// Health of the originating panel
    pub health: f64,
}

/// Elapsed share of the repair window, clamped to `[0, 1]`
pub fn repair_fraction(elapsed_s: f64, thresholds: &PhaseThresholds) -> f64 {
    let duration = thresholds.repair_duration_s();
    let repair_elapsed = elapsed_s - thresholds.repair_start_s;
    if duration <= 0.0 {
        return if repair_elapsed >= 0.0 { 1.0 } else { 0.0 };
    }
    let fraction = repair_elapsed / duration;
    if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    }
}

/// Stateless repair position for a class at a phase and repair fraction
pub fn repair_step(
    class: FaultClass,
    injected_health: f64,
    phase: Phase,
    fraction: f64,
) -> RepairStep {
    let fraction = if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    };

    match phase {
        Phase::Normal | Phase::FaultDetected => RepairStep {
            stage: RepairStage::NotStarted,
            progress: 0.0,
            health: clamp_percent(injected_health),
        },
        Phase::RepairStarted | Phase::CycleComplete if fraction >= 1.0 => RepairStep {
            stage: RepairStage::Complete,
            progress: 100.0,
            health: FULL_HEALTH,
        },
        Phase::RepairStarted | Phase::CycleComplete => {
            let progress = fraction * 100.0;
            match class {
                FaultClass::ElectricalFault if fraction < EARLY_STAGE_SHARE => RepairStep {
                    stage: RepairStage::EarlyStage,
                    progress,
                    health: lerp(EARLY_STAGE_HEALTH, fraction / EARLY_STAGE_SHARE),
                },
                FaultClass::ElectricalFault => RepairStep {
                    stage: RepairStage::MidStage,
                    progress,
                    health: lerp(
                        MID_STAGE_HEALTH,
                        (fraction - EARLY_STAGE_SHARE) / (1.0 - EARLY_STAGE_SHARE),
                    ),
                },
                FaultClass::CleaningRequired => RepairStep {
                    stage: RepairStage::MidStage,
                    progress,
                    health: lerp(CLEANING_HEALTH, fraction),
                },
            }
        }
    }
}

impl RepairRecord {
    pub fn is_complete(&self) -> bool {
        self.stage == RepairStage::Complete
    }

    /// Move the record to where the clock says it should be.
    ///
    /// Never moves backwards: a step with an earlier stage or lower progress is
    /// ignored and `None` is returned. On success the originating panel's new
    /// health is returned with the step.
    pub fn advance(&mut self, elapsed_s: f64, thresholds: &PhaseThresholds) -> Option<RepairStep> {
        let phase = thresholds.phase_for(elapsed_s);
        let step = repair_step(
            self.class,
            self.injected_health,
            phase,
            repair_fraction(elapsed_s, thresholds),
        );

        if step.stage < self.stage || step.progress < self.progress {
            return None;
        }
        self.stage = step.stage;
        self.progress = step.progress;
        Some(step)
    }
}

fn lerp((from, to): (f64, f64), t: f64) -> f64 {
    from + (to - from) * t.clamp(0.0, 1.0)
}

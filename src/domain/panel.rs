//! # Panel Domain Types
//!
//! Health, state and repair vocabulary shared by the simulation engine and the
//! collaborators that render or persist its snapshots.

use serde::{Deserialize, Serialize};
use std::ops::Range;
use strum::{AsRefStr, Display, EnumIter};

use super::SimulationError;

/// Health below this value is an electrical fault
pub const FAULT_HEALTH_LIMIT: f64 = 20.0;

/// Health at or above this value is a good panel
pub const GOOD_HEALTH_LIMIT: f64 = 80.0;

/// Full health after a completed repair
pub const FULL_HEALTH: f64 = 100.0;

/// Clamp a percentage into `[0, 100]`. NaN collapses to 0.
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// One of the two series strings of a table
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "lowercase")]
pub enum RowId {
    Top,
    Bottom,
}

/// Visual and electrical state of a panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "camelCase")]
pub enum PanelState {
    /// Health >= 80%
    Good,
    /// 20% <= health < 80%, typically soiling
    Cleaning,
    /// Health < 20%
    Fault,
}

impl PanelState {
    /// Classify a health percentage with the 80/20 boundary policy
    pub fn from_health(health: f64) -> Self {
        let health = clamp_percent(health);
        if health < FAULT_HEALTH_LIMIT {
            PanelState::Fault
        } else if health < GOOD_HEALTH_LIMIT {
            PanelState::Cleaning
        } else {
            PanelState::Good
        }
    }

    /// Fault or cleaning
    pub fn is_degraded(&self) -> bool {
        !matches!(self, PanelState::Good)
    }
}

/// Discrete stage of the timed recovery process
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "camelCase")]
pub enum RepairStage {
    NotStarted,
    EarlyStage,
    MidStage,
    Complete,
}

/// Kind of injected defect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
pub enum FaultClass {
    /// Electrical fault, health drawn from `[0, 20)`
    ElectricalFault,
    /// Soiled panel, health drawn from `[20, 80)`
    CleaningRequired,
}

impl FaultClass {
    /// Health range an injected event of this class is drawn from
    pub fn health_range(&self) -> Range<f64> {
        match self {
            FaultClass::ElectricalFault => 0.0..FAULT_HEALTH_LIMIT,
            FaultClass::CleaningRequired => FAULT_HEALTH_LIMIT..GOOD_HEALTH_LIMIT,
        }
    }

    /// State a freshly injected panel of this class shows
    pub fn state(&self) -> PanelState {
        match self {
            FaultClass::ElectricalFault => PanelState::Fault,
            FaultClass::CleaningRequired => PanelState::Cleaning,
        }
    }
}

/// Nameplate voltage and current of the panels in a table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectricalRating {
    nominal_voltage_v: f64,
    nominal_current_a: f64,
}

impl ElectricalRating {
    pub fn new(nominal_voltage_v: f64, nominal_current_a: f64) -> Result<Self, SimulationError> {
        if !nominal_voltage_v.is_finite() || nominal_voltage_v <= 0.0 {
            return Err(SimulationError::InvalidRating {
                field: "nominal_voltage_v",
                value: nominal_voltage_v,
            });
        }
        if !nominal_current_a.is_finite() || nominal_current_a <= 0.0 {
            return Err(SimulationError::InvalidRating {
                field: "nominal_current_a",
                value: nominal_current_a,
            });
        }
        Ok(Self {
            nominal_voltage_v,
            nominal_current_a,
        })
    }

    pub fn nominal_voltage_v(&self) -> f64 {
        self.nominal_voltage_v
    }

    pub fn nominal_current_a(&self) -> f64 {
        self.nominal_current_a
    }

    /// Nameplate power at full health and nominal voltage
    pub fn nominal_power_w(&self) -> f64 {
        self.nominal_voltage_v * self.nominal_current_a
    }
}

//! # Table Snapshots
//!
//! Output of one simulation tick. A snapshot is also the prior state fed back
//! into the next tick by the refresh driver, so it carries the per-panel health
//! and each row's repair record alongside the rendered readings.

use serde::{Deserialize, Serialize};

use super::{ElectricalReading, Phase, RepairRecord};
use crate::domain::{clamp_percent, FaultClass, PanelState, RepairStage, RowId};

/// One panel as shown to collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelReading {
    /// 1-based position along the string
    pub position: usize,
    pub health: f64,
    /// Displayed state; for cascade followers this is the originator's state
    pub state: PanelState,
    #[serde(flatten)]
    pub reading: ElectricalReading,
    pub repair_stage: RepairStage,
    pub repair_progress: f64,
    /// Current-limited by an earlier panel rather than degraded itself
    #[serde(default)]
    pub affected_by_series: bool,
}

impl PanelReading {
    /// State implied by this panel's own health, ignoring the cascade
    pub fn intrinsic_state(&self) -> PanelState {
        PanelState::from_health(self.health)
    }
}

/// One series string after a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowSnapshot {
    pub row: RowId,
    pub panels: Vec<PanelReading>,
    /// Health of the originating panel, or of the weakest panel when none
    pub series_health: f64,
    pub series_state: PanelState,
    /// 0-based index of the first degraded panel
    pub originating_fault_index: Option<usize>,
    /// Open repair record, if the string is degraded or recovering
    pub repair: Option<RepairRecord>,
    /// Set when the prior snapshot did not match the topology and the row was
    /// rebuilt from scratch
    #[serde(default)]
    pub reinitialized: bool,
}

impl RowSnapshot {
    /// Per-panel health in wiring order, clamped
    pub fn health(&self) -> Vec<f64> {
        self.panels.iter().map(|p| clamp_percent(p.health)).collect()
    }

    pub fn originating_panel(&self) -> Option<&PanelReading> {
        self.originating_fault_index
            .and_then(|index| self.panels.get(index))
    }

    pub fn affected_panels(&self) -> impl Iterator<Item = &PanelReading> {
        self.panels.iter().filter(|p| p.affected_by_series)
    }
}

/// All rows of a table after a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSnapshot {
    pub table_id: String,
    /// Cycle-relative clock value this snapshot was computed for
    pub elapsed_seconds: f64,
    pub phase: Phase,
    pub rows: Vec<RowSnapshot>,
}

/// Entry of a fault list view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultSummary {
    pub table_id: String,
    pub row: RowId,
    /// 1-based position of the originating panel
    pub position: usize,
    pub class: FaultClass,
    pub health: f64,
    pub stage: RepairStage,
    pub progress: f64,
    /// Panels current-limited by this one
    pub affected_panels: usize,
}

impl TableSnapshot {
    pub fn row(&self, row: RowId) -> Option<&RowSnapshot> {
        self.rows.iter().find(|r| r.row == row)
    }

    pub fn panel_count(&self) -> usize {
        self.rows.iter().map(|r| r.panels.len()).sum()
    }

    /// Open repair records of this table, one per degraded string
    pub fn faults(&self) -> Vec<FaultSummary> {
        self.rows
            .iter()
            .filter_map(|row| {
                let repair = row.repair?;
                let origin = row.panels.get(repair.origin_index)?;
                Some(FaultSummary {
                    table_id: self.table_id.clone(),
                    row: row.row,
                    position: origin.position,
                    class: repair.class,
                    health: origin.health,
                    stage: repair.stage,
                    progress: repair.progress,
                    affected_panels: row.affected_panels().count(),
                })
            })
            .collect()
    }

    /// Total power over all panels (W)
    pub fn total_power_w(&self) -> f64 {
        self.rows
            .iter()
            .flat_map(|r| r.panels.iter())
            .map(|p| p.reading.power_w)
            .sum()
    }
}

//! # Series String Topology
//!
//! Static layout of a table: a top and a bottom series string, each an ordered
//! run of panel positions starting at 1.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::domain::{ElectricalRating, RowId};

/// Stable identity of a panel inside a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelId {
    pub row: RowId,
    /// 1-based position along the string
    pub position: usize,
}

/// One series string of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesString {
    pub row: RowId,
    pub panel_count: usize,
}

impl SeriesString {
    /// Panel identities in wiring order
    pub fn panels(&self) -> impl Iterator<Item = PanelId> + '_ {
        (1..=self.panel_count).map(move |position| PanelId {
            row: self.row,
            position,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.panel_count == 0
    }
}

/// Immutable description of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableTopology {
    table_id: String,
    top_row_panels: usize,
    bottom_row_panels: usize,
    rating: ElectricalRating,
}

impl TableTopology {
    pub fn new(
        table_id: impl Into<String>,
        top_row_panels: usize,
        bottom_row_panels: usize,
        rating: ElectricalRating,
    ) -> Self {
        Self {
            table_id: table_id.into(),
            top_row_panels,
            bottom_row_panels,
            rating,
        }
    }

    /// Build from raw signed counts as delivered by the table editor.
    /// Negative counts mean an empty string.
    pub fn from_counts(
        table_id: impl Into<String>,
        top_row_panels: i64,
        bottom_row_panels: i64,
        rating: ElectricalRating,
    ) -> Self {
        Self::new(
            table_id,
            usize::try_from(top_row_panels).unwrap_or(0),
            usize::try_from(bottom_row_panels).unwrap_or(0),
            rating,
        )
    }

    pub fn table_id(&self) -> &str {
        &self.table_id
    }

    pub fn rating(&self) -> &ElectricalRating {
        &self.rating
    }

    pub fn panel_count(&self, row: RowId) -> usize {
        match row {
            RowId::Top => self.top_row_panels,
            RowId::Bottom => self.bottom_row_panels,
        }
    }

    pub fn total_panels(&self) -> usize {
        self.top_row_panels + self.bottom_row_panels
    }

    pub fn string(&self, row: RowId) -> SeriesString {
        SeriesString {
            row,
            panel_count: self.panel_count(row),
        }
    }

    /// Top string first, then bottom
    pub fn strings(&self) -> impl Iterator<Item = SeriesString> + '_ {
        RowId::iter().map(move |row| self.string(row))
    }
}

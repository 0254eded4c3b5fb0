//! # PV String Simulation
//!
//! Fault injection, series cascade and timed repair for tables of photovoltaic
//! panels wired as two series strings.
//!
//! ## Components
//!
//! - **Reading**: health → voltage, current, power and cosmetic readings
//! - **Topology**: top and bottom string layout of a table
//! - **Clock**: phase thresholds and the free-running cyclic clock
//! - **Fault**: per-tick injection of at most one defect per string
//! - **Cascade**: series current-limiting from the first degraded panel on
//! - **Repair**: staged recovery driven by the repair window
//! - **Orchestrator**: composes all of the above into one `tick`
//! - **Driver**: live (elapsed time) and refresh (persisted snapshot) adapters
//!
//! ## Usage
//!
//! ```rust
//! use pv_string_sim::domain::ElectricalRating;
//! use pv_string_sim::simulation::{
//!     ClockInput, PhaseThresholds, StringSimulator, StringSimulatorConfig, TableTopology,
//! };
//!
//! let rating = ElectricalRating::new(20.0, 10.0).unwrap();
//! let table = TableTopology::new("T1", 20, 20, rating);
//! let thresholds = PhaseThresholds::default();
//! let mut sim = StringSimulator::new(StringSimulatorConfig::default());
//!
//! let first = sim.tick(&table, None, ClockInput::Elapsed(0.0), &thresholds);
//! let next = sim.tick(&table, Some(&first), ClockInput::Elapsed(4.0), &thresholds);
//! assert_eq!(next.panel_count(), 40);
//! ```

pub mod cascade;
pub mod clock;
pub mod driver;
pub mod fault;
pub mod orchestrator;
pub mod reading;
pub mod repair;
pub mod snapshot;
pub mod topology;

pub use clock::{advance_elapsed, phase_for, Phase, PhaseThresholds, SimulationClock};
pub use driver::{LiveDriver, RefreshDriver};
pub use fault::{FaultEvent, FaultInjector, FaultInjectorConfig, PositionPolicy};
pub use orchestrator::{ClockInput, StringSimulator, StringSimulatorConfig};
pub use reading::{compute_reading, current_factor, sample_voltage_jitter, ElectricalReading};
pub use repair::{repair_fraction, repair_step, RepairRecord, RepairStep};
pub use snapshot::{FaultSummary, PanelReading, RowSnapshot, TableSnapshot};
pub use topology::{PanelId, SeriesString, TableTopology};

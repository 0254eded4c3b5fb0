use thiserror::Error;

/// Errors raised while building simulation inputs.
///
/// The engine itself is total; these only surface from constructors and
/// configuration validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("Invalid electrical rating: {field} = {value} (must be finite and > 0)")]
    InvalidRating { field: &'static str, value: f64 },

    #[error(
        "Invalid phase thresholds: fault_start={fault_start_s}s, repair_start={repair_start_s}s, \
         cycle_complete={cycle_complete_s}s (must satisfy 0 <= fault < repair < complete)"
    )]
    InvalidThresholds {
        fault_start_s: f64,
        repair_start_s: f64,
        cycle_complete_s: f64,
    },

    #[error("Invalid probability for {field}: {value} (must be within 0..=1)")]
    InvalidProbability { field: &'static str, value: f64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

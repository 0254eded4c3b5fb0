//! # Fault Injection
//!
//! Introduces at most one new defect per series string and cycle. An event is
//! only rolled while the clock is in [`Phase::FaultDetected`] and the string is
//! clean: no open repair record and no panel below the good-health limit.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::Phase;
use crate::domain::{FaultClass, SimulationError, GOOD_HEALTH_LIMIT};

/// Rule for choosing which panel of a string degrades
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PositionPolicy {
    /// Always the panel `floor(fraction × N)` along the string
    FixedFraction { fraction: f64 },
    /// Any panel, uniformly
    Uniform,
}

impl Default for PositionPolicy {
    fn default() -> Self {
        PositionPolicy::FixedFraction { fraction: 0.7 }
    }
}

impl PositionPolicy {
    /// 0-based index for a string of `len` panels, `None` for an empty string
    pub fn select_index<R: Rng>(&self, len: usize, rng: &mut R) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let index = match self {
            PositionPolicy::FixedFraction { fraction } => {
                let fraction = if fraction.is_finite() {
                    fraction.clamp(0.0, 1.0)
                } else {
                    0.0
                };
                // epsilon keeps 0.7 × 20 at 14 despite binary rounding
                (len as f64 * fraction + 1e-9).floor() as usize
            }
            PositionPolicy::Uniform => rng.gen_range(0..len),
        };
        Some(index.min(len - 1))
    }
}

/// Fault injection configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaultInjectorConfig {
    /// Probability that a clean string degrades on a given FaultDetected tick
    pub injection_probability: f64,
    /// Share of injected events that are electrical faults (rest need cleaning)
    pub electrical_fault_share: f64,
    /// Which panel degrades
    #[serde(default)]
    pub position_policy: PositionPolicy,
}

impl Default for FaultInjectorConfig {
    fn default() -> Self {
        Self {
            injection_probability: 0.35,
            electrical_fault_share: 0.5,
            position_policy: PositionPolicy::default(),
        }
    }
}

impl FaultInjectorConfig {
    pub fn validate(&self) -> Result<(), SimulationError> {
        check_probability("injection_probability", self.injection_probability)?;
        check_probability("electrical_fault_share", self.electrical_fault_share)?;
        if let PositionPolicy::FixedFraction { fraction } = self.position_policy {
            check_probability("position_policy.fraction", fraction)?;
        }
        Ok(())
    }
}

fn check_probability(field: &'static str, value: f64) -> Result<(), SimulationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SimulationError::InvalidProbability { field, value })
    }
}

/// A newly injected defect
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultEvent {
    /// 0-based index along the string
    pub index: usize,
    pub class: FaultClass,
    /// Health the panel drops to
    pub health: f64,
}

/// Per-tick fault injector
#[derive(Debug, Clone)]
pub struct FaultInjector {
    config: FaultInjectorConfig,
}

impl FaultInjector {
    pub fn new(config: FaultInjectorConfig) -> Self {
        Self { config }
    }

    /// Roll for a new event on one string.
    ///
    /// `health` is the string's panel health in wiring order, `has_open_event`
    /// whether the string still carries an unfinished repair record.
    pub fn maybe_inject<R: Rng>(
        &self,
        health: &[f64],
        has_open_event: bool,
        phase: Phase,
        rng: &mut R,
    ) -> Option<FaultEvent> {
        if phase != Phase::FaultDetected || has_open_event {
            return None;
        }
        if health.iter().any(|h| *h < GOOD_HEALTH_LIMIT) {
            return None;
        }
        if !roll(rng, self.config.injection_probability) {
            return None;
        }

        let index = self.config.position_policy.select_index(health.len(), rng)?;
        let class = if roll(rng, self.config.electrical_fault_share) {
            FaultClass::ElectricalFault
        } else {
            FaultClass::CleaningRequired
        };
        let health = rng.gen_range(class.health_range());

        Some(FaultEvent {
            index,
            class,
            health,
        })
    }
}

fn roll<R: Rng>(rng: &mut R, probability: f64) -> bool {
    if probability >= 1.0 {
        true
    } else if probability > 0.0 {
        rng.gen_bool(probability)
    } else {
        false
    }
}

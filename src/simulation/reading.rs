//! # Electrical Reading Model
//!
//! Maps a panel's health to the readings shown for it. Voltage only carries
//! cosmetic jitter; current is the health-scaled quantity and power is always
//! `voltage × current`.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::domain::{clamp_percent, ElectricalRating, FAULT_HEALTH_LIMIT, GOOD_HEALTH_LIMIT};

/// Standard test condition irradiance (W/m²)
pub const STC_IRRADIANCE_W_M2: f64 = 1000.0;

/// Module efficiency of a healthy panel (%)
pub const RATED_MODULE_EFFICIENCY_PERCENT: f64 = 20.0;

const AMBIENT_TEMPERATURE_C: f64 = 25.0;
const OPERATING_RISE_C: f64 = 20.0;
/// Extra hot-spot heating of a panel at 0% health
const HOT_SPOT_RISE_C: f64 = 35.0;
/// Irradiance lost to soiling at 0% health
const MAX_SOILING_LOSS: f64 = 0.4;

// Current factor anchor points: (health %, fraction of nominal current)
const FACTOR_AT_ZERO: f64 = 0.05;
const FACTOR_AT_FAULT_LIMIT: f64 = 0.20;
const FACTOR_AT_GOOD_LIMIT: f64 = 0.80;
const FACTOR_AT_FULL: f64 = 0.98;

/// Readings of one panel at one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectricalReading {
    pub voltage_v: f64,
    pub current_a: f64,
    pub power_w: f64,
    pub temperature_c: f64,
    pub efficiency_percent: f64,
    pub irradiance_w_m2: f64,
}

impl ElectricalReading {
    /// Force the series-limited current onto this panel.
    ///
    /// Power is recomputed from the panel's own voltage and efficiency follows
    /// the power ratio.
    pub fn limit_current(&mut self, current_a: f64) {
        let previous_power = self.power_w;
        self.current_a = current_a;
        self.power_w = self.voltage_v * current_a;
        self.efficiency_percent = if previous_power > 0.0 {
            (self.efficiency_percent * self.power_w / previous_power).max(0.0)
        } else {
            0.0
        };
    }
}

/// Fraction of nominal current delivered at a given health.
///
/// Piecewise linear through (0, 0.05), (20, 0.20), (80, 0.80), (100, 0.98):
/// monotone and continuous at both state boundaries.
pub fn current_factor(health: f64) -> f64 {
    let health = clamp_percent(health);
    if health < FAULT_HEALTH_LIMIT {
        lerp(FACTOR_AT_ZERO, FACTOR_AT_FAULT_LIMIT, health / FAULT_HEALTH_LIMIT)
    } else if health < GOOD_HEALTH_LIMIT {
        lerp(
            FACTOR_AT_FAULT_LIMIT,
            FACTOR_AT_GOOD_LIMIT,
            (health - FAULT_HEALTH_LIMIT) / (GOOD_HEALTH_LIMIT - FAULT_HEALTH_LIMIT),
        )
    } else {
        lerp(
            FACTOR_AT_GOOD_LIMIT,
            FACTOR_AT_FULL,
            (health - GOOD_HEALTH_LIMIT) / (100.0 - GOOD_HEALTH_LIMIT),
        )
    }
}

/// Compute the readings of a panel.
///
/// `voltage_jitter` is a signed fraction of nominal voltage and is clamped to
/// `±max_jitter`.
pub fn compute_reading(
    rating: &ElectricalRating,
    health: f64,
    voltage_jitter: f64,
    max_jitter: f64,
) -> ElectricalReading {
    let health = clamp_percent(health);
    let max_jitter = max_jitter.abs();
    let jitter = if voltage_jitter.is_finite() {
        voltage_jitter.clamp(-max_jitter, max_jitter)
    } else {
        0.0
    };

    let factor = current_factor(health);
    let voltage_v = rating.nominal_voltage_v() * (1.0 + jitter);
    let current_a = rating.nominal_current_a() * factor;
    let power_w = voltage_v * current_a;

    let rated_power_w = rating.nominal_power_w() * FACTOR_AT_FULL;
    let efficiency_percent = RATED_MODULE_EFFICIENCY_PERCENT * power_w / rated_power_w;

    let lost_health = (100.0 - health) / 100.0;
    let temperature_c = AMBIENT_TEMPERATURE_C + OPERATING_RISE_C + HOT_SPOT_RISE_C * lost_health;

    let soiling = ((GOOD_HEALTH_LIMIT - health) / GOOD_HEALTH_LIMIT).max(0.0);
    let irradiance_w_m2 = STC_IRRADIANCE_W_M2 * (1.0 - MAX_SOILING_LOSS * soiling);

    ElectricalReading {
        voltage_v,
        current_a,
        power_w,
        temperature_c,
        efficiency_percent,
        irradiance_w_m2,
    }
}

/// Draw a voltage jitter fraction, normally distributed and clamped to `±max_jitter`
pub fn sample_voltage_jitter<R: Rng>(rng: &mut R, max_jitter: f64) -> f64 {
    let max_jitter = max_jitter.abs();
    match Normal::new(0.0, max_jitter / 2.0) {
        Ok(normal) if max_jitter > 0.0 => normal.sample(rng).clamp(-max_jitter, max_jitter),
        _ => 0.0,
    }
}

fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t.clamp(0.0, 1.0)
}

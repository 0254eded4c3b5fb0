//! Photovoltaic series-string simulator.
//!
//! Produces per-panel voltage, current, power and health for tables of panels
//! wired as two series strings, injects faults, propagates them down the string
//! and walks them through a timed repair.

pub mod config;
pub mod controller;
pub mod domain;
pub mod simulation;
pub mod telemetry;

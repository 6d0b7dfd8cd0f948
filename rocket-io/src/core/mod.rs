//! Core abstractions shared by both streams.
//!
//! - [`types`]: Telemetry, IMU and command data structures
//! - [`state`]: Thread-safe robot state with joint velocity estimation

pub mod state;
pub mod types;

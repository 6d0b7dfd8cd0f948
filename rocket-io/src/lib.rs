//! RocketIO - UDP telemetry ingest and telemetry-paced command streaming
//!
//! The robot streams 60-byte telemetry datagrams (joint encoders + IMU) at a
//! high fixed rate. RocketIO keeps a thread-safe estimate of the robot state
//! from them and sends 24-byte joint commands back once every `divisor`
//! telemetry packets, so the command rate follows the data, not a clock.
//!
//! ```text
//! robot ──telemetry──▶ StateReceiver ──▶ RobotState ──▶ CommandPolicy
//!                           │ tick                           │
//!                           ▼                                ▼
//!                      RateDivider ───────fire──────▶ CommandSender ──▶ robot
//! ```
//!
//! [`Rocket`] owns one session: both stream threads, the robot state and the
//! divider.

pub mod config;
pub mod core;
pub mod error;
pub mod policy;
pub mod rocket;
pub mod streaming;
pub mod timing;

// Re-export commonly used types
pub use config::Config;
pub use crate::core::state::{RobotState, StateSnapshot};
pub use crate::core::types::{ImuSample, JointCommand, TelemetryPacket};
pub use error::{DecodeError, EncodeError, Error, Result};
pub use policy::{CommandPolicy, ConstantModel, InferenceModel, JointLimits, ObservationPolicy};
pub use rocket::Rocket;
pub use streaming::{StatsSnapshot, StreamState};
pub use timing::RateDivider;

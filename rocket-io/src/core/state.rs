//! Thread-safe robot state shared between the two streams.
//!
//! The state receive loop is the single writer; the command policy (and any
//! other observer) reads through [`RobotState::to_observation`] or
//! [`RobotState::snapshot`]. Every access holds one lock for the whole read
//! or write, so a reader never sees fields from two different packets.

use crate::core::types::{NUM_JOINTS, OBSERVATION_BASE_LEN, TelemetryPacket};
use parking_lot::Mutex;
use std::time::Instant;

/// Smallest `dt` (seconds) accepted for finite-difference velocity
pub const MIN_VELOCITY_DT_S: f64 = 1e-6;

/// Point-in-time copy of the robot state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StateSnapshot {
    /// Arrival time of the latest telemetry (None until the first update)
    pub timestamp: Option<Instant>,
    pub joint_angle: [f32; NUM_JOINTS],
    /// Finite-difference joint velocity (units per second)
    pub joint_velocity: [f32; NUM_JOINTS],
    pub accel: [f32; 3],
    pub gyro: [f32; 3],
    pub mag: [f32; 3],
}

#[derive(Debug, Default)]
struct StateInner {
    current: StateSnapshot,
    last_joint_angle: [f32; NUM_JOINTS],
    update_count: u64,
}

/// Latest decoded telemetry plus derived joint velocity
#[derive(Debug, Default)]
pub struct RobotState {
    inner: Mutex<StateInner>,
}

impl RobotState {
    /// Create an all-zero state with no timestamp
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one telemetry packet received at `now`.
    ///
    /// Joint velocity is only recomputed when a previous timestamp exists and
    /// `now` is later than it by more than [`MIN_VELOCITY_DT_S`]; otherwise
    /// the previous velocity is kept.
    pub fn update(&self, telemetry: &TelemetryPacket, now: Instant) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let dt = inner
            .current
            .timestamp
            .and_then(|prev| now.checked_duration_since(prev))
            .map(|d| d.as_secs_f64());

        let new_angles = telemetry.joint_positions;
        if let Some(dt) = dt
            && dt > MIN_VELOCITY_DT_S
        {
            for (i, vel) in inner.current.joint_velocity.iter_mut().enumerate() {
                *vel = ((new_angles[i] as f64 - inner.last_joint_angle[i] as f64) / dt) as f32;
            }
        }

        inner.current.timestamp = Some(now);
        inner.current.joint_angle = new_angles;
        inner.current.accel = telemetry.imu.accel;
        inner.current.gyro = telemetry.imu.gyro;
        inner.current.mag = telemetry.imu.mag;
        inner.last_joint_angle = new_angles;
        inner.update_count += 1;
    }

    /// Observation vector: `[joint_angle, joint_velocity, gyro, accel, mag]`,
    /// followed by `last_action` when given.
    ///
    /// Consuming policies are trained against this exact order.
    pub fn to_observation(&self, last_action: Option<&[f32; NUM_JOINTS]>) -> Vec<f32> {
        let mut obs = Vec::with_capacity(OBSERVATION_BASE_LEN + NUM_JOINTS);
        {
            let inner = self.inner.lock();
            let s = &inner.current;
            obs.extend_from_slice(&s.joint_angle);
            obs.extend_from_slice(&s.joint_velocity);
            obs.extend_from_slice(&s.gyro);
            obs.extend_from_slice(&s.accel);
            obs.extend_from_slice(&s.mag);
        }
        if let Some(action) = last_action {
            obs.extend_from_slice(action);
        }
        obs
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> StateSnapshot {
        self.inner.lock().current
    }

    /// Whether at least one telemetry packet has been applied
    pub fn has_data(&self) -> bool {
        self.inner.lock().current.timestamp.is_some()
    }

    /// Number of telemetry packets applied so far
    pub fn update_count(&self) -> u64 {
        self.inner.lock().update_count
    }
}

//! Core data types for telemetry and joint commands.
//!
//! Key types:
//! - [`TelemetryPacket`]: One decoded telemetry datagram (joint encoders + IMU)
//! - [`ImuSample`]: Accelerometer, gyroscope and magnetometer triplets
//! - [`JointCommand`]: Joint-angle targets produced by the command policy

/// Number of actuated joints
pub const NUM_JOINTS: usize = 6;

/// Floats per telemetry packet: 6 joints + accel(3) + gyro(3) + mag(3)
pub const TELEMETRY_FLOATS: usize = NUM_JOINTS + 9;

/// Telemetry wire size in bytes
pub const TELEMETRY_PACKET_SIZE: usize = TELEMETRY_FLOATS * 4;

/// Command wire size in bytes
pub const COMMAND_PACKET_SIZE: usize = NUM_JOINTS * 4;

/// Length of the observation vector without the trailing last action:
/// joint angle(6) + joint velocity(6) + gyro(3) + accel(3) + mag(3)
pub const OBSERVATION_BASE_LEN: usize = 2 * NUM_JOINTS + 9;

/// IMU sample carried in every telemetry packet
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImuSample {
    /// Accelerometer (x, y, z)
    pub accel: [f32; 3],
    /// Gyroscope (x, y, z)
    pub gyro: [f32; 3],
    /// Magnetometer (x, y, z)
    pub mag: [f32; 3],
}

impl ImuSample {
    /// Create a new IMU sample
    pub fn new(accel: [f32; 3], gyro: [f32; 3], mag: [f32; 3]) -> Self {
        Self { accel, gyro, mag }
    }
}

/// Decoded telemetry datagram
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetryPacket {
    /// Joint encoder positions
    pub joint_positions: [f32; NUM_JOINTS],
    /// IMU reading taken with the joint positions
    pub imu: ImuSample,
}

impl TelemetryPacket {
    /// Create a new telemetry packet
    pub fn new(joint_positions: [f32; NUM_JOINTS], imu: ImuSample) -> Self {
        Self {
            joint_positions,
            imu,
        }
    }

    /// Flatten to wire order: joints, accel, gyro, mag
    pub fn to_floats(&self) -> [f32; TELEMETRY_FLOATS] {
        let mut out = [0.0f32; TELEMETRY_FLOATS];
        out[..6].copy_from_slice(&self.joint_positions);
        out[6..9].copy_from_slice(&self.imu.accel);
        out[9..12].copy_from_slice(&self.imu.gyro);
        out[12..15].copy_from_slice(&self.imu.mag);
        out
    }

    /// Build from wire-ordered floats
    pub fn from_floats(vals: &[f32; TELEMETRY_FLOATS]) -> Self {
        let mut joint_positions = [0.0f32; NUM_JOINTS];
        joint_positions.copy_from_slice(&vals[..6]);
        let mut imu = ImuSample::default();
        imu.accel.copy_from_slice(&vals[6..9]);
        imu.gyro.copy_from_slice(&vals[9..12]);
        imu.mag.copy_from_slice(&vals[12..15]);
        Self {
            joint_positions,
            imu,
        }
    }
}

/// Joint-angle command for one control step
///
/// The angle count is not enforced here; the wire encoder rejects anything
/// other than [`NUM_JOINTS`] angles.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JointCommand {
    pub joint_angles: Vec<f32>,
}

impl JointCommand {
    /// Create a new command
    pub fn new(joint_angles: Vec<f32>) -> Self {
        Self { joint_angles }
    }
}

impl From<[f32; NUM_JOINTS]> for JointCommand {
    fn from(angles: [f32; NUM_JOINTS]) -> Self {
        Self {
            joint_angles: angles.to_vec(),
        }
    }
}

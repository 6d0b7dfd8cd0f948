//! Fixed binary wire format for telemetry and commands
//!
//! # Telemetry (robot → host, UDP state port)
//!
//! ```text
//! ┌────────────────────────┬──────────────┬──────────────┬──────────────┐
//! │ joint0..joint5         │ accel x,y,z  │ gyro x,y,z   │ mag x,y,z    │
//! │ 6 × f32 LE (24 bytes)  │ 3 × f32 LE   │ 3 × f32 LE   │ 3 × f32 LE   │
//! └────────────────────────┴──────────────┴──────────────┴──────────────┘
//!                           60 bytes total
//! ```
//!
//! # Command (host → robot, UDP command port)
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │ joint0..joint5 target angle            │
//! │ 6 × f32 LE (24 bytes)                  │
//! └────────────────────────────────────────┘
//! ```
//!
//! There is no header, framing or checksum: one datagram carries exactly one
//! packet, so the datagram length is the only validation. Values are not
//! range-checked.

use crate::core::types::{
    COMMAND_PACKET_SIZE, JointCommand, NUM_JOINTS, TELEMETRY_FLOATS, TELEMETRY_PACKET_SIZE,
    TelemetryPacket,
};
use crate::error::{DecodeError, EncodeError};

/// Decode one telemetry datagram.
///
/// Fails without producing a partial packet when `bytes` is not exactly
/// [`TELEMETRY_PACKET_SIZE`] long.
pub fn decode_telemetry(bytes: &[u8]) -> Result<TelemetryPacket, DecodeError> {
    let vals = read_floats::<TELEMETRY_FLOATS>(bytes)?;
    Ok(TelemetryPacket::from_floats(&vals))
}

/// Encode a telemetry packet (robot side; used by simulators and tests)
pub fn encode_telemetry(telemetry: &TelemetryPacket) -> [u8; TELEMETRY_PACKET_SIZE] {
    let mut out = [0u8; TELEMETRY_PACKET_SIZE];
    write_floats(&telemetry.to_floats(), &mut out);
    out
}

/// Encode a joint command into its 24-byte wire form
pub fn encode_command(cmd: &JointCommand) -> Result<[u8; COMMAND_PACKET_SIZE], EncodeError> {
    if cmd.joint_angles.len() != NUM_JOINTS {
        return Err(EncodeError::ArityMismatch {
            expected: NUM_JOINTS,
            actual: cmd.joint_angles.len(),
        });
    }
    let mut out = [0u8; COMMAND_PACKET_SIZE];
    write_floats(&cmd.joint_angles, &mut out);
    Ok(out)
}

/// Decode a command datagram (robot side; used by simulators and tests)
pub fn decode_command(bytes: &[u8]) -> Result<JointCommand, DecodeError> {
    let vals = read_floats::<NUM_JOINTS>(bytes)?;
    Ok(JointCommand::new(vals.to_vec()))
}

fn read_floats<const N: usize>(bytes: &[u8]) -> Result<[f32; N], DecodeError> {
    if bytes.len() != N * 4 {
        return Err(DecodeError::LengthMismatch {
            expected: N * 4,
            actual: bytes.len(),
        });
    }
    let mut vals = [0.0f32; N];
    for (val, chunk) in vals.iter_mut().zip(bytes.chunks_exact(4)) {
        *val = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(vals)
}

#[inline]
fn write_floats(vals: &[f32], out: &mut [u8]) {
    for (chunk, val) in out.chunks_exact_mut(4).zip(vals) {
        chunk.copy_from_slice(&val.to_le_bytes());
    }
}

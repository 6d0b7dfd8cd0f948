//! UDP streaming for RocketIO
//!
//! - [`state_receiver`]: telemetry in, robot state + divider ticks out
//! - [`command_sender`]: divider fires in, joint commands out
//! - [`wire`]: fixed little-endian packet layouts
//! - [`lifecycle`]: Idle/Running/Stopping/Stopped thread ownership

pub mod command_sender;
pub mod lifecycle;
pub mod state_receiver;
pub mod wire;

pub use command_sender::{CommandSender, SendLoopExit};
pub use lifecycle::{StreamHandle, StreamState};
pub use state_receiver::{StateReceiver, TelemetryObserver};
pub use wire::{decode_command, decode_telemetry, encode_command, encode_telemetry};

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by both streams of a session
#[derive(Debug, Default)]
pub struct StreamStats {
    pub packets_received: AtomicU64,
    pub decode_errors: AtomicU64,
    pub commands_sent: AtomicU64,
    pub send_errors: AtomicU64,
}

/// Plain copy of [`StreamStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub packets_received: u64,
    pub decode_errors: u64,
    pub commands_sent: u64,
    pub send_errors: u64,
}

impl StreamStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
        }
    }
}

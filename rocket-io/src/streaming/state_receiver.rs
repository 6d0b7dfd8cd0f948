//! UDP receiver for robot telemetry.
//!
//! Blocks on the state socket with a short read timeout, decodes each
//! datagram, applies it to [`RobotState`], ticks the attached
//! [`RateDivider`] and hands the decoded packet to the telemetry observer.
//!
//! Malformed datagrams are logged and dropped; the loop only exits when the
//! stop flag is raised. The read timeout bounds how long `stop()` waits when
//! no telemetry is arriving.

use crate::core::state::RobotState;
use crate::core::types::TelemetryPacket;
use crate::error::{DecodeError, Error, Result};
use crate::streaming::StreamStats;
use crate::streaming::wire::decode_telemetry;
use crate::timing::RateDivider;
use std::net::UdpSocket;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Callback invoked with every successfully decoded telemetry packet
pub type TelemetryObserver = Box<dyn FnMut(&TelemetryPacket) + Send>;

/// Receive buffer size. Larger than one packet so oversized datagrams are
/// seen at their real length instead of being truncated to 60 bytes.
const MAX_DATAGRAM_SIZE: usize = 2048;

/// Telemetry receive loop
pub struct StateReceiver {
    socket: UdpSocket,
    state: Arc<RobotState>,
    divider: Option<Arc<RateDivider>>,
    observer: Option<TelemetryObserver>,
    stats: Arc<StreamStats>,
}

impl StateReceiver {
    /// Wrap an already-bound socket.
    ///
    /// `recv_timeout` must be non-zero; it is how often the stop flag is
    /// checked when the robot is silent.
    pub fn new(
        socket: UdpSocket,
        recv_timeout: Duration,
        state: Arc<RobotState>,
        stats: Arc<StreamStats>,
    ) -> Result<Self> {
        if recv_timeout.is_zero() {
            return Err(Error::InvalidParameter(
                "state receive timeout must be non-zero".to_string(),
            ));
        }
        socket.set_read_timeout(Some(recv_timeout))?;

        Ok(Self {
            socket,
            state,
            divider: None,
            observer: None,
            stats,
        })
    }

    /// Tick `divider` once per decoded packet
    pub fn with_divider(mut self, divider: Arc<RateDivider>) -> Self {
        self.divider = Some(divider);
        self
    }

    /// Notify `observer` of every decoded packet
    pub fn with_observer(mut self, observer: TelemetryObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Run until `stopping` is raised
    pub fn run(mut self, stopping: Arc<AtomicBool>) {
        log::info!(
            "State stream started on {}",
            self.socket
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "<unbound>".to_string())
        );

        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];

        while !stopping.load(Ordering::Relaxed) {
            let (len, src) = match self.socket.recv_from(&mut buffer) {
                Ok(result) => result,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => {
                    log::error!("State socket recv error: {}", e);
                    continue;
                }
            };

            if let Err(e) = self.handle_datagram(&buffer[..len], Instant::now()) {
                self.stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                log::warn!("Dropping telemetry from {}: {}", src, e);
            }
        }

        log::info!(
            "State stream stopped ({} packets, {} dropped)",
            self.stats.packets_received.load(Ordering::Relaxed),
            self.stats.decode_errors.load(Ordering::Relaxed)
        );
    }

    /// Decode one datagram and fan it out. Nothing is touched on error.
    fn handle_datagram(
        &mut self,
        bytes: &[u8],
        now: Instant,
    ) -> std::result::Result<(), DecodeError> {
        let telemetry = decode_telemetry(bytes)?;

        self.state.update(&telemetry, now);
        if let Some(divider) = &self.divider {
            divider.tick();
        }
        if let Some(observer) = self.observer.as_mut() {
            observer(&telemetry);
        }

        let n = self.stats.packets_received.fetch_add(1, Ordering::Relaxed) + 1;
        log::trace!("Telemetry #{}: joints={:?}", n, telemetry.joint_positions);
        Ok(())
    }
}

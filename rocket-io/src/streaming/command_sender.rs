//! UDP sender for joint commands.
//!
//! Paced by [`RateDivider`] fires rather than a timer:
//!
//! ```text
//! loop:
//!   wait_for_fire(timeout) ── false ──▶ warn "pacing lost", exit
//!        │ true
//!   policy.next_command() ─── Err ───▶ error, exit
//!   encode_command()      ─── Err ───▶ error, exit
//!   send_to(robot)        ─── Err ───▶ warn, keep going (best effort)
//! ```
//!
//! Every exit leaves the stream Stopped; nothing restarts it automatically.
//! The policy call is not cancellable, so a policy that hangs also delays
//! `stop()`.

use crate::error::{Error, Result};
use crate::policy::CommandPolicy;
use crate::streaming::StreamStats;
use crate::streaming::wire::encode_command;
use crate::timing::RateDivider;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Why the command loop exited
#[derive(Debug)]
pub enum SendLoopExit {
    /// Stop flag raised by the owner
    Stopped,
    /// No divider fire within the timeout
    PacingLost,
    /// Policy or encoder failed
    Failed(Error),
}

/// Telemetry-paced command loop
pub struct CommandSender<P> {
    socket: UdpSocket,
    target: SocketAddr,
    divider: Arc<RateDivider>,
    fire_timeout: Duration,
    policy: P,
    stats: Arc<StreamStats>,
}

impl<P: CommandPolicy> CommandSender<P> {
    pub fn new(
        socket: UdpSocket,
        target: SocketAddr,
        divider: Arc<RateDivider>,
        fire_timeout: Duration,
        policy: P,
        stats: Arc<StreamStats>,
    ) -> Result<Self> {
        if fire_timeout.is_zero() {
            return Err(Error::InvalidParameter(
                "command fire timeout must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            socket,
            target,
            divider,
            fire_timeout,
            policy,
            stats,
        })
    }

    /// Run until stopped, pacing is lost, or the policy fails
    pub fn run(mut self, stopping: Arc<AtomicBool>) -> SendLoopExit {
        log::info!(
            "Command stream started -> {} (divisor {}, fire timeout {:?})",
            self.target,
            self.divider.divisor(),
            self.fire_timeout
        );

        let exit = loop {
            if stopping.load(Ordering::Relaxed) {
                break SendLoopExit::Stopped;
            }

            if !self.divider.wait_for_fire(self.fire_timeout) {
                if stopping.load(Ordering::Relaxed) {
                    break SendLoopExit::Stopped;
                }
                log::warn!(
                    "No telemetry fire within {:?}; stopping command stream",
                    self.fire_timeout
                );
                break SendLoopExit::PacingLost;
            }

            if let Err(e) = self.send_next() {
                log::error!("Error in command stream: {}", e);
                break SendLoopExit::Failed(e);
            }
        };

        log::info!(
            "Command stream stopped ({} commands sent)",
            self.stats.commands_sent.load(Ordering::Relaxed)
        );
        exit
    }

    /// Produce, encode and transmit one command
    fn send_next(&mut self) -> Result<()> {
        let cmd = self.policy.next_command()?;
        let packet = encode_command(&cmd)?;

        match self.socket.send_to(&packet, self.target) {
            Ok(_) => {
                let n = self.stats.commands_sent.fetch_add(1, Ordering::Relaxed) + 1;
                log::trace!("Command #{} sent: {:?}", n, cmd.joint_angles);
            }
            Err(e) => {
                self.stats.send_errors.fetch_add(1, Ordering::Relaxed);
                log::warn!("Failed to send command to {}: {}", self.target, e);
            }
        }
        Ok(())
    }
}

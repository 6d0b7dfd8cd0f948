//! Session supervisor for the state and command streams.
//!
//! [`Rocket`] owns everything one control session shares: the robot state,
//! the rate divider and both stream threads.
//!
//! ```text
//!            ┌──────────── Rocket ─────────────┐
//! robot ───▶ │ StateReceiver ──tick──▶ RateDivider
//!  :state    │      │ update               │ fire
//!            │      ▼                      ▼
//!            │  RobotState ◀──read── CommandSender ──▶ robot :command
//!            └─────────────────────────────────┘
//! ```
//!
//! Sockets are bound in `start_*`, so setup failures come back to the
//! caller before any thread exists. Each stream starts at most once per
//! session; a stream that stops itself stays stopped.

use crate::config::Config;
use crate::core::state::RobotState;
use crate::core::types::TelemetryPacket;
use crate::error::{Error, Result};
use crate::policy::CommandPolicy;
use crate::streaming::command_sender::{CommandSender, SendLoopExit};
use crate::streaming::lifecycle::{StreamHandle, StreamState};
use crate::streaming::state_receiver::StateReceiver;
use crate::streaming::{StatsSnapshot, StreamStats};
use crate::timing::RateDivider;
use parking_lot::Mutex;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

const STATE_THREAD: &str = "rocket-state";
const COMMAND_THREAD: &str = "rocket-command";

/// Robot controller session
pub struct Rocket {
    config: Config,
    state: Arc<RobotState>,
    divider: Arc<RateDivider>,
    stats: Arc<StreamStats>,
    state_stream: Option<StreamHandle>,
    command_stream: Option<StreamHandle>,
    command_exit: Arc<Mutex<Option<SendLoopExit>>>,
    state_local_addr: Option<SocketAddr>,
}

impl Rocket {
    /// Validate `config` and set up the shared state. Binds nothing.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let divider = RateDivider::new(config.control.divisor)?;

        Ok(Self {
            config,
            state: Arc::new(RobotState::new()),
            divider: Arc::new(divider),
            stats: Arc::new(StreamStats::default()),
            state_stream: None,
            command_stream: None,
            command_exit: Arc::new(Mutex::new(None)),
            state_local_addr: None,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared robot state, for policies and observers
    pub fn state(&self) -> Arc<RobotState> {
        Arc::clone(&self.state)
    }

    pub fn divider(&self) -> Arc<RateDivider> {
        Arc::clone(&self.divider)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Address the state socket is bound to, once the state stream started
    pub fn state_local_addr(&self) -> Option<SocketAddr> {
        self.state_local_addr
    }

    /// Bind the state port and start receiving telemetry.
    ///
    /// `on_update` runs on the state thread for every decoded packet, after
    /// the robot state and the divider have been updated.
    pub fn start_state_stream<F>(&mut self, on_update: F) -> Result<()>
    where
        F: FnMut(&TelemetryPacket) + Send + 'static,
    {
        if self.state_stream.is_some() {
            return Err(Error::AlreadyStarted("state"));
        }

        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.config.network.state_port));
        let socket = UdpSocket::bind(bind_addr)?;
        let local_addr = socket.local_addr()?;

        let receiver = StateReceiver::new(
            socket,
            self.config.control.recv_timeout(),
            Arc::clone(&self.state),
            Arc::clone(&self.stats),
        )?
        .with_divider(Arc::clone(&self.divider))
        .with_observer(Box::new(on_update));

        self.state_stream = Some(StreamHandle::spawn(STATE_THREAD, move |stopping| {
            receiver.run(stopping)
        })?);
        self.state_local_addr = Some(local_addr);

        log::info!("State stream listening on {}", local_addr);
        Ok(())
    }

    /// Resolve the robot address and start sending paced commands.
    ///
    /// The loop ends on its own if no divider fire arrives within
    /// `fire_timeout`, or if `policy` fails.
    pub fn start_command_stream<P>(&mut self, policy: P, fire_timeout: Duration) -> Result<()>
    where
        P: CommandPolicy + 'static,
    {
        if self.command_stream.is_some() {
            return Err(Error::AlreadyStarted("command"));
        }

        let target = self.resolve_robot()?;
        let local = match target {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        };
        let socket = UdpSocket::bind(local)?;

        let sender = CommandSender::new(
            socket,
            target,
            Arc::clone(&self.divider),
            fire_timeout,
            policy,
            Arc::clone(&self.stats),
        )?;

        let exit_slot = Arc::clone(&self.command_exit);
        self.command_stream = Some(StreamHandle::spawn(COMMAND_THREAD, move |stopping| {
            let exit = sender.run(stopping);
            log::debug!("Command loop exited: {:?}", exit);
            *exit_slot.lock() = Some(exit);
        })?);

        log::info!("Command stream sending to {}", target);
        Ok(())
    }

    /// Stop the state stream. No-op if it was never started.
    pub fn stop_state_stream(&mut self) -> Result<()> {
        match self.state_stream.as_mut() {
            Some(stream) => stream.stop(),
            None => Ok(()),
        }
    }

    /// Stop the command stream. No-op if it was never started.
    pub fn stop_command_stream(&mut self) -> Result<()> {
        match self.command_stream.as_mut() {
            Some(stream) => stream.stop(),
            None => Ok(()),
        }
    }

    pub fn state_stream_status(&self) -> StreamState {
        self.state_stream
            .as_ref()
            .map_or(StreamState::Idle, StreamHandle::state)
    }

    pub fn command_stream_status(&self) -> StreamState {
        self.command_stream
            .as_ref()
            .map_or(StreamState::Idle, StreamHandle::state)
    }

    /// Why the command loop exited, once it has.
    ///
    /// Set before the stream reports [`StreamState::Stopped`] on its own.
    /// The reason is handed out once; later calls return `None`.
    pub fn take_command_stream_exit(&self) -> Option<SendLoopExit> {
        self.command_exit.lock().take()
    }

    /// Stop both streams, command first.
    ///
    /// Both are always stopped; the first error is returned.
    pub fn shutdown(&mut self) -> Result<()> {
        let command = self.stop_command_stream();
        let state = self.stop_state_stream();
        command.and(state)
    }

    fn resolve_robot(&self) -> Result<SocketAddr> {
        let net = &self.config.network;
        (net.robot_address.as_str(), net.command_port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                Error::Config(format!(
                    "robot address {}:{} did not resolve",
                    net.robot_address, net.command_port
                ))
            })
    }
}

impl Drop for Rocket {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

//! RocketIO - joint command daemon for a 6-joint actuator
//!
//! Listens for robot telemetry on the state port and streams joint commands
//! back to the robot's command port, one command per `divisor` telemetry
//! packets. Without an inference engine attached, the command stream holds
//! the configured `default_joints`.
//!
//! ```bash
//! rocket-io --robot-ip 192.168.1.20
//! rocket-io --config rocket.toml --divisor 3 --verbose
//! ```

use clap::Parser;
use crossbeam_channel::{RecvTimeoutError, bounded};
use rocket_io::core::types::TelemetryPacket;
use rocket_io::error::{Error, Result};
use rocket_io::streaming::SendLoopExit;
use rocket_io::{Config, ConstantModel, ObservationPolicy, Rocket, StreamState};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// How often the main thread checks whether the command stream gave up
const SUPERVISE_INTERVAL: Duration = Duration::from_millis(200);

/// Interval between telemetry rate reports at debug level
const RATE_REPORT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Robot IP address or host name
    #[arg(long)]
    robot_ip: Option<String>,

    /// Robot UDP port for joint commands
    #[arg(long)]
    command_port: Option<u16>,

    /// Local UDP port for telemetry
    #[arg(long)]
    state_port: Option<u16>,

    /// Expected telemetry message size in bytes
    #[arg(long)]
    state_msg_size: Option<usize>,

    /// Telemetry packets per command
    #[arg(long)]
    divisor: Option<u32>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Overlay command line values on `config`
    fn apply(&self, config: &mut Config) {
        if let Some(ip) = &self.robot_ip {
            config.network.robot_address = ip.clone();
        }
        if let Some(port) = self.command_port {
            config.network.command_port = port;
        }
        if let Some(port) = self.state_port {
            config.network.state_port = port;
        }
        if let Some(size) = self.state_msg_size {
            config.network.state_msg_size = size;
        }
        if let Some(divisor) = self.divisor {
            config.control.divisor = divisor;
        }
        if self.verbose {
            config.logging.verbose = true;
        }
    }
}

/// Per-packet trace log plus a periodic rate report
fn telemetry_logger() -> impl FnMut(&TelemetryPacket) + Send + 'static {
    let mut window_start = Instant::now();
    let mut window_packets = 0u32;

    move |telemetry: &TelemetryPacket| {
        log::trace!(
            "joints={:?} gyro={:?}",
            telemetry.joint_positions,
            telemetry.imu.gyro
        );

        window_packets += 1;
        let elapsed = window_start.elapsed();
        if elapsed >= RATE_REPORT_INTERVAL {
            log::debug!(
                "Telemetry rate: {:.1} Hz",
                window_packets as f64 / elapsed.as_secs_f64()
            );
            window_start = Instant::now();
            window_packets = 0;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    args.apply(&mut config);

    let level = if config.logging.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    log::info!("RocketIO v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &args.config {
        log::info!("Using config: {}", path.display());
    }
    config.validate()?;

    // Set up shutdown signal handler
    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        let _ = shutdown_tx.try_send(());
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let mut rocket = Rocket::new(config)?;
    let cfg = rocket.config().clone();

    rocket.start_state_stream(telemetry_logger())?;

    let mut policy = ObservationPolicy::new(
        rocket.state(),
        ConstantModel::new(cfg.policy.default_joints.clone()),
    )
    .with_action_scale(cfg.policy.action_scale);
    if let Some(limits) = cfg.policy.limits()? {
        policy = policy.with_limits(limits);
    }
    rocket.start_command_stream(policy, cfg.control.fire_timeout())?;

    log::info!(
        "RocketIO running (robot {}:{}, divisor {}). Press Ctrl-C to stop.",
        cfg.network.robot_address,
        cfg.network.command_port,
        cfg.control.divisor
    );

    loop {
        match shutdown_rx.recv_timeout(SUPERVISE_INTERVAL) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if rocket.command_stream_status() == StreamState::Stopped {
                    match rocket.take_command_stream_exit() {
                        Some(SendLoopExit::PacingLost) => {
                            log::warn!("Command stream lost telemetry pacing; shutting down")
                        }
                        Some(SendLoopExit::Failed(e)) => {
                            log::error!("Command stream failed: {}; shutting down", e)
                        }
                        _ => log::warn!("Command stream terminated; shutting down"),
                    }
                    break;
                }
            }
        }
    }

    log::info!("Shutting down...");
    let result = rocket.shutdown();
    let stats = rocket.stats();
    log::info!(
        "RocketIO stopped ({} telemetry packets, {} dropped, {} commands sent)",
        stats.packets_received,
        stats.decode_errors,
        stats.commands_sent
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_file_values() {
        let args = Args::parse_from([
            "rocket-io",
            "--robot-ip",
            "10.0.0.7",
            "--command-port",
            "16001",
            "--divisor",
            "3",
            "--verbose",
        ]);
        let mut config = Config::default();
        config.network.state_port = 17002;
        args.apply(&mut config);

        assert_eq!(config.network.robot_address, "10.0.0.7");
        assert_eq!(config.network.command_port, 16001);
        assert_eq!(config.network.state_port, 17002);
        assert_eq!(config.control.divisor, 3);
        assert!(config.logging.verbose);
    }

    #[test]
    fn test_bad_msg_size_fails_validation() {
        let args = Args::parse_from(["rocket-io", "--state-msg-size", "64"]);
        let mut config = Config::default();
        args.apply(&mut config);
        assert!(config.validate().is_err());
    }
}

//! Loopback UDP tests for the state and command streams.
//!
//! Each test plays the robot with plain sockets on 127.0.0.1 and drives a
//! [`Rocket`] session bound to ephemeral ports.
//!
//! Run with: `cargo test --test loopback`

use approx::assert_relative_eq;
use crossbeam_channel::{Receiver, unbounded};
use rocket_io::core::types::{COMMAND_PACKET_SIZE, NUM_JOINTS};
use rocket_io::streaming::{SendLoopExit, decode_command, encode_telemetry};
use rocket_io::{
    Config, ConstantModel, Error, ImuSample, JointCommand, ObservationPolicy, Result, Rocket,
    StreamState, TelemetryPacket,
};
use std::net::{SocketAddr, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(2);

// ============================================================================
// Helpers
// ============================================================================

/// Fake robot: sends telemetry, receives commands
struct Robot {
    socket: UdpSocket,
}

impl Robot {
    fn new() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(WAIT)).unwrap();
        Self { socket }
    }

    fn port(&self) -> u16 {
        self.socket.local_addr().unwrap().port()
    }

    fn send_joints(&self, to: SocketAddr, joints: [f32; NUM_JOINTS]) {
        let pkt = TelemetryPacket::new(joints, ImuSample::default());
        self.socket.send_to(&encode_telemetry(&pkt), to).unwrap();
    }

    fn recv_command(&self) -> Option<JointCommand> {
        let mut buf = [0u8; 256];
        let (len, _) = self.socket.recv_from(&mut buf).ok()?;
        assert_eq!(len, COMMAND_PACKET_SIZE);
        Some(decode_command(&buf[..len]).unwrap())
    }
}

fn session_config(robot: &Robot, divisor: u32) -> Config {
    let mut config = Config::default();
    config.network.robot_address = "127.0.0.1".to_string();
    config.network.command_port = robot.port();
    config.network.state_port = 0;
    config.control.divisor = divisor;
    config.control.recv_timeout_ms = 50;
    config
}

/// Start the state stream with an observer feeding a channel
fn start_observed(rocket: &mut Rocket) -> (SocketAddr, Receiver<TelemetryPacket>) {
    let (tx, rx) = unbounded();
    rocket
        .start_state_stream(move |t: &TelemetryPacket| {
            let _ = tx.send(*t);
        })
        .unwrap();

    let port = rocket.state_local_addr().unwrap().port();
    (SocketAddr::from(([127, 0, 0, 1], port)), rx)
}

fn wait_for_status(rocket: &Rocket, want: StreamState) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if rocket.command_stream_status() == want {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

// ============================================================================
// State stream
// ============================================================================

#[test]
fn test_velocity_from_two_packets() {
    let robot = Robot::new();
    let mut rocket = Rocket::new(session_config(&robot, 6)).unwrap();
    let (state_addr, updates) = start_observed(&mut rocket);
    let state = rocket.state();

    robot.send_joints(state_addr, [0.0; NUM_JOINTS]);
    updates.recv_timeout(WAIT).unwrap();

    let first = state.snapshot();
    assert!(first.timestamp.is_some());
    assert_eq!(first.joint_angle, [0.0; NUM_JOINTS]);
    assert_eq!(first.joint_velocity, [0.0; NUM_JOINTS]);

    thread::sleep(Duration::from_millis(100));
    robot.send_joints(state_addr, [6.0; NUM_JOINTS]);
    updates.recv_timeout(WAIT).unwrap();

    // Scheduling jitter stretches dt, so only the ballpark is fixed
    let second = state.snapshot();
    assert_eq!(second.joint_angle, [6.0; NUM_JOINTS]);
    for v in second.joint_velocity {
        assert!(v > 30.0 && v <= 61.0, "velocity {} out of range", v);
        assert_relative_eq!(v, second.joint_velocity[0]);
    }

    rocket.shutdown().unwrap();
}

#[test]
fn test_malformed_datagram_is_dropped() {
    let robot = Robot::new();
    let mut rocket = Rocket::new(session_config(&robot, 6)).unwrap();
    let (state_addr, updates) = start_observed(&mut rocket);

    robot.socket.send_to(&[0u8; 59], state_addr).unwrap();
    robot.socket.send_to(&[0u8; 61], state_addr).unwrap();
    robot.send_joints(state_addr, [1.5; NUM_JOINTS]);

    // Only the valid packet reaches the observer
    let seen = updates.recv_timeout(WAIT).unwrap();
    assert_eq!(seen.joint_positions, [1.5; NUM_JOINTS]);
    assert!(updates.recv_timeout(Duration::from_millis(100)).is_err());

    let stats = rocket.stats();
    assert_eq!(stats.packets_received, 1);
    assert_eq!(stats.decode_errors, 2);
    assert_eq!(rocket.state_stream_status(), StreamState::Running);
    assert_eq!(rocket.divider().ticks_total(), 1);

    rocket.shutdown().unwrap();
}

#[test]
fn test_stop_without_traffic_is_prompt() {
    let robot = Robot::new();
    let mut rocket = Rocket::new(session_config(&robot, 6)).unwrap();
    start_observed(&mut rocket);
    thread::sleep(Duration::from_millis(20));

    let start = Instant::now();
    rocket.stop_state_stream().unwrap();
    // Bounded by a few 50 ms receive timeouts
    assert!(start.elapsed() < Duration::from_millis(500));
    assert_eq!(rocket.state_stream_status(), StreamState::Stopped);
}

// ============================================================================
// Command stream
// ============================================================================

#[test]
fn test_commands_paced_by_telemetry() {
    let robot = Robot::new();
    let mut rocket = Rocket::new(session_config(&robot, 3)).unwrap();
    let (state_addr, updates) = start_observed(&mut rocket);

    let policy = ObservationPolicy::new(
        rocket.state(),
        ConstantModel::new(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]),
    );
    rocket
        .start_command_stream(policy, Duration::from_secs(1))
        .unwrap();

    // Two full divider periods, each delivered before the next starts
    for period in 0..2 {
        for _ in 0..3 {
            robot.send_joints(state_addr, [period as f32; NUM_JOINTS]);
            updates.recv_timeout(WAIT).unwrap();
        }
        let cmd = robot.recv_command().expect("command per fire");
        assert_eq!(cmd.joint_angles, vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
    }

    // Fewer than a divisor's worth of telemetry produces nothing
    robot.send_joints(state_addr, [2.0; NUM_JOINTS]);
    robot.send_joints(state_addr, [2.0; NUM_JOINTS]);
    robot
        .socket
        .set_read_timeout(Some(Duration::from_millis(150)))
        .unwrap();
    assert!(robot.recv_command().is_none());

    assert_eq!(rocket.stats().commands_sent, 2);
    rocket.shutdown().unwrap();
    assert_eq!(rocket.command_stream_status(), StreamState::Stopped);
}

#[test]
fn test_command_stream_stops_when_telemetry_stops() {
    let robot = Robot::new();
    let mut rocket = Rocket::new(session_config(&robot, 1)).unwrap();
    let (state_addr, updates) = start_observed(&mut rocket);

    let policy = ObservationPolicy::new(rocket.state(), ConstantModel::new(vec![0.0; NUM_JOINTS]));
    rocket
        .start_command_stream(policy, Duration::from_millis(300))
        .unwrap();

    robot.send_joints(state_addr, [0.0; NUM_JOINTS]);
    updates.recv_timeout(WAIT).unwrap();
    assert!(robot.recv_command().is_some());

    // Silence: the command loop gives up, the state loop keeps running
    assert!(wait_for_status(&rocket, StreamState::Stopped));
    assert_eq!(rocket.state_stream_status(), StreamState::Running);
    assert!(matches!(
        rocket.take_command_stream_exit(),
        Some(SendLoopExit::PacingLost)
    ));

    assert!(matches!(
        rocket.start_command_stream(
            || -> Result<JointCommand> { Ok(JointCommand::from([0.0; NUM_JOINTS])) },
            Duration::from_millis(100),
        ),
        Err(Error::AlreadyStarted(_))
    ));

    rocket.shutdown().unwrap();
}

#[test]
fn test_policy_failure_stops_command_stream() {
    let robot = Robot::new();
    let mut rocket = Rocket::new(session_config(&robot, 1)).unwrap();
    let (state_addr, updates) = start_observed(&mut rocket);

    let failing = || -> Result<JointCommand> { Err(Error::Policy("no session".to_string())) };
    rocket
        .start_command_stream(failing, Duration::from_secs(1))
        .unwrap();

    robot.send_joints(state_addr, [0.0; NUM_JOINTS]);
    updates.recv_timeout(WAIT).unwrap();

    assert!(wait_for_status(&rocket, StreamState::Stopped));
    assert!(matches!(
        rocket.take_command_stream_exit(),
        Some(SendLoopExit::Failed(Error::Policy(_)))
    ));
    assert_eq!(rocket.stats().commands_sent, 0);
    assert_eq!(rocket.state_stream_status(), StreamState::Running);

    rocket.shutdown().unwrap();
}

#[test]
fn test_stop_order_does_not_matter() {
    let robot = Robot::new();
    let mut rocket = Rocket::new(session_config(&robot, 6)).unwrap();
    start_observed(&mut rocket);
    rocket
        .start_command_stream(
            || -> Result<JointCommand> { Ok(JointCommand::from([0.0; NUM_JOINTS])) },
            Duration::from_millis(200),
        )
        .unwrap();

    let start = Instant::now();
    rocket.stop_state_stream().unwrap();
    rocket.stop_command_stream().unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));

    assert_eq!(rocket.state_stream_status(), StreamState::Stopped);
    assert_eq!(rocket.command_stream_status(), StreamState::Stopped);
    rocket.shutdown().unwrap();
}

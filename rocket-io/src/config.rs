//! Configuration for RocketIO
//!
//! Loads configuration from a TOML file. Every section and field has a
//! default, so a partial file (or no file at all) is valid:
//!
//! ```toml
//! [network]
//! robot_address = "192.168.1.20"
//! command_port = 15001
//! state_port = 15002
//!
//! [control]
//! divisor = 6
//! ```

use crate::core::types::{NUM_JOINTS, TELEMETRY_PACKET_SIZE};
use crate::error::{Error, Result};
use crate::policy::JointLimits;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub network: NetworkConfig,
    pub control: ControlConfig,
    pub policy: PolicyConfig,
    pub logging: LoggingConfig,
}

/// Robot link endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Robot host name or IP address that commands are sent to
    pub robot_address: String,
    /// Robot UDP port receiving joint commands
    pub command_port: u16,
    /// Local UDP port telemetry arrives on (0 picks an ephemeral port)
    pub state_port: u16,
    /// Expected telemetry datagram size in bytes
    pub state_msg_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            robot_address: "127.0.0.1".to_string(),
            command_port: 15001,
            state_port: 15002,
            state_msg_size: TELEMETRY_PACKET_SIZE,
        }
    }
}

/// Control cadence
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Telemetry packets per command (333 Hz / 6 ≈ 56 Hz)
    pub divisor: u32,
    /// State socket read timeout; bounds state stream shutdown latency
    pub recv_timeout_ms: u64,
    /// Longest wait for a divider fire before the command stream gives up
    pub fire_timeout_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            divisor: 6,
            recv_timeout_ms: 100,
            fire_timeout_ms: 250,
        }
    }
}

impl ControlConfig {
    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    pub fn fire_timeout(&self) -> Duration {
        Duration::from_millis(self.fire_timeout_ms)
    }
}

/// Command policy parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Multiplier applied to raw model outputs
    pub action_scale: f32,
    /// Joint angles held when no inference engine is attached
    pub default_joints: Vec<f32>,
    /// Lower clamp bound per joint
    pub joint_min: Option<[f32; NUM_JOINTS]>,
    /// Upper clamp bound per joint
    pub joint_max: Option<[f32; NUM_JOINTS]>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            action_scale: 1.0,
            default_joints: vec![0.0; NUM_JOINTS],
            joint_min: None,
            joint_max: None,
        }
    }
}

impl PolicyConfig {
    /// Clamp bounds, if both ends are configured
    pub fn limits(&self) -> Result<Option<JointLimits>> {
        match (self.joint_min, self.joint_max) {
            (None, None) => Ok(None),
            (Some(min), Some(max)) => JointLimits::new(min, max).map(Some),
            _ => Err(Error::Config(
                "joint_min and joint_max must be set together".to_string(),
            )),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log at debug level instead of info
    pub verbose: bool,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// The result is not validated; call [`Config::validate`] after applying
    /// any overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Check every value the streams rely on
    pub fn validate(&self) -> Result<()> {
        if self.network.robot_address.trim().is_empty() {
            return Err(Error::Config("robot_address is empty".to_string()));
        }
        if self.network.state_msg_size != TELEMETRY_PACKET_SIZE {
            return Err(Error::Config(format!(
                "state_msg_size must be {} (15 little-endian f32), got {}",
                TELEMETRY_PACKET_SIZE, self.network.state_msg_size
            )));
        }

        if self.control.divisor == 0 {
            return Err(Error::Config("divisor must be at least 1".to_string()));
        }
        if self.control.recv_timeout_ms == 0 {
            return Err(Error::Config("recv_timeout_ms must be non-zero".to_string()));
        }
        if self.control.fire_timeout_ms == 0 {
            return Err(Error::Config("fire_timeout_ms must be non-zero".to_string()));
        }

        if !self.policy.action_scale.is_finite() {
            return Err(Error::Config(format!(
                "action_scale must be finite, got {}",
                self.policy.action_scale
            )));
        }
        if self.policy.default_joints.len() != NUM_JOINTS {
            return Err(Error::Config(format!(
                "default_joints needs {} values, got {}",
                NUM_JOINTS,
                self.policy.default_joints.len()
            )));
        }
        self.policy
            .limits()
            .map_err(|e| Error::Config(e.to_string()))?;

        Ok(())
    }
}

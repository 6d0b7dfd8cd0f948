//! Error types for RocketIO

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Wire decode failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Datagram is not exactly one packet long
    #[error("Packet length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        /// Required packet length in bytes
        expected: usize,
        /// Received datagram length in bytes
        actual: usize,
    },
}

/// Command encode failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// Command does not carry one angle per joint
    #[error("Command arity mismatch: expected {expected} joint angles, got {actual}")]
    ArityMismatch {
        /// Number of joints on the wire
        expected: usize,
        /// Number of angles in the command
        actual: usize,
    },
}

/// RocketIO error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error (socket bind, resolve, send)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed telemetry datagram
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Command could not be put on the wire
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Configuration file could not be read or failed validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Stream was already started in this session
    #[error("{0} stream already started")]
    AlreadyStarted(&'static str),

    /// Policy asked for an observation before any telemetry arrived
    #[error("No robot state available yet")]
    NoState,

    /// Command policy or inference model failure
    #[error("Policy error: {0}")]
    Policy(String),

    /// Worker thread panicked
    #[error("Thread panicked")]
    ThreadPanic,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}

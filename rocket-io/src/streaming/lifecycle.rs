//! Lifecycle shared by the state and command streams.
//!
//! ```text
//! ┌──────┐ spawn ┌─────────┐ stop() ┌──────────┐ loop exit ┌─────────┐
//! │ Idle │──────▶│ Running │───────▶│ Stopping │──────────▶│ Stopped │
//! └──────┘       └─────────┘        └──────────┘           └─────────┘
//!                     │            loop exits on its own         ▲
//!                     └──────────────────────────────────────────┘
//! ```
//!
//! Stopping is cooperative: [`StreamHandle::stop`] raises a flag and joins.
//! Each loop checks the flag between bounded blocking calls, so `stop()`
//! returns within one blocking timeout.

use crate::error::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::{self, JoinHandle};

/// Lifecycle state of one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum StreamState {
    /// Never started
    #[default]
    Idle = 0,
    /// Loop thread is running
    Running = 1,
    /// Stop requested, loop not yet exited
    Stopping = 2,
    /// Loop thread has exited (stopped or self-terminated)
    Stopped = 3,
}

impl StreamState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => StreamState::Running,
            2 => StreamState::Stopping,
            3 => StreamState::Stopped,
            _ => StreamState::Idle,
        }
    }
}

/// Atomic cell holding a [`StreamState`]
#[derive(Debug, Default)]
struct StreamStatus(AtomicU8);

impl StreamStatus {
    fn new() -> Self {
        Self::default()
    }

    fn get(&self) -> StreamState {
        StreamState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: StreamState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Running → Stopping; leaves any other state untouched
    fn begin_stop(&self) {
        let _ = self.0.compare_exchange(
            StreamState::Running as u8,
            StreamState::Stopping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

/// Marks the stream Stopped when the loop thread exits, including by panic
struct ExitGuard(Arc<StreamStatus>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0.set(StreamState::Stopped);
    }
}

/// Owner of one stream's loop thread
pub struct StreamHandle {
    name: &'static str,
    stopping: Arc<AtomicBool>,
    status: Arc<StreamStatus>,
    handle: Option<JoinHandle<()>>,
}

impl StreamHandle {
    /// Spawn `body` on a named thread.
    ///
    /// `body` receives the stop flag it must poll between blocking calls.
    pub fn spawn<F>(name: &'static str, body: F) -> Result<Self>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let stopping = Arc::new(AtomicBool::new(false));
        let status = Arc::new(StreamStatus::new());

        let thread_stopping = Arc::clone(&stopping);
        let thread_status = Arc::clone(&status);
        status.set(StreamState::Running);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _guard = ExitGuard(thread_status);
                body(thread_stopping);
            })
            .map_err(|e| {
                status.set(StreamState::Idle);
                Error::Other(format!("Failed to spawn {} thread: {}", name, e))
            })?;

        Ok(Self {
            name,
            stopping,
            status,
            handle: Some(handle),
        })
    }

    /// Thread name of this stream
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> StreamState {
        self.status.get()
    }

    pub fn is_running(&self) -> bool {
        self.state() == StreamState::Running
    }

    /// Request stop and join the loop thread.
    ///
    /// Idempotent, and returns promptly if the loop already exited.
    pub fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        self.stopping.store(true, Ordering::Relaxed);
        self.status.begin_stop();

        let joined = handle.join();
        self.status.set(StreamState::Stopped);

        match joined {
            Ok(()) => {
                log::debug!("{} thread joined", self.name);
                Ok(())
            }
            Err(_) => {
                log::error!("{} thread panicked", self.name);
                Err(Error::ThreadPanic)
            }
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

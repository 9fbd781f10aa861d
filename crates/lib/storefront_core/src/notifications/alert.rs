//! Audible alert for incoming notifications.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum AlertError {
    /// The platform refuses playback until the user has interacted.
    #[error("alert playback blocked until user interaction")]
    Blocked,

    #[error("alert playback failed: {0}")]
    Failed(String),
}

/// Something that can make a sound.
pub trait AlertSink: Send + Sync {
    fn play(&self) -> Result<(), AlertError>;
}

/// Rings the terminal bell on stderr.
#[derive(Debug, Default)]
pub struct TerminalBell;

impl AlertSink for TerminalBell {
    fn play(&self) -> Result<(), AlertError> {
        let mut stderr = std::io::stderr();
        stderr
            .write_all(b"\x07")
            .and_then(|()| stderr.flush())
            .map_err(|e| AlertError::Failed(e.to_string()))
    }
}

/// Plays nothing.
#[derive(Debug, Default)]
pub struct Silent;

impl AlertSink for Silent {
    fn play(&self) -> Result<(), AlertError> {
        Ok(())
    }
}

/// Best-effort, at most once per event alerting.
///
/// Once the sink reports [`AlertError::Blocked`], alerts are suppressed until
/// [`AlertGate::user_interacted`] is called; from then on they fire again.
/// Alerts suppressed in between are never replayed.
pub struct AlertGate {
    sink: Box<dyn AlertSink>,
    blocked: AtomicBool,
    unlocked: AtomicBool,
}

impl AlertGate {
    pub fn new(sink: impl AlertSink + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            blocked: AtomicBool::new(false),
            unlocked: AtomicBool::new(false),
        }
    }

    pub fn silent() -> Self {
        Self::new(Silent)
    }

    /// Try to play one alert. Returns whether it played.
    pub fn fire(&self) -> bool {
        if self.blocked.load(Ordering::Acquire) && !self.unlocked.load(Ordering::Acquire) {
            return false;
        }
        match self.sink.play() {
            Ok(()) => true,
            Err(AlertError::Blocked) => {
                debug!("alert blocked, waiting for first user interaction");
                self.blocked.store(true, Ordering::Release);
                false
            }
            Err(e) => {
                debug!("{e}");
                false
            }
        }
    }

    /// Record the first (or any) user interaction, arming blocked alerts.
    pub fn user_interacted(&self) {
        self.unlocked.store(true, Ordering::Release);
    }
}

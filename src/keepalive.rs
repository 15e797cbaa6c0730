//! Keeps cached `sudo` credentials fresh for the length of a run.
//!
//! The refresher is a background thread owned by a guard; dropping the guard
//! stops and joins it.

use crate::error::{Result, SplitRouteError};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// Guard for a periodic refresh task.
pub struct KeepAlive {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl KeepAlive {
    /// Validates `sudo` credentials (prompting if needed) and refreshes them
    /// every `interval` until the guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SplitRouteError::CommandFailed`] if the initial `sudo -v`
    /// fails, or [`SplitRouteError::Io`] if `sudo` cannot be run.
    pub fn sudo(interval: Duration) -> Result<Self> {
        let status = Command::new("sudo").arg("-v").status()?;
        if !status.success() {
            return Err(SplitRouteError::CommandFailed {
                command: "sudo -v".to_string(),
                status: status.to_string(),
                stderr: String::new(),
            });
        }
        tracing::debug!(interval_secs = interval.as_secs(), "Started sudo keep-alive");
        Ok(Self::spawn(interval, refresh_sudo))
    }

    /// Runs `refresh` every `interval` on a background thread.
    #[must_use]
    pub fn spawn<F>(interval: Duration, mut refresh: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = std::thread::spawn(move || {
            loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => refresh(),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });
        Self {
            stop: Some(stop),
            handle: Some(handle),
        }
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Keep-alive thread panicked");
            }
        }
    }
}

fn refresh_sudo() {
    let result = Command::new("sudo")
        .args(["-n", "-v"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match result {
        Ok(status) if status.success() => tracing::trace!("Refreshed sudo credentials"),
        Ok(status) => tracing::warn!(%status, "sudo refresh failed"),
        Err(e) => tracing::warn!(error = %e, "sudo refresh failed"),
    }
}

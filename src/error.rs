//! Error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias for splitroute operations.
pub type Result<T> = std::result::Result<T, SplitRouteError>;

/// Errors returned by splitroute operations.
#[derive(Debug, Error)]
pub enum SplitRouteError {
    /// Filesystem I/O failed (typically `PermissionDenied` on `/etc/hosts`).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required configuration input is absent or empty.
    #[error("missing configuration: {what} ({path})")]
    ConfigMissing {
        /// Which input is missing (e.g. `"endpoints"`).
        what: &'static str,
        /// Where it was expected.
        path: PathBuf,
    },

    /// Invalid configuration values.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// DNS produced no IPv4 answer for an endpoint.
    #[error("could not resolve {endpoint} to an IPv4 address")]
    ResolutionFailed {
        /// The endpoint as declared.
        endpoint: String,
    },

    /// The kernel offered no gateway for a resolved address.
    #[error("no gateway found for {address}")]
    GatewayResolutionFailed {
        /// The resolved address.
        address: String,
    },

    /// Auto-detect was requested but no port of the configured type is up.
    #[error("no active interface for hardware port {hardware_port:?}")]
    NoActiveInterface {
        /// The configured hardware port type.
        hardware_port: String,
    },

    /// An external command exited unsuccessfully.
    #[error("`{command}` failed ({status}): {stderr}")]
    CommandFailed {
        /// The command line that was run.
        command: String,
        /// Exit status description.
        status: String,
        /// Captured stderr, trimmed.
        stderr: String,
    },

    /// A required system tool is not on `PATH`.
    #[error("required tool not found on PATH: {0}")]
    MissingTool(String),
}

impl SplitRouteError {
    /// Returns `true` if the underlying I/O error is `PermissionDenied`.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied)
    }

    /// Returns `true` for errors that only affect a single endpoint.
    ///
    /// Everything else aborts the run.
    #[must_use]
    pub const fn is_per_endpoint(&self) -> bool {
        matches!(
            self,
            Self::ResolutionFailed { .. } | Self::GatewayResolutionFailed { .. }
        )
    }
}

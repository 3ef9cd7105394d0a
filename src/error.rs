//! Domain error types for the ephemeral `PostgreSQL` launcher.

use color_eyre::Report;
use thiserror::Error;

/// Result alias for operations that may return a [`PgEphemeralError`].
pub type Result<T> = std::result::Result<T, PgEphemeralError>;

/// Result alias for instance-lifecycle fallible operations.
pub type LaunchResult<T> = std::result::Result<T, LaunchError>;

/// Result alias for configuration fallible operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Top-level error exposed by the crate.
#[derive(Debug, Error)]
pub enum PgEphemeralError {
    /// Indicates launching or managing the instance failed.
    #[error("instance lifecycle failed")]
    Launch(#[from] LaunchError),
    /// Indicates configuration parsing failed.
    #[error("configuration parsing failed")]
    Config(#[from] ConfigError),
}

/// Categorises launch failures so callers can branch on structured errors.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum LaunchErrorKind {
    /// Represents errors without a more specific semantic meaning.
    #[default]
    Other,
    /// Indicates one of the external `PostgreSQL` binaries is missing from
    /// the search path.
    ToolNotFound,
    /// Indicates a setup tool (`initdb`, `createdb`) exited unsuccessfully or
    /// the data directory was unusable.
    SetupFailed,
    /// Indicates the server process exited before accepting connections.
    ServerExited,
    /// Indicates the server did not accept connections within the startup
    /// budget.
    StartupTimeout,
}

/// Captures instance-lifecycle failures.
#[derive(Debug, Error)]
#[error("{report}")]
pub struct LaunchError {
    kind: LaunchErrorKind,
    #[source]
    report: Report,
}

impl LaunchError {
    /// Constructs a new launch error with the provided kind and diagnostic
    /// report.
    #[must_use]
    pub const fn new(kind: LaunchErrorKind, report: Report) -> Self {
        Self { kind, report }
    }

    /// Returns the semantic category for this launch failure.
    #[must_use]
    pub const fn kind(&self) -> LaunchErrorKind {
        self.kind
    }

    /// Extracts the underlying diagnostic report.
    #[must_use]
    pub fn into_report(self) -> Report {
        self.report
    }
}

impl From<Report> for LaunchError {
    fn from(report: Report) -> Self {
        Self::new(LaunchErrorKind::Other, report)
    }
}

impl From<ConfigError> for LaunchError {
    fn from(err: ConfigError) -> Self {
        let ConfigError(report) = err;
        Self::new(LaunchErrorKind::Other, report)
    }
}

/// Captures configuration failures.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ConfigError(#[from] Report);

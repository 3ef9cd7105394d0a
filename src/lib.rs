//! Launches an impromptu `PostgreSQL` server from an already-installed
//! distribution, hassle free.
//!
//! The library owns the lifecycle for picking a working directory, running
//! `initdb`, spawning the `postgres` server process, polling until it accepts
//! connections, and tearing everything down again. Volatile instances leave
//! no traces: their working directory is removed when the handle drops.
//!
//! ```no_run
//! use pg_ephemeral::{EphemeralPostgres, InstanceOptions};
//!
//! # fn main() -> pg_ephemeral::LaunchResult<()> {
//! let instance = EphemeralPostgres::launch(InstanceOptions {
//!     volatile: true,
//!     create_db: Some("somedb".to_owned()),
//!     ..InstanceOptions::default()
//! })?;
//! println!("{}", instance.dsn());
//! # Ok(())
//! # }
//! ```

mod cli;
mod error;
mod instance;
mod observability;
mod options;
mod toolchain;

pub use cli::run;
pub use error::{
    ConfigError, ConfigResult, LaunchError, LaunchErrorKind, LaunchResult, PgEphemeralError,
    Result,
};
pub use instance::{ConnectionInfo, EphemeralPostgres};
pub use options::{
    DEFAULT_PORT, DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_START_TIMEOUT, InstanceOptions,
};
pub use toolchain::Toolchain;

use std::ffi::OsString;
use std::time::Duration;

use camino::Utf8PathBuf;
use color_eyre::eyre::eyre;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

/// Captures instance settings supplied via environment variables.
///
/// # Examples
/// ```
/// use pg_ephemeral::EphemeralEnvCfg;
///
/// let cfg = EphemeralEnvCfg::default();
/// assert!(cfg.port.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, OrthoConfig, Default)]
#[ortho_config(prefix = "EPG")]
pub struct EphemeralEnvCfg {
    /// Port assigned to the server (`EPG_PORT`).
    pub port: Option<u16>,
    /// Directory used for the data files when provided (`EPG_DATA_DIR`).
    pub data_dir: Option<Utf8PathBuf>,
    /// Directory holding the Unix socket when provided (`EPG_SOCKET_DIR`).
    pub socket_dir: Option<Utf8PathBuf>,
    /// Comma-separated listen addresses (`EPG_LISTEN_ADDRESSES`).
    pub listen_addresses: Option<String>,
    /// Database created once the server is up (`EPG_CREATE_DB`).
    pub create_db: Option<String>,
    /// Remove the working directory at teardown (`EPG_VOLATILE`).
    pub volatile: Option<bool>,
    /// Startup budget in seconds (`EPG_START_TIMEOUT_SECS`).
    pub start_timeout_secs: Option<u64>,
    /// Teardown grace period in seconds (`EPG_SHUTDOWN_TIMEOUT_SECS`).
    pub shutdown_timeout_secs: Option<u64>,
}

impl EphemeralEnvCfg {
    /// Loads configuration from environment variables without parsing CLI
    /// arguments.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] when the environment carries values the
    /// configuration cannot parse.
    pub fn load() -> ConfigResult<Self> {
        let args = [OsString::from("pg-ephemeral")];
        Self::load_from_iter(args).map_err(|err| ConfigError::from(eyre!(err)))
    }

    /// Converts the configuration into complete [`InstanceOptions`].
    ///
    /// Unset variables leave the corresponding defaults untouched.
    #[must_use]
    pub fn to_options(&self) -> InstanceOptions {
        let mut options = InstanceOptions::default();
        self.apply_endpoint(&mut options);
        self.apply_paths(&mut options);
        self.apply_lifecycle(&mut options);
        options
    }

    fn apply_endpoint(&self, options: &mut InstanceOptions) {
        if let Some(port) = self.port {
            options.port = port;
        }
        if let Some(ref addresses) = self.listen_addresses {
            options.listen_addresses = addresses.clone();
        }
    }

    fn apply_paths(&self, options: &mut InstanceOptions) {
        if let Some(ref dir) = self.data_dir {
            options.data_dir = Some(dir.clone());
        }
        if let Some(ref dir) = self.socket_dir {
            options.socket_dir = Some(dir.clone());
        }
    }

    fn apply_lifecycle(&self, options: &mut InstanceOptions) {
        if let Some(ref dbname) = self.create_db {
            options.create_db = Some(dbname.clone());
        }
        if let Some(volatile) = self.volatile {
            options.volatile = volatile;
        }
        if let Some(secs) = self.start_timeout_secs {
            options.start_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.shutdown_timeout_secs {
            options.shutdown_timeout = Duration::from_secs(secs);
        }
    }
}

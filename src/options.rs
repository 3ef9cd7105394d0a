//! Construction options for an ephemeral instance.
//!
//! Every default is explicit configuration on [`InstanceOptions`]; the crate
//! holds no process-wide mutable state, so two instances only interact when
//! the caller points them at the same resources.

use std::time::Duration;

use camino::Utf8PathBuf;

/// Default TCP port, also used to derive the Unix socket name.
pub const DEFAULT_PORT: u16 = 5432;

/// Default budget for the server to start accepting connections.
pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(30);

/// Default grace period granted to the server during teardown before the
/// process is killed outright.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Options controlling how an [`EphemeralPostgres`](crate::EphemeralPostgres)
/// instance is laid out, started, and torn down.
///
/// # Examples
/// ```
/// use pg_ephemeral::InstanceOptions;
///
/// let options = InstanceOptions {
///     volatile: true,
///     create_db: Some("somedb".to_owned()),
///     ..InstanceOptions::default()
/// };
/// assert!(options.listen_addresses.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct InstanceOptions {
    /// Remove the data directory and its contents after stopping the server.
    pub volatile: bool,
    /// Create a database with this name once the server accepts connections.
    pub create_db: Option<String>,
    /// Directory to use as the data directory. Initialised when nonexistent
    /// or not yet an initialised cluster. Defaults to a fresh temporary
    /// directory.
    pub data_dir: Option<Utf8PathBuf>,
    /// Directory holding the Unix socket. Defaults to the data directory.
    pub socket_dir: Option<Utf8PathBuf>,
    /// Comma-separated IP addresses to listen on. Empty (the default) means
    /// no TCP socket is created at all; clients connect via the Unix socket.
    pub listen_addresses: String,
    /// TCP port to listen on. Only effective with `listen_addresses` set, but
    /// it also determines the socket path. Not coordinated across instances;
    /// collisions are the caller's responsibility.
    pub port: u16,
    /// Extra directories searched for the `PostgreSQL` binaries before `PATH`.
    pub extra_paths: Vec<Utf8PathBuf>,
    /// Extra arguments passed verbatim to the `postgres` server command.
    pub extra_args: Vec<String>,
    /// Leave the server running when the handle drops instead of stopping it.
    pub leave_running: bool,
    /// Maximum time to wait for the server to accept connections.
    pub start_timeout: Duration,
    /// Grace period granted to the server during teardown.
    pub shutdown_timeout: Duration,
}

impl Default for InstanceOptions {
    fn default() -> Self {
        Self {
            volatile: false,
            create_db: None,
            data_dir: None,
            socket_dir: None,
            listen_addresses: String::new(),
            port: DEFAULT_PORT,
            extra_paths: Vec::new(),
            extra_args: Vec::new(),
            leave_running: false,
            start_timeout: DEFAULT_START_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

//! RAII wrapper that launches a throwaway `PostgreSQL` server for tests or
//! ad-hoc use.
//!
//! The server starts during [`EphemeralPostgres::launch`] and stops
//! automatically when the value drops out of scope:
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
//! let dsn = instance.dsn();
//! // Perform database work here.
//! drop(instance); // `PostgreSQL` stops and the data directory is removed.
//! # Ok(())
//! # }
//! ```
//!
//! The wrapper shells out to the installed distribution's `initdb`,
//! `postgres`, `createdb`, and `psql` binaries; their exit codes and output
//! are the only contract. Nothing is downloaded or bundled.

mod connection;
mod initdb;
mod output;
mod shutdown;
mod startup;

pub use self::connection::ConnectionInfo;

use std::process::{Child, Command, Stdio};
use std::time::Duration;

use camino::Utf8PathBuf;
use color_eyre::eyre::eyre;
use tempfile::TempDir;
use tracing::{info, info_span};

use self::output::render_failure;
use self::startup::StartupPlan;
use crate::error::{LaunchError, LaunchErrorKind, LaunchResult};
use crate::observability::LOG_TARGET;
use crate::options::InstanceOptions;
use crate::toolchain::Toolchain;

/// A running throwaway `PostgreSQL` server whose lifecycle follows Rust's
/// drop semantics.
///
/// Constructed fully started by [`EphemeralPostgres::launch`]; stopped by
/// [`EphemeralPostgres::stop`] or by `Drop`, whichever comes first. Each
/// instance owns its own directory and process; nothing is shared.
#[derive(Debug)]
pub struct EphemeralPostgres {
    toolchain: Toolchain,
    data_dir: Utf8PathBuf,
    connection: ConnectionInfo,
    server: Option<Child>,
    volatile: bool,
    leave_running: bool,
    shutdown_timeout: Duration,
    /// Owns the temporary directory backing an instance with no
    /// caller-supplied data directory; detached at teardown unless volatile.
    scratch: Option<TempDir>,
    // Keeps the instance span alive for the lifetime of the handle.
    _instance_span: tracing::Span,
}

/// Working directory chosen for the instance.
struct WorkDir {
    path: Utf8PathBuf,
    scratch: Option<TempDir>,
}

impl EphemeralPostgres {
    /// Launches a `PostgreSQL` server configured by `options`.
    ///
    /// The call blocks until the server accepts connections (bounded by
    /// `options.start_timeout`) and, when `options.create_db` is set, until
    /// the database exists. Tool lookup happens before anything is spawned,
    /// so a missing binary fails fast with
    /// [`LaunchErrorKind::ToolNotFound`].
    ///
    /// # Errors
    /// Returns an error when a binary is missing, `initdb` or `createdb`
    /// exit unsuccessfully, the server quits during startup, or the startup
    /// budget elapses. On failure any spawned server is killed and, for
    /// volatile instances, the working directory is removed.
    pub fn launch(options: InstanceOptions) -> LaunchResult<Self> {
        let span = info_span!(target: LOG_TARGET, "ephemeral_postgres", port = options.port);
        let outcome = {
            let _entered = span.enter();
            Self::launch_inner(&options)
        };
        let (toolchain, workdir, connection, server) = outcome?;

        let mut instance = Self {
            toolchain,
            data_dir: workdir.path,
            connection,
            server: Some(server),
            volatile: options.volatile,
            leave_running: options.leave_running,
            shutdown_timeout: options.shutdown_timeout,
            scratch: workdir.scratch,
            _instance_span: span,
        };

        if let Some(dbname) = options.create_db {
            if let Err(err) = instance.create_database(&dbname) {
                instance.stop();
                return Err(err);
            }
            instance.connection = instance.connection.clone().with_dbname(dbname);
        }

        Ok(instance)
    }

    fn launch_inner(
        options: &InstanceOptions,
    ) -> LaunchResult<(Toolchain, WorkDir, ConnectionInfo, Child)> {
        let toolchain = Toolchain::locate(&options.extra_paths)?;
        let mut workdir = resolve_work_dir(options)?;
        let socket_dir = options
            .socket_dir
            .clone()
            .unwrap_or_else(|| workdir.path.clone());

        let boot_result = boot(&toolchain, &workdir, &socket_dir, options);
        let server = match boot_result {
            Ok(server) => server,
            Err(err) => {
                discard_failed_workdir(&mut workdir, options.volatile);
                return Err(err);
            }
        };

        info!(
            target: LOG_TARGET,
            data_dir = %workdir.path,
            socket_dir = %socket_dir,
            port = options.port,
            volatile = options.volatile,
            "ephemeral postgres started"
        );

        let mut connection = ConnectionInfo::new(socket_dir, options.port);
        if let Some(user) = os_user() {
            connection = connection.with_user(user);
        }
        Ok((toolchain, workdir, connection, server))
    }

    /// Returns the connection parameters for the running server.
    #[must_use]
    pub const fn connection(&self) -> &ConnectionInfo {
        &self.connection
    }

    /// Builds a keyword/value DSN for the running server.
    ///
    /// See [`ConnectionInfo::dsn`] for the quoting rules. Without a
    /// `create_db` option the DSN carries no `dbname` entry.
    #[must_use]
    pub fn dsn(&self) -> String {
        self.connection.dsn()
    }

    /// Builds a `postgresql:///` URI addressing the Unix socket.
    #[must_use]
    pub fn uri(&self) -> String {
        self.connection.uri()
    }

    /// Returns the data directory in use.
    #[must_use]
    pub fn data_dir(&self) -> &camino::Utf8Path {
        &self.data_dir
    }

    /// Returns whether the working directory is removed at teardown.
    #[must_use]
    pub const fn is_volatile(&self) -> bool {
        self.volatile
    }

    /// Creates a database with the given name on the running server via
    /// `createdb`.
    ///
    /// # Errors
    /// Returns a [`LaunchErrorKind::SetupFailed`] error carrying the tool's
    /// output when `createdb` exits unsuccessfully.
    pub fn create_database(&self, name: &str) -> LaunchResult<()> {
        let span = info_span!(target: LOG_TARGET, "createdb", db = %name);
        let _entered = span.enter();

        let output = Command::new(self.toolchain.createdb().as_std_path())
            .args(["-h", self.connection.host()])
            .arg("-p")
            .arg(self.connection.port().to_string())
            .arg(name)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| LaunchError::from(eyre!("failed to run createdb: {err}")))?;

        if !output.status.success() {
            return Err(render_failure(
                LaunchErrorKind::SetupFailed,
                "createdb reported failure",
                &output,
            ));
        }

        info!(target: LOG_TARGET, db = %name, "database created");
        Ok(())
    }

    /// Stops the server and, for volatile instances, removes the working
    /// directory.
    ///
    /// Idempotent: calling it twice is a no-op. Teardown problems are logged
    /// as warnings rather than surfaced, so this is safe to call from error
    /// paths without masking the original failure.
    pub fn stop(&mut self) {
        let Some(mut server) = self.server.take() else {
            return;
        };
        let context = format!("data_dir {}", self.data_dir);
        info!(
            target: LOG_TARGET,
            context = %context,
            volatile = self.volatile,
            "stopping ephemeral postgres"
        );
        shutdown::stop_server(&mut server, self.shutdown_timeout, &context);

        if !self.volatile {
            self.persist_scratch();
            return;
        }
        if let Some(scratch) = self.scratch.take() {
            if let Err(err) = scratch.close() {
                tracing::warn!(
                    target: LOG_TARGET,
                    context = %context,
                    error = %err,
                    "failed to remove volatile data directory"
                );
            }
        } else {
            shutdown::remove_data_dir(&self.data_dir, &context);
        }
    }

    /// Detaches any owned temporary directory so it outlives the handle.
    fn persist_scratch(&mut self) {
        if let Some(scratch) = self.scratch.take() {
            drop(scratch.keep());
        }
    }
}

impl Drop for EphemeralPostgres {
    fn drop(&mut self) {
        if self.leave_running {
            self.persist_scratch();
            info!(
                target: LOG_TARGET,
                data_dir = %self.data_dir,
                "leaving postgres server running past handle drop"
            );
            return;
        }
        self.stop();
    }
}

/// Chooses the working directory: caller-provided, or a fresh temporary one.
fn resolve_work_dir(options: &InstanceOptions) -> LaunchResult<WorkDir> {
    if let Some(ref dir) = options.data_dir {
        std::fs::create_dir_all(dir.as_std_path())
            .map_err(|err| LaunchError::from(eyre!("failed to create data directory {dir}: {err}")))?;
        return Ok(WorkDir {
            path: dir.clone(),
            scratch: None,
        });
    }

    let scratch = TempDir::new()
        .map_err(|err| LaunchError::from(eyre!("failed to create temporary directory: {err}")))?;
    let path = Utf8PathBuf::from_path_buf(scratch.path().to_path_buf())
        .map_err(|path| LaunchError::from(eyre!("temporary directory is not UTF-8: {}", path.display())))?;
    Ok(WorkDir {
        path,
        scratch: Some(scratch),
    })
}

fn boot(
    toolchain: &Toolchain,
    workdir: &WorkDir,
    socket_dir: &camino::Utf8Path,
    options: &InstanceOptions,
) -> LaunchResult<Child> {
    if socket_dir != workdir.path.as_path() {
        std::fs::create_dir_all(socket_dir.as_std_path()).map_err(|err| {
            LaunchError::from(eyre!("failed to create socket directory {socket_dir}: {err}"))
        })?;
    }
    initdb::ensure_initialised(toolchain, &workdir.path)?;
    startup::start(&StartupPlan {
        toolchain,
        data_dir: &workdir.path,
        socket_dir,
        listen_addresses: &options.listen_addresses,
        port: options.port,
        extra_args: &options.extra_args,
        timeout: options.start_timeout,
    })
}

/// Disposes of the working directory after a failed launch.
fn discard_failed_workdir(workdir: &mut WorkDir, volatile: bool) {
    if !volatile {
        if let Some(scratch) = workdir.scratch.take() {
            drop(scratch.keep());
        }
        return;
    }
    if let Some(scratch) = workdir.scratch.take() {
        if let Err(err) = scratch.close() {
            tracing::warn!(
                target: LOG_TARGET,
                error = %err,
                "failed to remove volatile data directory after launch failure"
            );
        }
    } else {
        shutdown::remove_data_dir(&workdir.path, "launch failure");
    }
}

fn os_user() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .ok()
}

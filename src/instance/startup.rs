//! Server spawn and readiness polling.
//!
//! The awkward part of launching `postgres` is knowing when it is actually
//! ready to serve requests: first the Unix socket has to appear, then `psql`
//! has to complete a listing against it. Both phases share one startup
//! budget and poll on a short fixed interval.

use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use camino::Utf8Path;
use color_eyre::eyre::eyre;
use tracing::{info, info_span};

use super::shutdown;
use crate::error::{LaunchError, LaunchErrorKind, LaunchResult};
use crate::observability::LOG_TARGET;
use crate::toolchain::Toolchain;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Captures everything needed to spawn the server and wait for readiness.
pub(super) struct StartupPlan<'a> {
    pub toolchain: &'a Toolchain,
    pub data_dir: &'a Utf8Path,
    pub socket_dir: &'a Utf8Path,
    pub listen_addresses: &'a str,
    pub port: u16,
    pub extra_args: &'a [String],
    pub timeout: Duration,
}

/// Spawns `postgres` and blocks until it accepts connections.
///
/// On any readiness failure the spawned child is killed and reaped before
/// the error is surfaced, so failed launches do not leak server processes.
pub(super) fn start(plan: &StartupPlan<'_>) -> LaunchResult<Child> {
    let span = info_span!(
        target: LOG_TARGET,
        "server_startup",
        data_dir = %plan.data_dir,
        port = plan.port,
        timeout_secs = plan.timeout.as_secs()
    );
    let _entered = span.enter();

    refuse_locked_data_dir(plan.data_dir)?;
    let mut child = spawn_server(plan)?;
    let deadline = Instant::now() + plan.timeout;

    if let Err(err) = await_ready(plan, &mut child, deadline) {
        shutdown::discard_failed_server(&mut child);
        return Err(err);
    }

    info!(target: LOG_TARGET, port = plan.port, "server accepting connections");
    Ok(child)
}

/// Refuses to start when a previous postmaster still holds the data directory.
fn refuse_locked_data_dir(data_dir: &Utf8Path) -> LaunchResult<()> {
    let pid_file = data_dir.join("postmaster.pid");
    if pid_file.is_file() {
        return Err(LaunchError::new(
            LaunchErrorKind::SetupFailed,
            eyre!("failed to start server, data directory locked by {pid_file}"),
        ));
    }
    Ok(())
}

fn spawn_server(plan: &StartupPlan<'_>) -> LaunchResult<Child> {
    info!(
        target: LOG_TARGET,
        listen_addresses = plan.listen_addresses,
        socket_dir = %plan.socket_dir,
        "spawning postgres server"
    );
    Command::new(plan.toolchain.postgres().as_std_path())
        .arg(format!("--listen_addresses={}", plan.listen_addresses))
        .arg(format!("--port={}", plan.port))
        .args(["-D", plan.data_dir.as_str()])
        .args(["-k", plan.socket_dir.as_str()])
        .args(plan.extra_args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|err| LaunchError::from(eyre!("failed to spawn postgres server: {err}")))
}

fn await_ready(plan: &StartupPlan<'_>, child: &mut Child, deadline: Instant) -> LaunchResult<()> {
    let socket = plan.socket_dir.join(format!(".s.PGSQL.{}", plan.port));
    wait_for_socket(child, &socket, plan.timeout, deadline)?;
    wait_for_connections(plan, child, deadline)
}

/// Waits for the server's Unix socket to appear, or for the child to quit.
fn wait_for_socket(
    child: &mut Child,
    socket: &Utf8Path,
    timeout: Duration,
    deadline: Instant,
) -> LaunchResult<()> {
    loop {
        if let Some(status) = poll_server(child)? {
            return Err(server_quit(status));
        }
        if socket.exists() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(startup_timeout(timeout));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Waits until a `psql` listing against the socket succeeds.
fn wait_for_connections(
    plan: &StartupPlan<'_>,
    child: &mut Child,
    deadline: Instant,
) -> LaunchResult<()> {
    loop {
        if probe_with_psql(plan)? {
            return Ok(());
        }
        if let Some(status) = poll_server(child)? {
            return Err(server_quit(status));
        }
        if Instant::now() >= deadline {
            return Err(startup_timeout(plan.timeout));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Runs one `psql -l` readiness probe; `true` means the server accepted the
/// connection.
fn probe_with_psql(plan: &StartupPlan<'_>) -> LaunchResult<bool> {
    let status = Command::new(plan.toolchain.psql().as_std_path())
        .args(["-h", plan.socket_dir.as_str()])
        .arg("-p")
        .arg(plan.port.to_string())
        .arg("-l")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|err| LaunchError::from(eyre!("failed to run psql readiness probe: {err}")))?;
    Ok(status.success())
}

fn poll_server(child: &mut Child) -> LaunchResult<Option<ExitStatus>> {
    child
        .try_wait()
        .map_err(|err| LaunchError::from(eyre!("failed to poll server process: {err}")))
}

fn server_quit(status: ExitStatus) -> LaunchError {
    LaunchError::new(
        LaunchErrorKind::ServerExited,
        eyre!("server quit unexpectedly during startup ({status})"),
    )
}

fn startup_timeout(timeout: Duration) -> LaunchError {
    LaunchError::new(
        LaunchErrorKind::StartupTimeout,
        eyre!(
            "server did not accept connections within {}s",
            timeout.as_secs()
        ),
    )
}

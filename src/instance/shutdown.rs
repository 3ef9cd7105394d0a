//! Teardown for a running instance: signal, escalate, reap, remove.
//!
//! Teardown is best-effort by design. It runs from [`Drop`] as the
//! guaranteed-release path, so failures are logged as warnings rather than
//! surfaced, and they never mask whatever error context is already in
//! flight.

use std::io::ErrorKind;
use std::process::Child;
use std::time::Duration;

use camino::Utf8Path;
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::observability::LOG_TARGET;

/// Stops the server: SIGINT (fast shutdown), bounded wait, then SIGKILL.
///
/// SIGINT asks `PostgreSQL` for a fast shutdown, aborting open transactions
/// instead of waiting for clients to disconnect. When the process has not
/// exited within `timeout` it is killed outright and reaped so no zombie is
/// left behind.
pub(super) fn stop_server(child: &mut Child, timeout: Duration, context: &str) {
    send_fast_shutdown(child, context);

    match child.wait_timeout(timeout) {
        Ok(Some(status)) => {
            debug!(target: LOG_TARGET, context = %context, %status, "server stopped");
        }
        Ok(None) => {
            warn_stop_timeout(timeout.as_secs(), context);
            kill_and_reap(child, context);
        }
        Err(err) => {
            warn_stop_failure(context, &err);
            kill_and_reap(child, context);
        }
    }
}

/// Kills and reaps a child whose startup never completed.
pub(super) fn discard_failed_server(child: &mut Child) {
    kill_and_reap(child, "startup failure");
}

/// Removes the working directory of a volatile instance.
///
/// A directory that is already gone is not an error; anything else is logged
/// and swallowed.
pub(super) fn remove_data_dir(data_dir: &Utf8Path, context: &str) {
    match std::fs::remove_dir_all(data_dir.as_std_path()) {
        Ok(()) => {
            debug!(target: LOG_TARGET, context = %context, data_dir = %data_dir, "data directory removed");
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            warn!(
                target: LOG_TARGET,
                context = %context,
                data_dir = %data_dir,
                error = %err,
                "failed to remove volatile data directory"
            );
        }
    }
}

fn send_fast_shutdown(child: &Child, context: &str) {
    let Ok(pid) = i32::try_from(child.id()) else {
        warn!(target: LOG_TARGET, context = %context, "server pid out of range; skipping signal");
        return;
    };
    match kill(Pid::from_raw(pid), Signal::SIGINT) {
        // ESRCH means the server already exited; the wait below reaps it.
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => warn_stop_failure(context, &err),
    }
}

fn kill_and_reap(child: &mut Child, context: &str) {
    match child.kill() {
        Ok(()) => {}
        // InvalidInput indicates the child has already exited.
        Err(err) if err.kind() == ErrorKind::InvalidInput => {}
        Err(err) => {
            warn!(
                target: LOG_TARGET,
                context = %context,
                error = %err,
                "failed to kill server process"
            );
            return;
        }
    }
    if let Err(err) = child.wait() {
        warn!(
            target: LOG_TARGET,
            context = %context,
            error = %err,
            "failed to reap server process"
        );
    }
}

/// Logs a warning when stopping the server fails.
pub(super) fn warn_stop_failure(context: &str, err: &impl std::fmt::Display) {
    warn!(
        target: LOG_TARGET,
        "failed to stop postgres server ({context}): {err}"
    );
}

/// Logs a warning when the server ignores the shutdown grace period.
pub(super) fn warn_stop_timeout(timeout_secs: u64, context: &str) {
    warn!(
        target: LOG_TARGET,
        "server ignored fast shutdown for {timeout_secs}s ({context}); killing it"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    #[test]
    fn removing_a_missing_directory_is_silent() {
        // Must not warn or panic; NotFound is the idempotent success case.
        remove_data_dir(Utf8Path::new("/nonexistent/pg-ephemeral-test"), "test");
    }

    #[test]
    fn remove_data_dir_deletes_recursively() -> color_eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let dir_path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .map_err(|path| color_eyre::eyre::eyre!("non-UTF8 temp dir: {}", path.display()))?;
        std::fs::create_dir(dir_path.join("base").as_std_path())?;
        std::fs::write(dir_path.join("base/1234").as_std_path(), "data")?;

        remove_data_dir(&dir_path, "test");
        assert!(!dir_path.exists());
        // Disarm TempDir's own removal of the now-missing directory.
        drop(dir.keep());
        Ok(())
    }
}

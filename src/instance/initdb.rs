//! Data directory initialisation via the external `initdb` tool.

use std::process::{Command, Stdio};

use camino::Utf8Path;
use color_eyre::eyre::eyre;
use tracing::{debug, info, info_span};

use super::output::render_failure;
use crate::error::{LaunchError, LaunchErrorKind, LaunchResult};
use crate::observability::LOG_TARGET;
use crate::toolchain::Toolchain;

/// Initialises `data_dir` as a `PostgreSQL` cluster unless it already is one.
///
/// A `postgresql.conf` inside the directory is taken to mean the directory
/// was initialised previously; anything else in there is the caller's
/// problem, and the server spawn will complain about it soon enough.
pub(super) fn ensure_initialised(toolchain: &Toolchain, data_dir: &Utf8Path) -> LaunchResult<()> {
    if data_dir.join("postgresql.conf").is_file() {
        debug!(
            target: LOG_TARGET,
            data_dir = %data_dir,
            "data directory already initialised; skipping initdb"
        );
        return Ok(());
    }

    let span = info_span!(target: LOG_TARGET, "initdb", data_dir = %data_dir);
    let _entered = span.enter();

    let output = Command::new(toolchain.initdb().as_std_path())
        .args(["-E", "UTF8"])
        .arg(data_dir.as_std_path())
        .stdin(Stdio::null())
        .output()
        .map_err(|err| {
            LaunchError::new(
                LaunchErrorKind::SetupFailed,
                eyre!("failed to run initdb: {err}"),
            )
        })?;

    if !output.status.success() {
        return Err(render_failure(
            LaunchErrorKind::SetupFailed,
            "initdb reported failure",
            &output,
        ));
    }

    info!(target: LOG_TARGET, data_dir = %data_dir, "data directory initialised");
    Ok(())
}

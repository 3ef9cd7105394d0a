//! Launch failure coverage driven by stand-in server binaries.
//!
//! A real `PostgreSQL` distribution is not needed to exercise the failure
//! paths: a shell script posing as `postgres` either exits straight away or
//! never creates the socket, and the launcher must classify each outcome.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::{Context, Result, ensure, eyre};
use pg_ephemeral::{EphemeralPostgres, InstanceOptions, LaunchErrorKind};
use rstest::rstest;

const EXIT_AT_ONCE: &str = "#!/bin/sh\nexit 1\n";
const NEVER_READY: &str = "#!/bin/sh\nexec sleep 60\n";

fn fake_tooldir(postgres_script: &str) -> Result<(tempfile::TempDir, Utf8PathBuf)> {
    let dir = tempfile::tempdir().wrap_err("create temp tool dir")?;
    let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
        .map_err(|path| eyre!("non-UTF8 temp dir: {}", path.display()))?;
    fake_binary(&path, "postgres", postgres_script)?;
    for name in ["initdb", "createdb", "psql"] {
        fake_binary(&path, name, "#!/bin/sh\nexit 0\n")?;
    }
    Ok((dir, path))
}

fn fake_binary(dir: &Utf8Path, name: &str, script: &str) -> Result<()> {
    let path = dir.join(name);
    std::fs::write(&path, script).wrap_err_with(|| format!("write {path}"))?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .wrap_err_with(|| format!("chmod {path}"))?;
    Ok(())
}

/// Lays out a data directory that already looks like an initialised cluster,
/// so launching skips `initdb` and goes straight to the server spawn.
fn initialised_data_dir() -> Result<(tempfile::TempDir, Utf8PathBuf)> {
    let dir = tempfile::tempdir().wrap_err("create temp data dir")?;
    let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
        .map_err(|path| eyre!("non-UTF8 temp dir: {}", path.display()))?;
    std::fs::write(path.join("postgresql.conf"), "").wrap_err("write postgresql.conf")?;
    Ok((dir, path))
}

fn options_with(
    tooldir: &Utf8Path,
    data_dir: &Utf8Path,
    start_timeout: Duration,
) -> InstanceOptions {
    InstanceOptions {
        data_dir: Some(data_dir.to_owned()),
        extra_paths: vec![tooldir.to_owned()],
        start_timeout,
        ..InstanceOptions::default()
    }
}

#[rstest]
fn server_that_quits_during_startup_reports_server_exited() -> Result<()> {
    let (_tools, tooldir) = fake_tooldir(EXIT_AT_ONCE)?;
    let (_data, data_dir) = initialised_data_dir()?;

    let result =
        EphemeralPostgres::launch(options_with(&tooldir, &data_dir, Duration::from_secs(5)));

    let Err(err) = result else {
        return Err(eyre!("launch should fail when the server exits at once"));
    };
    ensure!(
        err.kind() == LaunchErrorKind::ServerExited,
        "expected ServerExited, got {:?}",
        err.kind()
    );
    // Non-volatile caller-supplied directories survive a failed launch.
    ensure!(
        data_dir.join("postgresql.conf").is_file(),
        "caller data directory should be left in place"
    );
    Ok(())
}

#[rstest]
fn server_that_never_opens_its_socket_reports_startup_timeout() -> Result<()> {
    let (_tools, tooldir) = fake_tooldir(NEVER_READY)?;
    let (_data, data_dir) = initialised_data_dir()?;

    let result =
        EphemeralPostgres::launch(options_with(&tooldir, &data_dir, Duration::from_millis(400)));

    let Err(err) = result else {
        return Err(eyre!("launch should time out when no socket ever appears"));
    };
    ensure!(
        err.kind() == LaunchErrorKind::StartupTimeout,
        "expected StartupTimeout, got {:?}",
        err.kind()
    );
    Ok(())
}

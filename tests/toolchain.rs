//! Behavioural coverage for locating the external `PostgreSQL` binaries.

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::{Context, Result, ensure, eyre};
use pg_ephemeral::{LaunchErrorKind, Toolchain};
use rstest::rstest;
use serial_test::file_serial;

const ALL_TOOLS: [&str; 4] = ["postgres", "initdb", "createdb", "psql"];

fn fake_tooldir(names: &[&str]) -> Result<(tempfile::TempDir, Utf8PathBuf)> {
    let dir = tempfile::tempdir().wrap_err("create temp tool dir")?;
    let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
        .map_err(|path| eyre!("non-UTF8 temp dir: {}", path.display()))?;
    for name in names {
        fake_binary(&path, name)?;
    }
    Ok((dir, path))
}

fn fake_binary(dir: &Utf8Path, name: &str) -> Result<()> {
    let path = dir.join(name);
    std::fs::write(&path, "#!/bin/sh\nexit 0\n").wrap_err_with(|| format!("write {path}"))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .wrap_err_with(|| format!("chmod {path}"))?;
    }
    Ok(())
}

#[rstest]
fn extra_paths_are_searched_before_path() -> Result<()> {
    let (_dir, path) = fake_tooldir(&ALL_TOOLS)?;
    let toolchain = Toolchain::locate(std::slice::from_ref(&path))?;
    for accessor in [
        Toolchain::postgres,
        Toolchain::initdb,
        Toolchain::createdb,
        Toolchain::psql,
    ] {
        let resolved = accessor(&toolchain);
        ensure!(
            resolved.starts_with(&path),
            "binary should resolve into the extra path, got {resolved}"
        );
    }
    Ok(())
}

#[rstest]
#[case::initdb("initdb")]
#[case::postgres("postgres")]
#[case::createdb("createdb")]
#[case::psql("psql")]
#[file_serial]
fn missing_binary_fails_with_tool_not_found(#[case] missing: &str) -> Result<()> {
    let present: Vec<&str> = ALL_TOOLS.iter().copied().filter(|n| *n != missing).collect();
    let (_dir, path) = fake_tooldir(&present)?;

    // Empty out PATH so an installed distribution cannot satisfy the lookup.
    let result = temp_env::with_var("PATH", Some(""), || {
        Toolchain::locate(std::slice::from_ref(&path))
    });

    let Err(err) = result else {
        return Err(eyre!("lookup should fail when {missing} is absent"));
    };
    ensure!(
        err.kind() == LaunchErrorKind::ToolNotFound,
        "expected ToolNotFound, got {:?}",
        err.kind()
    );
    let rendered = err.to_string();
    ensure!(
        rendered.contains(missing),
        "error should name the missing binary: {rendered}"
    );
    Ok(())
}

//! Locates the external `PostgreSQL` binaries on the search path.
//!
//! The crate never bundles or downloads `PostgreSQL`; it relies on an
//! already-installed distribution whose tools are reachable via `PATH` or via
//! caller-supplied extra directories.

use camino::{Utf8Path, Utf8PathBuf};
use color_eyre::eyre::eyre;

use crate::error::{LaunchError, LaunchErrorKind, LaunchResult};

/// Resolved paths of the external `PostgreSQL` tools used by the launcher.
///
/// # Examples
/// ```no_run
/// use pg_ephemeral::Toolchain;
///
/// # fn main() -> pg_ephemeral::LaunchResult<()> {
/// let toolchain = Toolchain::locate(&[])?;
/// assert!(toolchain.postgres().as_str().ends_with("postgres"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Toolchain {
    postgres: Utf8PathBuf,
    initdb: Utf8PathBuf,
    createdb: Utf8PathBuf,
    psql: Utf8PathBuf,
}

impl Toolchain {
    /// Locates `postgres`, `initdb`, `createdb`, and `psql`.
    ///
    /// `extra_paths` are searched before the directories listed in the `PATH`
    /// environment variable.
    ///
    /// # Errors
    /// Returns a [`LaunchErrorKind::ToolNotFound`] error naming the first
    /// binary that cannot be found. No subprocess is spawned by this call.
    pub fn locate(extra_paths: &[Utf8PathBuf]) -> LaunchResult<Self> {
        let dirs = search_dirs(extra_paths);
        Ok(Self {
            postgres: locate_binary("postgres", &dirs)?,
            initdb: locate_binary("initdb", &dirs)?,
            createdb: locate_binary("createdb", &dirs)?,
            psql: locate_binary("psql", &dirs)?,
        })
    }

    /// Returns the resolved `postgres` server binary.
    #[must_use]
    pub fn postgres(&self) -> &Utf8Path {
        &self.postgres
    }

    /// Returns the resolved `initdb` binary.
    #[must_use]
    pub fn initdb(&self) -> &Utf8Path {
        &self.initdb
    }

    /// Returns the resolved `createdb` binary.
    #[must_use]
    pub fn createdb(&self) -> &Utf8Path {
        &self.createdb
    }

    /// Returns the resolved `psql` binary.
    #[must_use]
    pub fn psql(&self) -> &Utf8Path {
        &self.psql
    }
}

/// Builds the ordered list of directories to search for a binary.
fn search_dirs(extra_paths: &[Utf8PathBuf]) -> Vec<Utf8PathBuf> {
    let mut dirs: Vec<Utf8PathBuf> = extra_paths.to_vec();
    if let Some(path) = std::env::var_os("PATH") {
        for entry in std::env::split_paths(&path) {
            if let Ok(dir) = Utf8PathBuf::from_path_buf(entry) {
                dirs.push(dir);
            }
        }
    }
    dirs
}

fn locate_binary(name: &str, dirs: &[Utf8PathBuf]) -> LaunchResult<Utf8PathBuf> {
    dirs.iter()
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
        .ok_or_else(|| {
            LaunchError::new(
                LaunchErrorKind::ToolNotFound,
                eyre!("could not locate \"{name}\" binary on the search path"),
            )
        })
}

#[cfg(unix)]
fn is_executable(path: &Utf8Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.as_std_path()
        .metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Utf8Path) -> bool {
    path.as_std_path().metadata().is_ok_and(|meta| meta.is_file())
}

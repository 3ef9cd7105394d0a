//! Connection metadata and DSN construction for a running instance.
//!
//! The server listens on a Unix socket by default, so the libpq `host`
//! parameter carries the socket directory rather than a hostname.

use camino::{Utf8Path, Utf8PathBuf};
use std::borrow::Cow;

/// Connection parameters for an [`EphemeralPostgres`](crate::EphemeralPostgres)
/// instance, rendered as a keyword/value DSN or a `postgresql://` URI.
///
/// # Examples
/// ```
/// use camino::Utf8PathBuf;
/// use pg_ephemeral::ConnectionInfo;
///
/// let info = ConnectionInfo::new(Utf8PathBuf::from("/tmp/pg"), 5432)
///     .with_dbname("somedb");
/// assert!(info.dsn().contains("dbname=somedb"));
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    socket_dir: Utf8PathBuf,
    port: u16,
    dbname: Option<String>,
    user: Option<String>,
}

impl ConnectionInfo {
    /// Constructs connection parameters for a server listening on the Unix
    /// socket in `socket_dir` at `port`.
    #[must_use]
    pub const fn new(socket_dir: Utf8PathBuf, port: u16) -> Self {
        Self {
            socket_dir,
            port,
            dbname: None,
            user: None,
        }
    }

    /// Sets the database name included in the DSN and URI.
    #[must_use]
    pub fn with_dbname(mut self, dbname: impl Into<String>) -> Self {
        self.dbname = Some(dbname.into());
        self
    }

    /// Sets the user included in the DSN, typically the account `initdb` made
    /// the cluster superuser.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Returns the libpq `host` value, i.e. the socket directory.
    #[must_use]
    pub fn host(&self) -> &str {
        self.socket_dir.as_str()
    }

    /// Returns the socket directory.
    #[must_use]
    pub fn socket_dir(&self) -> &Utf8Path {
        &self.socket_dir
    }

    /// Returns the configured port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the database name, when one was created at launch.
    #[must_use]
    pub fn dbname(&self) -> Option<&str> {
        self.dbname.as_deref()
    }

    /// Returns the user, when known.
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Builds a keyword/value DSN (`host=... port=... dbname=... user=...`).
    ///
    /// Values are quoted only when they contain whitespace, quotes, or
    /// backslashes, so plain names appear verbatim. When no database was
    /// created at launch the `dbname` entry is omitted and the caller must
    /// supply one.
    #[must_use]
    pub fn dsn(&self) -> String {
        let mut parts = vec![
            format!("host={}", quote_value(self.socket_dir.as_str())),
            format!("port={}", self.port),
        ];
        if let Some(ref dbname) = self.dbname {
            parts.push(format!("dbname={}", quote_value(dbname)));
        }
        if let Some(ref user) = self.user {
            parts.push(format!("user={}", quote_value(user)));
        }
        parts.join(" ")
    }

    /// Builds a `postgresql:///` URI addressing the Unix socket, suitable for
    /// `psql '<uri>'`.
    #[must_use]
    pub fn uri(&self) -> String {
        format!(
            "postgresql:///{}?host={}&port={}",
            self.dbname.as_deref().unwrap_or_default(),
            self.socket_dir,
            self.port
        )
    }
}

/// Quotes a libpq DSN value when it cannot appear bare.
fn quote_value(value: &str) -> Cow<'_, str> {
    let needs_quoting =
        value.is_empty() || value.chars().any(|ch| ch.is_whitespace() || ch == '\'' || ch == '\\');
    if !needs_quoting {
        return Cow::Borrowed(value);
    }
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    Cow::Owned(format!("'{escaped}'"))
}

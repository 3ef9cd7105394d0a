//! Output truncation and error rendering for the external `PostgreSQL` tools.
//!
//! Setup tools can emit long complaints; captured stdout and stderr are
//! truncated before being folded into diagnostics to keep reports readable.

use std::borrow::Cow;
use std::process::Output;

use color_eyre::eyre::eyre;

use crate::error::{LaunchError, LaunchErrorKind};

pub(super) const OUTPUT_CHAR_LIMIT: usize = 2_048;
pub(super) const TRUNCATION_SUFFIX: &str = "… [truncated]";

/// Renders a non-zero tool exit into a [`LaunchError`] carrying the captured
/// output.
pub(super) fn render_failure(
    kind: LaunchErrorKind,
    context: &str,
    output: &Output,
) -> LaunchError {
    let stdout = truncate_output(String::from_utf8_lossy(&output.stdout));
    let stderr = truncate_output(String::from_utf8_lossy(&output.stderr));
    LaunchError::new(
        kind,
        eyre!("{context}\nstdout: {stdout}\nstderr: {stderr}"),
    )
}

pub(super) fn truncate_output(text: Cow<'_, str>) -> String {
    let mut out = String::with_capacity(OUTPUT_CHAR_LIMIT + TRUNCATION_SUFFIX.len());
    let mut chars = text.chars();
    for _ in 0..OUTPUT_CHAR_LIMIT {
        match chars.next() {
            Some(ch) => out.push(ch),
            None => return text.into_owned(),
        }
    }

    if chars.next().is_none() {
        return text.into_owned();
    }

    out.push_str(TRUNCATION_SUFFIX);
    out
}

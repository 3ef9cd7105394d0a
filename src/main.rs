//! Launches a throwaway `PostgreSQL` instance from the installed
//! distribution's binaries, prints its connection string, and keeps it alive
//! until Enter is pressed.
//!
//! Flags are parsed by `clap`; defaults may be supplied via `EPG_*`
//! environment variables. The binary exits with status code `0` on success
//! and `1` on error.

fn main() -> color_eyre::eyre::Result<()> {
    pg_ephemeral::run().map_err(|err| color_eyre::eyre::eyre!(err))?;
    Ok(())
}

//! Demo command-line surface.
//!
//! Running the binary starts one instance, prints its connection string, and
//! keeps the server alive until Enter is pressed, stdin closes, or the
//! process receives SIGINT, then tears everything down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use color_eyre::eyre::eyre;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

use crate::error::{LaunchError, Result};
use crate::{EphemeralEnvCfg, EphemeralPostgres, InstanceOptions};

const DEFAULT_DBNAME: &str = "demo";

const INTERRUPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Set by the SIGINT handler; polled while waiting for the shutdown request.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Parser)]
#[command(
    name = "pg-ephemeral",
    about = "Launch a throwaway PostgreSQL instance from the installed distribution",
    version
)]
struct Cli {
    /// Name of the database to create on the instance.
    dbname: Option<String>,
    /// TCP port to listen on; also determines the socket path.
    #[arg(long)]
    port: Option<u16>,
    /// Keep the data directory after teardown.
    #[arg(long)]
    keep: bool,
    /// Use this data directory instead of a temporary one.
    #[arg(long)]
    data_dir: Option<Utf8PathBuf>,
}

/// Runs the demo: launch, print connection details, wait, tear down.
///
/// Flags override `EPG_*` environment settings, which in turn override the
/// built-in defaults. Unlike the library default, the demo is volatile unless
/// `--keep` is passed.
///
/// # Errors
/// Returns an error when configuration loading, the launch, installing the
/// SIGINT handler, or reading stdin fails. Teardown problems are logged, not
/// surfaced.
pub fn run() -> Result<()> {
    if let Err(err) = color_eyre::install() {
        tracing::debug!("color_eyre already installed: {err}");
    }
    let cli = Cli::parse();
    let env = EphemeralEnvCfg::load()?;
    let options = merge(&cli, &env);

    install_interrupt_handler()?;
    let mut instance = EphemeralPostgres::launch(options)?;
    print_banner(&instance);
    wait_for_shutdown_request()?;
    instance.stop();
    Ok(())
}

fn merge(cli: &Cli, env: &EphemeralEnvCfg) -> InstanceOptions {
    let mut options = env.to_options();
    options.volatile = if cli.keep {
        false
    } else {
        env.volatile.unwrap_or(true)
    };
    if let Some(port) = cli.port {
        options.port = port;
    }
    if let Some(ref dir) = cli.data_dir {
        options.data_dir = Some(dir.clone());
    }
    options.create_db = cli
        .dbname
        .clone()
        .or_else(|| options.create_db.take())
        .or_else(|| Some(DEFAULT_DBNAME.to_owned()));
    options
}

#[expect(
    clippy::print_stdout,
    reason = "the demo surface communicates via stdout"
)]
fn print_banner(instance: &EphemeralPostgres) {
    println!(
        "\nEphemeral PostgreSQL instance running in {} mode.\n\
         \n\
         Connection string:\n\
         \n    {}\n\
         \n\
         Shell:\n\
         \n    psql '{}'\n\
         \n\
         Press Enter (or Ctrl+C) to terminate and clean up...",
        if instance.is_volatile() {
            "volatile (leave no traces)"
        } else {
            "persistent"
        },
        instance.dsn(),
        instance.uri(),
    );
}

extern "C" fn note_interrupt(_signum: i32) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Routes SIGINT through the normal teardown path instead of letting the
/// default disposition kill the process with the server still running.
fn install_interrupt_handler() -> Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(note_interrupt),
        SaFlags::empty(),
        SigSet::empty(),
    );
    // SAFETY: the handler only performs an atomic store, which is
    // async-signal-safe.
    unsafe { sigaction(Signal::SIGINT, &action) }
        .map_err(|err| LaunchError::from(eyre!("failed to install SIGINT handler: {err}")))?;
    Ok(())
}

/// Blocks until Enter is pressed, stdin closes, or a SIGINT has been noted.
///
/// Stdin is read from a helper thread so the interrupt flag can be polled
/// even while no input arrives; the thread is abandoned on interruption and
/// dies with the process.
fn wait_for_shutdown_request() -> Result<()> {
    let (sender, receiver) = mpsc::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        let outcome = std::io::stdin().read_line(&mut line);
        drop(sender.send(outcome));
    });
    loop {
        if INTERRUPTED.load(Ordering::SeqCst) {
            return Ok(());
        }
        match receiver.recv_timeout(INTERRUPT_POLL_INTERVAL) {
            Ok(Ok(_)) | Err(mpsc::RecvTimeoutError::Disconnected) => return Ok(()),
            Ok(Err(err)) => {
                return Err(LaunchError::from(eyre!("failed to read from stdin: {err}")).into());
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }
    }
}

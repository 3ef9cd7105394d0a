#![cfg(unix)]
//! End-to-end lifecycle coverage against an installed `PostgreSQL`
//! distribution.
//!
//! These tests shell out to the real `initdb`/`postgres` binaries and are
//! gated behind the `live-tests` feature. When no distribution is installed
//! they log a skip marker and pass, mirroring the launcher's contract that
//! tool lookup fails before anything is spawned.

use std::sync::Once;
use std::time::Duration;

use color_eyre::eyre::{Context, Result, ensure};
use pg_ephemeral::{EphemeralPostgres, InstanceOptions, Toolchain};

const SKIP: &str = "SKIP-PG-EPHEMERAL";

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        drop(tracing_subscriber::fmt().with_test_writer().try_init());
    });
}

fn toolchain_available() -> bool {
    Toolchain::locate(&[]).is_ok()
}

fn live_options() -> InstanceOptions {
    InstanceOptions {
        volatile: true,
        start_timeout: Duration::from_secs(60),
        ..InstanceOptions::default()
    }
}

#[test]
fn volatile_scenario_with_created_database() -> Result<()> {
    init_tracing();
    if !toolchain_available() {
        tracing::warn!("{SKIP}: postgres binaries not installed");
        return Ok(());
    }

    let mut instance = EphemeralPostgres::launch(InstanceOptions {
        create_db: Some("somedb".to_owned()),
        ..live_options()
    })?;

    let dsn = instance.dsn();
    ensure!(dsn.contains("dbname=somedb"), "DSN should name the database: {dsn}");

    let mut client =
        postgres::Client::connect(&dsn, postgres::NoTls).wrap_err("connect via DSN")?;
    let row = client.query_one("SELECT 1", &[])?;
    let one: i32 = row.get(0);
    ensure!(one == 1, "SELECT 1 should return 1, got {one}");
    drop(client);

    let data_dir = instance.data_dir().to_owned();
    instance.stop();
    // Second stop must be a no-op.
    instance.stop();
    ensure!(
        !data_dir.exists(),
        "volatile data directory should be removed, {data_dir} persists"
    );
    Ok(())
}

#[test]
fn persistent_instance_keeps_data_dir() -> Result<()> {
    init_tracing();
    if !toolchain_available() {
        tracing::warn!("{SKIP}: postgres binaries not installed");
        return Ok(());
    }

    let mut instance = EphemeralPostgres::launch(InstanceOptions {
        volatile: false,
        ..live_options()
    })?;
    let data_dir = instance.data_dir().to_owned();
    instance.stop();

    ensure!(data_dir.exists(), "persistent data directory should survive stop");
    ensure!(
        data_dir.join("postgresql.conf").is_file(),
        "data directory should still be an initialised cluster"
    );
    std::fs::remove_dir_all(data_dir.as_std_path()).wrap_err("clean up persistent dir")?;
    Ok(())
}

#[test]
fn databases_can_be_created_after_launch() -> Result<()> {
    init_tracing();
    if !toolchain_available() {
        tracing::warn!("{SKIP}: postgres binaries not installed");
        return Ok(());
    }

    let instance = EphemeralPostgres::launch(live_options())?;
    instance.create_database("created_later")?;

    let dsn = format!("{} dbname=created_later", instance.dsn());
    let mut client =
        postgres::Client::connect(&dsn, postgres::NoTls).wrap_err("connect to created db")?;
    let row = client.query_one("SELECT current_database()", &[])?;
    let name: String = row.get(0);
    ensure!(name == "created_later", "connected to unexpected database {name}");
    Ok(())
}

#[test]
fn reusing_an_initialised_data_dir_skips_initdb() -> Result<()> {
    init_tracing();
    if !toolchain_available() {
        tracing::warn!("{SKIP}: postgres binaries not installed");
        return Ok(());
    }

    // First run initialises the directory, second run reuses it.
    let mut first = EphemeralPostgres::launch(InstanceOptions {
        volatile: false,
        ..live_options()
    })?;
    let data_dir = first.data_dir().to_owned();
    first.stop();

    let mut second = EphemeralPostgres::launch(InstanceOptions {
        volatile: true,
        data_dir: Some(data_dir.clone()),
        ..live_options()
    })?;
    second.stop();
    ensure!(
        !data_dir.exists(),
        "volatile reuse should remove the directory at teardown"
    );
    Ok(())
}

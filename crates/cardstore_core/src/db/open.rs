//! Connection bootstrap for the read-write and read-only store handles.
//!
//! # Invariants
//! - Read-write connections have `foreign_keys=ON` and a 5s busy timeout.
//! - File-backed read-write connections run in WAL mode so that readers on a
//!   second connection keep a stable snapshot while a write commits.

use super::{DbResult, StorageTarget};
use log::{error, info, warn};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens the read-write handle for `target`.
///
/// # Side effects
/// - Creates the database file when it does not exist yet.
/// - Emits `db_open` logging events with duration and status.
pub fn open_read_write(target: &StorageTarget) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = target.mode();
    info!("event=db_open module=db status=start role=read_write mode={mode}");

    let result = connect_writer(target);

    log_outcome("read_write", mode, started_at, &result);
    result
}

/// Opens a read-only handle on an existing database file.
pub fn open_read_only(path: &Path) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start role=read_only mode=file");

    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
        | OpenFlags::SQLITE_OPEN_NO_MUTEX
        | OpenFlags::SQLITE_OPEN_URI;
    let result: DbResult<Connection> = Connection::open_with_flags(path, flags)
        .and_then(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            Ok(conn)
        })
        .map_err(Into::into);

    log_outcome("read_only", "file", started_at, &result);
    result
}

fn connect_writer(target: &StorageTarget) -> DbResult<Connection> {
    let conn = match target {
        StorageTarget::File(path) => Connection::open(path)?,
        StorageTarget::Memory => Connection::open_in_memory()?,
    };
    bootstrap_writer(&conn, matches!(target, StorageTarget::File(_)))?;
    Ok(conn)
}

fn bootstrap_writer(conn: &Connection, wal: bool) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    if wal {
        // journal_mode returns the resulting mode, which may not be WAL.
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            warn!("event=db_open module=db status=degraded role=read_write journal_mode={mode}");
        }
    }
    Ok(())
}

fn log_outcome(role: &str, mode: &str, started_at: Instant, result: &DbResult<Connection>) {
    match result {
        Ok(_) => info!(
            "event=db_open module=db status=ok role={role} mode={mode} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error role={role} mode={mode} duration_ms={} error_code=db_open_failed error={err}",
            started_at.elapsed().as_millis()
        ),
    }
}

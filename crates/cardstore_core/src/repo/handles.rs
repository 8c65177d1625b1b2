//! Read-write and read-only connection handles owned by one record store.
//!
//! # Invariants
//! - The read-write handle exists for the whole store lifetime.
//! - File stores read through a small pool of read-only connections. The
//!   first one opens on first read; a nested or concurrent read checks out
//!   its own connection instead of waiting on a busy one.
//! - In-memory stores route reads through the read-write handle, since a
//!   second connection would see a different private database. Re-entering
//!   that handle from the thread holding it fails with
//!   `DbError::HandleInUse` instead of blocking forever.

use crate::db::{open_read_only, open_read_write, DbError, DbResult, StorageTarget};
use rusqlite::Connection;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, ThreadId};

/// Idle read-only connections kept open between reads.
const MAX_IDLE_READERS: usize = 4;

pub(crate) struct ConnectionHandles {
    target: StorageTarget,
    writer: Mutex<Connection>,
    writer_owner: Mutex<Option<ThreadId>>,
    idle_readers: Mutex<Vec<Connection>>,
    readers_opened: AtomicUsize,
}

/// Writer lock that remembers which thread holds it.
struct WriterGuard<'h> {
    conn: MutexGuard<'h, Connection>,
    owner: &'h Mutex<Option<ThreadId>>,
}

impl Drop for WriterGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut owner) = self.owner.lock() {
            *owner = None;
        }
    }
}

impl ConnectionHandles {
    pub(crate) fn open(target: StorageTarget) -> DbResult<Self> {
        let writer = open_read_write(&target)?;
        Ok(Self {
            target,
            writer: Mutex::new(writer),
            writer_owner: Mutex::new(None),
            idle_readers: Mutex::new(Vec::new()),
            readers_opened: AtomicUsize::new(0),
        })
    }

    /// Runs `f` on the read-write connection.
    pub(crate) fn with_writer<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<DbError>,
    {
        let guard = self.lock_writer()?;
        f(&guard.conn)
    }

    /// Runs `f` on a connection suited for reads.
    ///
    /// File stores hand `f` a pooled read-only connection that no other
    /// caller uses until `f` returns.
    pub(crate) fn with_reader<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<DbError>,
    {
        match &self.target {
            StorageTarget::Memory => self.with_writer(f),
            StorageTarget::File(path) => {
                let conn = self.checkout_reader(path)?;
                let result = f(&conn);
                self.checkin_reader(conn);
                result
            }
        }
    }

    /// Whether a dedicated read-only connection has been opened.
    pub(crate) fn has_read_handle(&self) -> bool {
        self.read_handles_opened() > 0
    }

    /// Read-only connections opened so far, idle or not.
    pub(crate) fn read_handles_opened(&self) -> usize {
        self.readers_opened.load(Ordering::Relaxed)
    }

    pub(crate) fn target(&self) -> &StorageTarget {
        &self.target
    }

    /// Closes every handle, reporting the first failure.
    pub(crate) fn close(self) -> DbResult<()> {
        let readers = self
            .idle_readers
            .into_inner()
            .map_err(|_| DbError::ConnectionPoisoned)?;
        let reader_result = readers
            .into_iter()
            .map(close_connection)
            .fold(Ok(()), |result, next| result.and(next));
        let writer_result = self
            .writer
            .into_inner()
            .map_err(|_| DbError::ConnectionPoisoned)
            .and_then(close_connection);
        reader_result.and(writer_result)
    }

    fn lock_writer(&self) -> DbResult<WriterGuard<'_>> {
        let current = thread::current().id();
        if *self.lock_owner()? == Some(current) {
            return Err(DbError::HandleInUse);
        }
        let conn = self.writer.lock().map_err(|_| DbError::ConnectionPoisoned)?;
        *self.lock_owner()? = Some(current);
        Ok(WriterGuard {
            conn,
            owner: &self.writer_owner,
        })
    }

    fn lock_owner(&self) -> DbResult<MutexGuard<'_, Option<ThreadId>>> {
        self.writer_owner
            .lock()
            .map_err(|_| DbError::ConnectionPoisoned)
    }

    fn checkout_reader(&self, path: &Path) -> DbResult<Connection> {
        let idle = self
            .idle_readers
            .lock()
            .map_err(|_| DbError::ConnectionPoisoned)?
            .pop();
        match idle {
            Some(conn) => Ok(conn),
            None => {
                let conn = open_read_only(path)?;
                self.readers_opened.fetch_add(1, Ordering::Relaxed);
                Ok(conn)
            }
        }
    }

    fn checkin_reader(&self, conn: Connection) {
        // A poisoned or full pool drops the connection, which closes it.
        if let Ok(mut idle) = self.idle_readers.lock() {
            if idle.len() < MAX_IDLE_READERS {
                idle.push(conn);
            }
        }
    }
}

fn close_connection(conn: Connection) -> DbResult<()> {
    conn.close().map_err(|(_, err)| DbError::Sqlite(err))
}

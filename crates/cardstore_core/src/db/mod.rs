//! SQLite connection bootstrap and table introspection.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections in read-write or read-only mode.
//! - Verify that the table served by a record store is present before use.
//!
//! # Invariants
//! - Every error raised while opening a store is reported as `DbError`; a
//!   store that failed to open is never handed out.
//! - Table and column names reaching SQL text are validated identifiers.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod open;
pub mod schema;

pub use open::{open_read_only, open_read_write};

pub type DbResult<T> = Result<T, DbError>;

/// Physical location of the SQLite database backing a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageTarget {
    /// Database file on disk. Readers and writers use separate connections.
    File(PathBuf),
    /// Private in-memory database. One connection serves both roles.
    Memory,
}

impl StorageTarget {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub(crate) fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory => "memory",
        }
    }
}

/// Storage engine failures, including store initialization errors.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    InvalidIdentifier(String),
    MissingTable(String),
    MissingColumn { table: String, column: String },
    /// The id column exists but is not an `INTEGER PRIMARY KEY` row-id alias.
    IdColumnNotRowId { table: String, column: String },
    /// The calling thread already holds the only connection of this store,
    /// typically from inside an open in-memory cursor.
    HandleInUse,
    /// A thread panicked while holding a connection handle.
    ConnectionPoisoned,
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::InvalidIdentifier(value) => {
                write!(f, "`{value}` is not a valid SQL identifier")
            }
            Self::MissingTable(table) => write!(f, "required table `{table}` does not exist"),
            Self::MissingColumn { table, column } => {
                write!(f, "required column `{table}.{column}` does not exist")
            }
            Self::IdColumnNotRowId { table, column } => write!(
                f,
                "column `{table}.{column}` must be declared INTEGER PRIMARY KEY"
            ),
            Self::HandleInUse => {
                write!(f, "connection handle is already held by this thread")
            }
            Self::ConnectionPoisoned => write!(f, "connection handle poisoned by a panic"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

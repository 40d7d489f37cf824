//! SQLite storage bootstrap and schema migration entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the note store.
//! - Apply schema migrations in deterministic order.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - No note is read or written before migrations succeed.
//! - Errors here are about reaching a usable `notes` table; query failures
//!   on an open store belong to `RepoError`.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

/// File name used when callers do not configure a database path.
pub const DEFAULT_DB_FILE_NAME: &str = "ephemeral_notes.sqlite3";

pub type DbResult<T> = Result<T, DbError>;

/// Failure to bring a note database into a usable state.
#[derive(Debug)]
pub enum DbError {
    /// The database file (or `:memory:`) could not be opened.
    Open {
        location: String,
        source: rusqlite::Error,
    },
    /// Pragmas or migrations failed on an opened connection.
    Bootstrap(rusqlite::Error),
    /// The file was written by a newer build with an unknown notes schema.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { location, source } => {
                write!(f, "cannot open note database `{location}`: {source}")
            }
            Self::Bootstrap(err) => write!(f, "cannot prepare note database: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "note database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Open { source, .. } => Some(source),
            Self::Bootstrap(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Bootstrap(value)
    }
}

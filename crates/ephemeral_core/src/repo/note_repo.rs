//! Note store contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist note records keyed by their opaque id.
//! - Provide the atomic view-increment primitive the engine relies on.
//!
//! # Invariants
//! - Every counter change is a single `UPDATE ... RETURNING` statement; no
//!   read-modify-write happens in Rust.
//! - A colliding id is regenerated, never overwritten.
//! - Deletes are hard and idempotent.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::{current_version, latest_version};
use crate::db::DbError;
use crate::model::note::{validate_limits, Note, NoteDraft, NoteId, NoteValidationError};
use log::warn;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const NOTE_COLUMNS: &str = "id, content, max_views, current_views, expires_at, created_at";
const MAX_ID_ATTEMPTS: usize = 5;

pub type RepoResult<T> = Result<T, RepoError>;

/// Storage-level failure for note persistence.
#[derive(Debug)]
pub enum RepoError {
    Validation(NoteValidationError),
    Sqlite(rusqlite::Error),
    Db(DbError),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    IdSpaceExhausted {
        attempts: usize,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Sqlite(err) => write!(f, "note query failed: {err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted note data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
            Self::IdSpaceExhausted { attempts } => {
                write!(f, "no free note id after {attempts} attempts")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Sqlite(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NoteValidationError> for RepoError {
    fn from(value: NoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Persistence contract for notes.
///
/// Implementations must make `increment_view` atomic with respect to
/// concurrent callers on the same id.
pub trait NoteStore {
    /// Persists a new note with `current_views = 0` under a fresh id.
    fn create_note(&self, draft: &NoteDraft) -> RepoResult<NoteId>;
    /// Fetches one note without mutating it.
    fn get_note(&self, id: &NoteId) -> RepoResult<Option<Note>>;
    /// Adds one view unconditionally and returns the post-increment record.
    fn increment_view(&self, id: &NoteId) -> RepoResult<Option<Note>>;
    /// Removes a note permanently. Missing ids are not an error.
    fn delete_note(&self, id: &NoteId) -> RepoResult<()>;
    /// Removes every note expired at `now_ms` and returns how many went.
    fn purge_expired(&self, now_ms: i64) -> RepoResult<usize>;
}

impl<S: NoteStore + ?Sized> NoteStore for &S {
    fn create_note(&self, draft: &NoteDraft) -> RepoResult<NoteId> {
        (**self).create_note(draft)
    }

    fn get_note(&self, id: &NoteId) -> RepoResult<Option<Note>> {
        (**self).get_note(id)
    }

    fn increment_view(&self, id: &NoteId) -> RepoResult<Option<Note>> {
        (**self).increment_view(id)
    }

    fn delete_note(&self, id: &NoteId) -> RepoResult<()> {
        (**self).delete_note(id)
    }

    fn purge_expired(&self, now_ms: i64) -> RepoResult<usize> {
        (**self).purge_expired(now_ms)
    }
}

/// SQLite-backed note store.
///
/// Borrows one connection; concurrent callers each open their own
/// connection to the same database file.
pub struct SqliteNoteStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteStore<'conn> {
    /// Constructs a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let actual_version = current_version(conn)?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }

    /// Inserts `draft` under ids drawn from `next_id`, skipping ids that
    /// are already taken.
    fn create_note_with<F>(&self, draft: &NoteDraft, mut next_id: F) -> RepoResult<NoteId>
    where
        F: FnMut() -> NoteId,
    {
        draft.validate()?;

        for _ in 0..MAX_ID_ATTEMPTS {
            let id = next_id();
            let inserted = self.conn.execute(
                "INSERT INTO notes (id, content, max_views, current_views, expires_at, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4, ?5);",
                params![
                    id.as_str(),
                    draft.content.as_str(),
                    draft.max_views,
                    draft.expires_at,
                    draft.created_at,
                ],
            );

            match inserted {
                Ok(_) => return Ok(id),
                Err(err) if is_primary_key_conflict(&err) => {
                    warn!("event=note_create module=repo status=retry error_code=id_collision");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(RepoError::IdSpaceExhausted {
            attempts: MAX_ID_ATTEMPTS,
        })
    }
}

impl NoteStore for SqliteNoteStore<'_> {
    fn create_note(&self, draft: &NoteDraft) -> RepoResult<NoteId> {
        self.create_note_with(draft, NoteId::generate)
    }

    fn get_note(&self, id: &NoteId) -> RepoResult<Option<Note>> {
        self.conn
            .query_row(
                &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1;"),
                [id.as_str()],
                read_note_row,
            )
            .optional()?
            .transpose()
    }

    fn increment_view(&self, id: &NoteId) -> RepoResult<Option<Note>> {
        self.conn
            .query_row(
                &format!(
                    "UPDATE notes
                     SET current_views = current_views + 1
                     WHERE id = ?1
                     RETURNING {NOTE_COLUMNS};"
                ),
                [id.as_str()],
                read_note_row,
            )
            .optional()?
            .transpose()
    }

    fn delete_note(&self, id: &NoteId) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM notes WHERE id = ?1;", [id.as_str()])?;
        Ok(())
    }

    fn purge_expired(&self, now_ms: i64) -> RepoResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM notes
             WHERE (expires_at IS NOT NULL AND expires_at <= ?1)
                OR (max_views IS NOT NULL AND current_views >= max_views);",
            [now_ms],
        )?;
        Ok(removed)
    }
}

fn is_primary_key_conflict(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

/// Maps one row; the outer result carries SQLite errors, the inner one
/// carries invariant violations in stored data.
fn read_note_row(row: &Row<'_>) -> rusqlite::Result<RepoResult<Note>> {
    let id_text: String = row.get("id")?;
    let content: String = row.get("content")?;
    let max_views: Option<i64> = row.get("max_views")?;
    let current_views: i64 = row.get("current_views")?;
    let expires_at: Option<i64> = row.get("expires_at")?;
    let created_at: i64 = row.get("created_at")?;

    Ok(build_note(
        &id_text,
        content,
        max_views,
        current_views,
        expires_at,
        created_at,
    ))
}

fn build_note(
    id_text: &str,
    content: String,
    max_views: Option<i64>,
    current_views: i64,
    expires_at: Option<i64>,
    created_at: i64,
) -> RepoResult<Note> {
    let id = NoteId::parse(id_text)
        .map_err(|_| RepoError::InvalidData(format!("invalid id `{id_text}` in notes.id")))?;

    validate_limits(max_views, expires_at)
        .map_err(|err| RepoError::InvalidData(format!("note {id}: {err}")))?;

    let max_views = max_views
        .map(u32::try_from)
        .transpose()
        .map_err(|_| RepoError::InvalidData(format!("note {id}: max_views out of range")))?;

    if current_views < 0 {
        return Err(RepoError::InvalidData(format!(
            "note {id}: {}",
            NoteValidationError::NegativeViewCount(current_views)
        )));
    }
    let current_views = u32::try_from(current_views)
        .map_err(|_| RepoError::InvalidData(format!("note {id}: current_views out of range")))?;

    Ok(Note {
        id,
        content,
        max_views,
        current_views,
        expires_at,
        created_at,
    })
}

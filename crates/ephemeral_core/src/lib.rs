//! Core engine for ephemeral, self-destructing notes.
//! Owns the note store and the expiration rules every caller goes through.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LogConfig};
pub use model::note::{
    now_epoch_ms, ExpirationPolicy, ExpiryReason, Note, NoteDraft, NoteId, NoteValidationError,
    NOTE_ID_LEN,
};
pub use repo::note_repo::{NoteStore, RepoError, RepoResult, SqliteNoteStore};
pub use service::expiration_engine::{ConsumeOutcome, EngineError, ExpirationEngine, ViewState};
pub use service::share::share_url;

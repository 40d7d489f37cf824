//! Expiration engine: creation and one-time consumption of notes.
//!
//! # Responsibility
//! - Validate create requests and resolve their expiration policy.
//! - Run the fetch, check, increment, re-check, delete sequence for viewers.
//!
//! # Invariants
//! - The view counter only moves through the store's atomic increment.
//! - Every caller whose increment lands receives the content.
//! - For a view-limited note exactly one caller observes the final view.
//! - Storage failures propagate unchanged; nothing is retried.
//! - Logs carry outcome metadata only, never content or ids.

use crate::model::note::{
    ExpirationPolicy, ExpiryReason, Note, NoteDraft, NoteId, NoteValidationError,
};
use crate::repo::note_repo::{NoteStore, RepoError};
use log::{debug, error, info};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Failure of a create or consume call.
#[derive(Debug)]
pub enum EngineError {
    /// Caller input was rejected; the caller should re-prompt.
    Validation(NoteValidationError),
    /// Persistence failed; the operation was aborted.
    Storage(RepoError),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "invalid note request: {err}"),
            Self::Storage(err) => write!(f, "note storage failure: {err}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
        }
    }
}

impl From<NoteValidationError> for EngineError {
    fn from(value: NoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for EngineError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Storage(other),
        }
    }
}

/// Result of one viewer access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConsumeOutcome {
    /// No note exists under the id.
    NotFound,
    /// The note was already expired before this access and has been deleted.
    Expired { reason: ExpiryReason },
    /// The note was live; `final_view` is set when this view destroyed it.
    Delivered { content: String, final_view: bool },
}

/// The three states a presentation layer distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewState {
    Unavailable,
    Delivered,
    DeliveredAndDestroyed,
}

impl ConsumeOutcome {
    pub fn view_state(&self) -> ViewState {
        match self {
            Self::NotFound | Self::Expired { .. } => ViewState::Unavailable,
            Self::Delivered {
                final_view: false, ..
            } => ViewState::Delivered,
            Self::Delivered {
                final_view: true, ..
            } => ViewState::DeliveredAndDestroyed,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Expired { reason } => match reason {
                ExpiryReason::Time => "expired_time",
                ExpiryReason::Views => "expired_views",
            },
            Self::Delivered {
                final_view: false, ..
            } => "delivered",
            Self::Delivered {
                final_view: true, ..
            } => "delivered_final",
        }
    }
}

/// Expiration engine over a note store.
pub struct ExpirationEngine<S: NoteStore> {
    store: S,
}

impl<S: NoteStore> ExpirationEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Read access to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a note under `policy` and returns its id.
    ///
    /// # Errors
    /// - `Validation(EmptyContent)` when content is blank after trimming.
    /// - `Storage` when the insert fails.
    pub fn create(
        &self,
        content: impl Into<String>,
        policy: ExpirationPolicy,
        now_ms: i64,
    ) -> Result<NoteId, EngineError> {
        let started_at = Instant::now();
        let draft = NoteDraft::from_policy(content, policy, now_ms);

        let created = draft
            .validate()
            .map_err(EngineError::from)
            .and_then(|()| self.store.create_note(&draft).map_err(EngineError::from));

        match &created {
            Ok(_) => info!(
                "event=note_create module=engine status=ok policy={} content_bytes={} duration_ms={}",
                policy,
                draft.content.len(),
                started_at.elapsed().as_millis()
            ),
            Err(EngineError::Validation(err)) => debug!(
                "event=note_create module=engine status=rejected policy={} reason={}",
                policy, err
            ),
            Err(err) => error!(
                "event=note_create module=engine status=error policy={} duration_ms={} error={}",
                policy,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        created
    }

    /// Views a note at most as often as its policy allows.
    ///
    /// Content is delivered whenever the note was live at this caller's
    /// fetch and the row still existed at its increment, including the view
    /// that exhausts the note.
    pub fn consume(&self, id: &NoteId, now_ms: i64) -> Result<ConsumeOutcome, EngineError> {
        let started_at = Instant::now();
        let consumed = self.consume_inner(id, now_ms);

        match &consumed {
            Ok(outcome) => info!(
                "event=note_consume module=engine status=ok outcome={} duration_ms={}",
                outcome.label(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=note_consume module=engine status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            ),
        }
        consumed
    }

    /// Parses an untrusted id and consumes it; malformed ids are `NotFound`.
    pub fn consume_raw(&self, raw_id: &str, now_ms: i64) -> Result<ConsumeOutcome, EngineError> {
        match NoteId::parse(raw_id) {
            Ok(id) => self.consume(&id, now_ms),
            Err(_) => {
                debug!("event=note_consume module=engine status=ok outcome=malformed_id");
                Ok(ConsumeOutcome::NotFound)
            }
        }
    }

    /// Deletes every note already expired at `now_ms`.
    pub fn purge_expired(&self, now_ms: i64) -> Result<usize, EngineError> {
        let removed = self.store.purge_expired(now_ms)?;
        info!(
            "event=note_purge module=engine status=ok removed={}",
            removed
        );
        Ok(removed)
    }

    fn consume_inner(&self, id: &NoteId, now_ms: i64) -> Result<ConsumeOutcome, EngineError> {
        let Some(note) = self.store.get_note(id)? else {
            return Ok(ConsumeOutcome::NotFound);
        };

        if let Some(reason) = note.expiry_reason(now_ms) {
            self.store.delete_note(id)?;
            return Ok(ConsumeOutcome::Expired { reason });
        }

        let Some(viewed) = self.store.increment_view(id)? else {
            // Deleted by another caller between the fetch and the increment.
            return Ok(ConsumeOutcome::NotFound);
        };

        let expired = viewed.expiry_reason(now_ms);
        if expired.is_some() {
            // Racers past the limit delete too; the delete is idempotent.
            self.store.delete_note(id)?;
        }

        Ok(ConsumeOutcome::Delivered {
            final_view: is_final_view(&viewed, expired),
            content: viewed.content,
        })
    }
}

/// Whether this post-increment state is the one that closed the note.
///
/// Only the increment that lands exactly on `max_views` counts, so one
/// caller sees the final view even when several raced past the fetch.
fn is_final_view(viewed: &Note, expired: Option<ExpiryReason>) -> bool {
    match expired {
        Some(ExpiryReason::Views) => viewed.max_views == Some(viewed.current_views),
        Some(ExpiryReason::Time) => true,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{is_final_view, ConsumeOutcome, ViewState};
    use crate::model::note::{ExpiryReason, Note, NoteId};

    fn viewed(max_views: Option<u32>, current_views: u32) -> Note {
        Note {
            id: NoteId::generate(),
            content: "x".into(),
            max_views,
            current_views,
            expires_at: None,
            created_at: 0,
        }
    }

    #[test]
    fn only_the_increment_landing_on_the_limit_is_final() {
        let limit = Some(ExpiryReason::Views);
        assert!(is_final_view(&viewed(Some(3), 3), limit));
        assert!(!is_final_view(&viewed(Some(3), 4), limit));
        assert!(!is_final_view(&viewed(Some(3), 2), None));
        assert!(is_final_view(&viewed(None, 1), Some(ExpiryReason::Time)));
    }

    #[test]
    fn not_found_and_expired_share_one_view_state() {
        assert_eq!(ConsumeOutcome::NotFound.view_state(), ViewState::Unavailable);
        assert_eq!(
            ConsumeOutcome::Expired {
                reason: ExpiryReason::Time
            }
            .view_state(),
            ViewState::Unavailable
        );
    }

    #[test]
    fn final_flag_selects_destroyed_state() {
        let last = ConsumeOutcome::Delivered {
            content: "x".into(),
            final_view: true,
        };
        assert_eq!(last.view_state(), ViewState::DeliveredAndDestroyed);
        assert_eq!(last.label(), "delivered_final");
    }
}

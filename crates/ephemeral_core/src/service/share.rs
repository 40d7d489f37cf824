//! Share link construction for created notes.

use crate::model::note::NoteId;

/// Path segment under which notes are served.
pub const NOTE_PATH_SEGMENT: &str = "note";

/// Builds the public link a creator hands out, `<base>/note/<id>`.
pub fn share_url(base_url: &str, id: &NoteId) -> String {
    format!(
        "{}/{NOTE_PATH_SEGMENT}/{id}",
        base_url.trim().trim_end_matches('/')
    )
}

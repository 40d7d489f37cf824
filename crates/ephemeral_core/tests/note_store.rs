use ephemeral_core::db::open_db_in_memory;
use ephemeral_core::{
    ExpirationPolicy, NoteDraft, NoteId, NoteStore, NoteValidationError, RepoError,
    SqliteNoteStore,
};

const NOW: i64 = 1_700_000_000_000;

#[test]
fn create_and_fetch_roundtrip_keeps_content_verbatim() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();

    let draft = NoteDraft::from_policy("  line one\nline two  ", ExpirationPolicy::FiveViews, NOW);
    let id = store.create_note(&draft).unwrap();

    let note = store.get_note(&id).unwrap().unwrap();
    assert_eq!(note.id, id);
    assert_eq!(note.content, "  line one\nline two  ");
    assert_eq!(note.max_views, Some(5));
    assert_eq!(note.current_views, 0);
    assert_eq!(note.expires_at, None);
    assert_eq!(note.created_at, NOW);
}

#[test]
fn time_policy_stores_absolute_expiry() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();

    let draft = NoteDraft::from_policy("x", ExpirationPolicy::OneHour, NOW);
    let id = store.create_note(&draft).unwrap();

    let note = store.get_note(&id).unwrap().unwrap();
    assert_eq!(note.max_views, None);
    assert_eq!(note.expires_at, Some(NOW + 3_600_000));
}

#[test]
fn fetch_does_not_mutate() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();
    let id = store
        .create_note(&NoteDraft::from_policy("x", ExpirationPolicy::OneView, NOW))
        .unwrap();

    for _ in 0..3 {
        assert_eq!(store.get_note(&id).unwrap().unwrap().current_views, 0);
    }
}

#[test]
fn fetch_missing_returns_none() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();

    assert!(store.get_note(&NoteId::generate()).unwrap().is_none());
}

#[test]
fn create_rejects_blank_content() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();

    let err = store
        .create_note(&NoteDraft::from_policy("   ", ExpirationPolicy::OneView, NOW))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(NoteValidationError::EmptyContent)
    ));
}

#[test]
fn increment_returns_sequential_post_increment_counts() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();
    let id = store
        .create_note(&NoteDraft::unlimited("counter", NOW))
        .unwrap();

    let counts: Vec<u32> = (0..4)
        .map(|_| store.increment_view(&id).unwrap().unwrap().current_views)
        .collect();
    assert_eq!(counts, vec![1, 2, 3, 4]);
    assert_eq!(store.get_note(&id).unwrap().unwrap().current_views, 4);
}

#[test]
fn increment_missing_returns_none() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();

    assert!(store.increment_view(&NoteId::generate()).unwrap().is_none());
}

#[test]
fn increment_counts_past_view_limit_without_deciding_expiry() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();
    let id = store
        .create_note(&NoteDraft::from_policy("x", ExpirationPolicy::OneView, NOW))
        .unwrap();

    assert_eq!(store.increment_view(&id).unwrap().unwrap().current_views, 1);
    assert_eq!(store.increment_view(&id).unwrap().unwrap().current_views, 2);
    assert!(store.get_note(&id).unwrap().is_some());
}

#[test]
fn delete_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();
    let id = store
        .create_note(&NoteDraft::from_policy("x", ExpirationPolicy::OneView, NOW))
        .unwrap();

    store.delete_note(&id).unwrap();
    store.delete_note(&id).unwrap();
    store.delete_note(&NoteId::generate()).unwrap();

    assert!(store.get_note(&id).unwrap().is_none());
}

#[test]
fn purge_removes_only_expired_notes() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();

    let timed = store
        .create_note(&NoteDraft::from_policy("t", ExpirationPolicy::TenMinutes, NOW))
        .unwrap();
    let exhausted = store
        .create_note(&NoteDraft::from_policy("v", ExpirationPolicy::OneView, NOW))
        .unwrap();
    store.increment_view(&exhausted).unwrap();
    let live = store
        .create_note(&NoteDraft::from_policy("l", ExpirationPolicy::FiveViews, NOW))
        .unwrap();
    let unlimited = store.create_note(&NoteDraft::unlimited("u", NOW)).unwrap();

    let removed = store.purge_expired(NOW + 600_000).unwrap();
    assert_eq!(removed, 2);
    assert!(store.get_note(&timed).unwrap().is_none());
    assert!(store.get_note(&exhausted).unwrap().is_none());
    assert!(store.get_note(&live).unwrap().is_some());
    assert!(store.get_note(&unlimited).unwrap().is_some());
}

#[test]
fn out_of_range_rows_surface_as_invalid_data() {
    let conn = open_db_in_memory().unwrap();
    let id = NoteId::generate();
    conn.execute(
        "INSERT INTO notes (id, content, max_views, current_views, created_at)
         VALUES (?1, 'x', 5000000000, 0, 0);",
        [id.as_str()],
    )
    .unwrap();

    let store = SqliteNoteStore::try_new(&conn).unwrap();
    let err = store.get_note(&id).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(message) if message.contains("max_views")));
}

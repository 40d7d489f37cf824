use ephemeral_core::db::open_db;
use ephemeral_core::{
    ConsumeOutcome, ExpirationEngine, ExpirationPolicy, NoteDraft, NoteId, NoteStore,
    SqliteNoteStore,
};
use std::path::Path;
use std::sync::Barrier;
use std::thread;

const NOW: i64 = 1_700_000_000_000;

fn create_note(path: &Path, draft: &NoteDraft) -> NoteId {
    let conn = open_db(path).unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();
    store.create_note(draft).unwrap()
}

/// Runs `callers` concurrent consumes, each on its own connection.
fn consume_concurrently(path: &Path, id: &NoteId, callers: usize) -> Vec<ConsumeOutcome> {
    let barrier = &Barrier::new(callers);
    thread::scope(|scope| {
        let handles: Vec<_> = (0..callers)
            .map(|_| {
                scope.spawn(move || {
                    let conn = open_db(path).unwrap();
                    let engine = ExpirationEngine::new(SqliteNoteStore::try_new(&conn).unwrap());
                    barrier.wait();
                    engine.consume(id, NOW).unwrap()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    })
}

fn count_delivered(outcomes: &[ConsumeOutcome], final_view: bool) -> usize {
    outcomes
        .iter()
        .filter(|outcome| {
            matches!(outcome, ConsumeOutcome::Delivered { final_view: f, .. } if *f == final_view)
        })
        .count()
}

fn assert_unavailable_or_delivered(outcomes: &[ConsumeOutcome], content: &str) {
    for outcome in outcomes {
        match outcome {
            ConsumeOutcome::Delivered { content: got, .. } => assert_eq!(got, content),
            ConsumeOutcome::NotFound | ConsumeOutcome::Expired { .. } => {}
        }
    }
}

#[test]
fn concurrent_viewers_of_single_view_note_see_one_final_view() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("race.db");
    let id = create_note(
        &path,
        &NoteDraft::from_policy("burn", ExpirationPolicy::OneView, NOW),
    );

    let outcomes = consume_concurrently(&path, &id, 16);

    assert_eq!(count_delivered(&outcomes, true), 1);
    assert_unavailable_or_delivered(&outcomes, "burn");

    let conn = open_db(&path).unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();
    assert!(store.get_note(&id).unwrap().is_none());
}

#[test]
fn concurrent_viewers_share_one_final_view_and_leave_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("limit.db");
    let id = create_note(
        &path,
        &NoteDraft::from_policy("five", ExpirationPolicy::FiveViews, NOW),
    );

    let outcomes = consume_concurrently(&path, &id, 24);

    assert_eq!(count_delivered(&outcomes, true), 1);
    let delivered = count_delivered(&outcomes, true) + count_delivered(&outcomes, false);
    assert!(delivered >= 5, "only {delivered} viewers received content");
    assert_unavailable_or_delivered(&outcomes, "five");

    let conn = open_db(&path).unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();
    assert!(store.get_note(&id).unwrap().is_none());
}

#[test]
fn concurrent_increments_are_never_lost() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 25;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("counter.db");
    let id = create_note(&path, &NoteDraft::unlimited("count me", NOW));
    let barrier = &Barrier::new(THREADS);
    let (path, id) = (&path, &id);

    let mut seen: Vec<u32> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(move || {
                    let conn = open_db(path).unwrap();
                    let store = SqliteNoteStore::try_new(&conn).unwrap();
                    barrier.wait();
                    (0..PER_THREAD)
                        .map(|_| store.increment_view(id).unwrap().unwrap().current_views)
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect()
    });

    seen.sort_unstable();
    let expected: Vec<u32> = (1..=(THREADS * PER_THREAD) as u32).collect();
    assert_eq!(seen, expected);

    let conn = open_db(path).unwrap();
    let store = SqliteNoteStore::try_new(&conn).unwrap();
    assert_eq!(
        store.get_note(id).unwrap().unwrap().current_views as usize,
        THREADS * PER_THREAD
    );
}

#[test]
fn independent_notes_are_consumed_in_parallel() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("parallel.db");
    // Bootstrap once so worker threads never race on migrations.
    drop(open_db(&path).unwrap());

    thread::scope(|scope| {
        for worker in 0..8 {
            let path = &path;
            scope.spawn(move || {
                let conn = open_db(path).unwrap();
                let engine = ExpirationEngine::new(SqliteNoteStore::try_new(&conn).unwrap());
                let content = format!("note {worker}");
                let id = engine
                    .create(content.as_str(), ExpirationPolicy::OneView, NOW)
                    .unwrap();
                assert_eq!(
                    engine.consume(&id, NOW).unwrap(),
                    ConsumeOutcome::Delivered {
                        content,
                        final_view: true
                    }
                );
            });
        }
    });
}

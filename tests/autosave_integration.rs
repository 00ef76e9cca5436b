//! End-to-end autosave tests: the client manager's debounced pipeline
//! driving the real service and store.

use std::time::{Duration, Instant};

use anyhow::Result;
use nota::{Database, NoteId, NoteManager, NoteMetaPatch, NoteService, SaveStatus, ServiceSaveClient, UserId};

const CONTENT_WINDOW: Duration = Duration::from_millis(700);
const META_WINDOW: Duration = Duration::from_millis(550);

fn service_with_user() -> Result<(NoteService, UserId)> {
    let db = Database::in_memory()?;
    db.connection().execute(
        "INSERT INTO users (id, username, password_hash, security_question, security_answer_hash, created_at)
         VALUES (1, 'alice', 'x', 'q', 'x', 0)",
        [],
    )?;
    Ok((NoteService::new(db), UserId::new(1)))
}

fn loaded_manager(service: &NoteService, user: UserId) -> Result<NoteManager> {
    let mut manager = NoteManager::new();
    manager.set_notes(service.fetch_notes(user)?);
    Ok(manager)
}

fn version_count(service: &NoteService, note_id: NoteId) -> i64 {
    service
        .database()
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM note_versions WHERE note_id = ?1",
            [note_id.get()],
            |row| row.get(0),
        )
        .expect("failed to count versions")
}

#[test]
fn rapid_edits_produce_exactly_one_store_write_and_one_version() -> Result<()> {
    let (service, user) = service_with_user()?;
    let note = service.create_note(user, Some("draft"), "v1", None)?;
    let mut manager = loaded_manager(&service, user)?;
    let mut client = ServiceSaveClient::new(&service, user);

    // Two keystrokes inside the debounce window
    let t0 = Instant::now();
    manager.queue_content_edit(note.id(), "v2 partial", t0);
    manager.queue_content_edit(note.id(), "v2", t0 + Duration::from_millis(200));

    // Nothing hits the store until the window elapses
    assert_eq!(manager.drive(t0 + Duration::from_millis(400), &mut client), 0);
    assert_eq!(service.get_note(user, note.id())?.unwrap().content(), "v1");

    // One flush carries the latest content; one version snapshots "v1"
    let flushed = manager.drive(t0 + Duration::from_millis(200) + CONTENT_WINDOW, &mut client);
    assert_eq!(flushed, 1);
    assert_eq!(service.get_note(user, note.id())?.unwrap().content(), "v2");
    assert_eq!(version_count(&service, note.id()), 1);
    assert_eq!(manager.save_state(note.id()).status, SaveStatus::Saved);

    Ok(())
}

#[test]
fn metadata_flushes_independently_of_content() -> Result<()> {
    let (service, user) = service_with_user()?;
    let note = service.create_note(user, Some("draft"), "body", None)?;
    let mut manager = loaded_manager(&service, user)?;
    let mut client = ServiceSaveClient::new(&service, user);

    let t0 = Instant::now();
    manager.queue_content_edit(note.id(), "body!", t0);
    manager.queue_meta_edit(note.id(), NoteMetaPatch::tags(Some("work".into())), t0);

    // The shorter metadata window fires first
    assert_eq!(manager.drive(t0 + META_WINDOW, &mut client), 1);
    let stored = service.get_note(user, note.id())?.unwrap();
    assert_eq!(stored.tags(), Some("work"));
    assert_eq!(stored.content(), "body");

    assert_eq!(manager.drive(t0 + CONTENT_WINDOW, &mut client), 1);
    let stored = service.get_note(user, note.id())?.unwrap();
    assert_eq!(stored.content(), "body!");

    // Metadata patches never version content
    assert_eq!(version_count(&service, note.id()), 1);
    Ok(())
}

#[test]
fn failed_flush_keeps_the_edit_for_a_retry() -> Result<()> {
    let (service, user) = service_with_user()?;
    let note = service.create_note(user, Some("draft"), "v1", None)?;
    let mut manager = loaded_manager(&service, user)?;
    let mut client = ServiceSaveClient::new(&service, user);

    // Delete the note behind the manager's back; the flush will 404
    service.delete_note(user, note.id())?;

    let t0 = Instant::now();
    manager.queue_content_edit(note.id(), "doomed edit", t0);
    assert_eq!(manager.drive(t0 + CONTENT_WINDOW, &mut client), 1);

    let state = manager.save_state(note.id());
    assert_eq!(state.status, SaveStatus::Error);
    assert!(state.last_error.is_some());
    assert!(manager.has_unsaved_changes(), "the payload must stay queued");

    // Parked: plain ticks don't hammer the store
    assert_eq!(manager.drive(t0 + Duration::from_secs(30), &mut client), 0);

    // An explicit flush retries (and fails again, the note is gone)
    let t1 = t0 + Duration::from_secs(31);
    manager.flush_now(note.id(), t1);
    assert_eq!(manager.drive(t1, &mut client), 1);
    assert_eq!(manager.save_state(note.id()).status, SaveStatus::Error);

    Ok(())
}

#[test]
fn title_stays_in_sync_through_the_autosave_path() -> Result<()> {
    let (service, user) = service_with_user()?;
    // Created with no usable first line, so the title starts as "Untitled"
    let note = service.create_note(user, None, "", None)?;
    assert_eq!(note.title(), "Untitled");

    // Clear the stored title to simulate a user erasing it
    service
        .database()
        .connection()
        .execute("UPDATE notes SET title = '' WHERE id = ?1", [note.id().get()])?;

    let mut manager = loaded_manager(&service, user)?;
    let mut client = ServiceSaveClient::new(&service, user);

    let t0 = Instant::now();
    manager.queue_content_edit(note.id(), "Meeting notes\nagenda items", t0);
    manager.drive(t0 + CONTENT_WINDOW, &mut client);

    let stored = service.get_note(user, note.id())?.unwrap();
    assert_eq!(stored.title(), "Meeting notes");
    Ok(())
}

#[test]
fn interleaved_edits_across_notes_flush_separately() -> Result<()> {
    let (service, user) = service_with_user()?;
    let first = service.create_note(user, Some("first"), "a", None)?;
    let second = service.create_note(user, Some("second"), "b", None)?;
    let mut manager = loaded_manager(&service, user)?;
    let mut client = ServiceSaveClient::new(&service, user);

    let t0 = Instant::now();
    manager.queue_content_edit(first.id(), "a2", t0);
    // The second note is edited later; its window ends later
    manager.queue_content_edit(second.id(), "b2", t0 + Duration::from_millis(400));

    assert_eq!(manager.drive(t0 + CONTENT_WINDOW, &mut client), 1);
    assert_eq!(service.get_note(user, first.id())?.unwrap().content(), "a2");
    assert_eq!(service.get_note(user, second.id())?.unwrap().content(), "b");

    assert_eq!(
        manager.drive(t0 + Duration::from_millis(400) + CONTENT_WINDOW, &mut client),
        1
    );
    assert_eq!(service.get_note(user, second.id())?.unwrap().content(), "b2");

    Ok(())
}

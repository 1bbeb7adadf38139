//! Journal integration tests.
//!
//! Verifies:
//! - One undo/redo restores every file of a multi-file record
//! - Files changed behind the journal's back are skipped and reported
//! - Committing after an undo forks history
//! - Single-document operations stay on the native undo stack
//! - A journal whose store cannot open degrades to native undo
//! - A persistent journal resumes in a new session

use logos_journal::{
    ChangeSpan, ContentHash, Document, FileAction, FileId, Host, JournalConfig, JournalEvent,
    MemoryHost, RecordId, StoreConfig, UndoRedoCoordinator, UndoRedoOutcome,
};

use std::cell::RefCell;
use std::rc::Rc;

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn coordinator() -> UndoRedoCoordinator {
    UndoRedoCoordinator::new(JournalConfig::for_testing())
}

/// Apply the same spans to every file under one record.
fn record(
    c: &mut UndoRedoCoordinator,
    host: &mut MemoryHost,
    files: &[FileId],
    spans: &[ChangeSpan],
    description: &str,
) -> RecordId {
    let id = c.begin_record().expect("journal enabled");
    for &file in files {
        let (old, new) = host.apply_edit(file, spans).expect("edit applies");
        c.add_file_delta(host, id, file, &old, &new, spans).unwrap();
    }
    assert!(c.commit_record(host, id, description));
    id
}

/// Replace the whole text of every file with `to`.
fn rewrite_all(c: &mut UndoRedoCoordinator, host: &mut MemoryHost, files: &[FileId], to: &str) -> RecordId {
    let len = host.text(files[0]).unwrap().len();
    record(c, host, files, &[ChangeSpan::new(0, len, to)], &format!("rewrite to {to}"))
}

fn replayed(outcome: UndoRedoOutcome) -> logos_journal::ReplayReport {
    match outcome {
        UndoRedoOutcome::Replayed(report) => report,
        other => panic!("expected a replay, got {other:?}"),
    }
}

fn foo_to_baz() -> [ChangeSpan; 2] {
    [ChangeSpan::new(0, 3, "baz"), ChangeSpan::new(8, 11, "baz")]
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[test]
fn test_undo_redo_spans_open_and_closed_files() {
    let mut c = coordinator();
    let mut host = MemoryHost::new();
    let a = host.add_file("a.txt", "foo bar foo");
    let b = host.add_file("b.txt", "foo qux foo");
    host.open(a);

    let id = record(&mut c, &mut host, &[a, b], &foo_to_baz(), "Replace foo with baz");
    assert_eq!(host.text(a).unwrap(), "baz bar baz");
    assert_eq!(host.saved_text(b), Some("baz qux baz"));

    let report = replayed(c.undo(&mut host).unwrap());
    assert_eq!(report.id, id);
    assert_eq!(report.action(a), Some(FileAction::Native));
    assert_eq!(report.action(b), Some(FileAction::Saved));
    assert_eq!(host.text(a).unwrap(), "foo bar foo");
    assert_eq!(host.saved_text(a), Some("foo bar foo"));
    assert_eq!(host.saved_text(b), Some("foo qux foo"));
    assert_eq!(c.edit_log().cursor(), 0);

    let report = replayed(c.redo(&mut host).unwrap());
    assert!(report.skipped.is_empty());
    assert_eq!(host.text(a).unwrap(), "baz bar baz");
    assert_eq!(host.saved_text(b), Some("baz qux baz"));
    assert_eq!(c.edit_log().cursor(), 1);
    assert!(host.reports().is_empty());
}

#[test]
fn test_undo_then_redo_restores_recorded_digest() {
    let mut c = coordinator();
    let mut host = MemoryHost::new();
    let a = host.add_file("a.txt", "foo bar foo");
    let b = host.add_file("b.txt", "foo foo foo!");
    record(&mut c, &mut host, &[a, b], &foo_to_baz(), "Replace foo with baz");
    let after = ContentHash::of(host.saved_text(b).unwrap());

    c.undo_multi_file(&mut host).unwrap();
    c.redo_multi_file(&mut host).unwrap();
    assert_eq!(ContentHash::of(host.saved_text(b).unwrap()), after);
    assert_eq!(host.saved_text(b), Some("baz foo baz!"));
}

#[test]
fn test_externally_modified_file_is_skipped() {
    let mut c = coordinator();
    let mut host = MemoryHost::new();
    let a = host.add_file("a.txt", "foo bar foo");
    let b = host.add_file("b.txt", "foo qux foo");
    host.open(a);
    record(&mut c, &mut host, &[a, b], &foo_to_baz(), "Replace foo with baz");

    host.write_externally(b, "rewritten elsewhere");

    let report = replayed(c.undo(&mut host).unwrap());
    assert!(report.is_skipped(b));
    assert_eq!(host.text(a).unwrap(), "foo bar foo");
    assert_eq!(host.saved_text(b), Some("rewritten elsewhere"));
    assert_eq!(
        host.reports(),
        ["The multi-file undo operation skipped these files:\n\tb.txt. Modified since recorded."]
    );
}

#[test]
fn test_modified_open_document_is_left_alone() {
    let mut c = coordinator();
    let mut host = MemoryHost::new();
    let a = host.add_file("a.txt", "foo bar foo");
    let b = host.add_file("b.txt", "foo qux foo");
    record(&mut c, &mut host, &[a, b], &foo_to_baz(), "Replace foo with baz");

    host.open(b);
    host.apply_edit(b, &[ChangeSpan::new(0, 0, "// ")]).unwrap();

    let report = replayed(c.undo_multi_file(&mut host).unwrap());
    assert!(report.is_skipped(b));
    assert_eq!(host.text(b).unwrap(), "// baz qux baz");
    assert_eq!(host.saved_text(a), Some("foo bar foo"));
}

#[test]
fn test_file_opened_later_is_replaced_wholesale() {
    let mut c = coordinator();
    let mut host = MemoryHost::new();
    let a = host.add_file("a.txt", "foo bar foo");
    let b = host.add_file("b.txt", "foo qux foo");
    record(&mut c, &mut host, &[a, b], &foo_to_baz(), "Replace foo with baz");

    host.open(b);
    let report = replayed(c.undo_multi_file(&mut host).unwrap());
    assert_eq!(report.action(b), Some(FileAction::Replaced));
    assert_eq!(host.text(b).unwrap(), "foo qux foo");
    assert!(!host.document(b).unwrap().can_undo());
}

#[test]
fn test_history_fork_skips_superseded_records() {
    let mut c = coordinator();
    let mut host = MemoryHost::new();
    let files = [host.add_file("x.txt", "v0"), host.add_file("y.txt", "v0")];

    for v in ["v1", "v2", "v3"] {
        rewrite_all(&mut c, &mut host, &files, v);
    }
    c.undo_multi_file(&mut host).unwrap();
    c.undo_multi_file(&mut host).unwrap();
    assert_eq!(c.edit_log().cursor(), 1);
    assert_eq!(host.saved_text(files[0]), Some("v1"));

    let fork = rewrite_all(&mut c, &mut host, &files, "v4");
    assert_eq!(fork, RecordId(4));
    assert!(c.edit_log().is_invalidated(RecordId(2)));
    assert!(c.edit_log().is_invalidated(RecordId(3)));
    assert_eq!(c.redo_multi_file(&mut host).unwrap(), UndoRedoOutcome::Nothing);

    assert_eq!(replayed(c.undo_multi_file(&mut host).unwrap()).id, RecordId(4));
    assert_eq!(replayed(c.undo_multi_file(&mut host).unwrap()).id, RecordId(1));
    assert_eq!(host.saved_text(files[1]), Some("v0"));
    assert_eq!(c.undo_multi_file(&mut host).unwrap(), UndoRedoOutcome::Nothing);

    assert_eq!(replayed(c.redo_multi_file(&mut host).unwrap()).id, RecordId(1));
    let report = replayed(c.redo_multi_file(&mut host).unwrap());
    assert_eq!(report.id, RecordId(4));
    assert_eq!(host.saved_text(files[0]), Some("v4"));
    assert_eq!(host.saved_text(files[1]), Some("v4"));
}

#[test]
fn test_single_active_document_uses_native_undo() {
    let mut c = coordinator();
    let mut host = MemoryHost::new();
    let a = host.add_file("a.txt", "foo bar foo");
    host.open(a);
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    c.add_listener(move |e: &JournalEvent| sink.borrow_mut().push(e.clone()));

    let id = record(&mut c, &mut host, &[a], &foo_to_baz(), "Replace foo with baz");
    assert_eq!(*events.borrow(), vec![JournalEvent::NativeOnly { id, file: a }]);
    assert_eq!(c.stats().unwrap().record_count, 0);
    assert_eq!(c.undo_multi_file(&mut host).unwrap(), UndoRedoOutcome::Nothing);

    assert_eq!(c.undo(&mut host).unwrap(), UndoRedoOutcome::Native);
    assert_eq!(host.text(a).unwrap(), "foo bar foo");
    assert_eq!(host.document(a).unwrap().last_keep_selection(), Some(true));

    assert_eq!(c.redo(&mut host).unwrap(), UndoRedoOutcome::Native);
    assert_eq!(host.text(a).unwrap(), "baz bar baz");
}

#[test]
fn test_plain_edits_undo_natively() {
    let mut c = coordinator();
    let mut host = MemoryHost::new();
    let a = host.add_file("a.txt", "hello");
    host.open(a);
    host.apply_edit(a, &[ChangeSpan::new(5, 5, " world")]).unwrap();

    assert_eq!(c.undo(&mut host).unwrap(), UndoRedoOutcome::Native);
    assert_eq!(host.text(a).unwrap(), "hello");
    assert_eq!(host.document(a).unwrap().last_keep_selection(), Some(false));
    assert_eq!(c.undo(&mut host).unwrap(), UndoRedoOutcome::Nothing);
}

#[test]
fn test_unavailable_store_degrades_to_native_undo() {
    let blocker = tempfile::NamedTempFile::new().unwrap();
    let config = JournalConfig {
        store: StoreConfig::at(blocker.path().join("journal")),
        ..JournalConfig::for_testing()
    };
    let mut c = UndoRedoCoordinator::new(config);
    assert!(!c.is_enabled());
    assert_eq!(c.begin_record(), None);
    assert!(!c.commit_record(&mut MemoryHost::new(), RecordId(1), "ignored"));

    let mut host = MemoryHost::new();
    let a = host.add_file("a.txt", "abc");
    host.open(a);
    host.apply_edit(a, &[ChangeSpan::new(0, 1, "x")]).unwrap();
    c.add_file_delta(&mut host, RecordId(1), a, "abc", "xbc", &[ChangeSpan::new(0, 1, "x")])
        .unwrap();

    assert_eq!(c.undo(&mut host).unwrap(), UndoRedoOutcome::Native);
    assert_eq!(host.text(a).unwrap(), "abc");
    assert_eq!(c.undo_multi_file(&mut host).unwrap(), UndoRedoOutcome::Nothing);
}

#[test]
fn test_persistent_journal_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let config = JournalConfig {
        store: StoreConfig::at(dir.path().join("journal")),
        ..JournalConfig::for_testing()
    };
    let mut host = MemoryHost::new();
    let files = [host.add_file("x.txt", "v0"), host.add_file("y.txt", "v0")];
    {
        let mut c = UndoRedoCoordinator::new(config.clone());
        rewrite_all(&mut c, &mut host, &files, "v1");
    }

    let mut c = UndoRedoCoordinator::new(config);
    assert_eq!(c.edit_log().cursor(), 1);
    let report = replayed(c.undo_multi_file(&mut host).unwrap());
    assert_eq!(report.description, "rewrite to v1");
    assert_eq!(host.saved_text(files[0]), Some("v0"));
    assert_eq!(rewrite_all(&mut c, &mut host, &files, "v2"), RecordId(2));
}

#[test]
fn test_replay_event_counts_files() {
    let mut c = coordinator();
    let mut host = MemoryHost::new();
    let a = host.add_file("a.txt", "foo bar foo");
    let b = host.add_file("b.txt", "foo qux foo");
    record(&mut c, &mut host, &[a, b], &foo_to_baz(), "Replace foo with baz");
    host.write_externally(a, "changed");

    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    c.add_listener(move |e: &JournalEvent| sink.borrow_mut().push(e.clone()));
    c.undo_multi_file(&mut host).unwrap();

    assert_eq!(
        *events.borrow(),
        vec![JournalEvent::Replayed {
            id: RecordId(1),
            direction: logos_journal::Direction::Undo,
            applied: 1,
            skipped: 1,
        }]
    );
    assert_eq!(host.active_file(), None);
}

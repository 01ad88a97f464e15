mod common;

use std::fs;

use chapter::{Document, DocumentError};
use common::*;
use compliance::snapshot::SNAPSHOT_DIR;
use compliance::{Engine, RunError, Selection, SnapshotError, SnapshotId, Template};

fn without_trailing() -> Vec<Cell> {
    let mut cells = compliant();
    cells.pop();
    cells
}

#[test]
fn verify_resolves_chapter_prefix() {
    let dir = tempfile::tempdir().unwrap();
    write_chapter(dir.path(), "ch01_sampling", compliant());
    let engine = Engine::new(dir.path(), Template::default());

    let outcome = engine.verify("ch01").unwrap();
    assert_eq!(outcome.chapter, "ch01_sampling");
    assert_eq!(outcome.evaluation.score, 100);
    assert_eq!(outcome.outline.numbered_sections, 3);
    assert_eq!(outcome.outline.key_concepts, 3);
    assert_eq!(outcome.outline.tasks, 3);
    assert_eq!(outcome.outline.placeholders, 1);
}

#[test]
fn verify_reports_missing_chapter() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new(dir.path(), Template::default());
    assert!(matches!(
        engine.verify("ch07"),
        Err(RunError::Document(DocumentError::NotFound(_)))
    ));
}

#[test]
fn fix_snapshots_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_chapter(dir.path(), "ch01_sampling", without_trailing());
    let original = fs::read_to_string(&path).unwrap();
    let engine = Engine::new(dir.path(), Template::default());

    let outcome = engine.fix("ch01_sampling", &Selection::all(), false).unwrap();
    assert_eq!(outcome.applied(), 1);
    assert!(outcome.persisted);
    assert_eq!(outcome.blocks_after, outcome.blocks_before + 1);
    assert!(outcome.evaluation.score > outcome.score_before);

    let id = outcome.snapshot.unwrap();
    assert_eq!(id.source(), "ch01_sampling");
    let snapshot_file = dir.path().join(SNAPSHOT_DIR).join(format!("{}.ipynb", id));
    assert_eq!(fs::read_to_string(snapshot_file).unwrap(), original);

    let saved = Document::load(&path).unwrap();
    assert_eq!(saved.len(), outcome.blocks_after);
}

#[test]
fn dry_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_chapter(dir.path(), "ch01_sampling", without_trailing());
    let original = fs::read_to_string(&path).unwrap();
    let engine = Engine::new(dir.path(), Template::default());

    let outcome = engine.fix("ch01_sampling", &Selection::all(), true).unwrap();
    assert_eq!(outcome.applied(), 1);
    assert!(!outcome.persisted);
    assert!(outcome.snapshot.is_none());
    assert_eq!(fs::read_to_string(&path).unwrap(), original);
    assert!(!dir.path().join(SNAPSHOT_DIR).exists());
}

#[test]
fn clean_chapter_is_left_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_chapter(dir.path(), "ch01_sampling", compliant());
    let original = fs::read_to_string(&path).unwrap();
    let engine = Engine::new(dir.path(), Template::default());

    let outcome = engine.fix("ch01_sampling", &Selection::all(), false).unwrap();
    assert_eq!(outcome.applied(), 0);
    assert!(outcome.snapshot.is_none());
    assert_eq!(fs::read_to_string(&path).unwrap(), original);
}

#[test]
fn failed_snapshot_blocks_the_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_chapter(dir.path(), "ch01_sampling", without_trailing());
    let original = fs::read_to_string(&path).unwrap();
    fs::write(dir.path().join(SNAPSHOT_DIR), "not a directory").unwrap();
    let engine = Engine::new(dir.path(), Template::default());

    let result = engine.fix("ch01_sampling", &Selection::all(), false);
    assert!(matches!(result, Err(RunError::Snapshot(SnapshotError::Io { .. }))));
    assert_eq!(fs::read_to_string(&path).unwrap(), original);
}

#[test]
fn revert_restores_and_keeps_current_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_chapter(dir.path(), "ch01_sampling", without_trailing());
    let original = fs::read_to_string(&path).unwrap();
    let engine = Engine::new(dir.path(), Template::default());

    let fixed = engine.fix("ch01", &Selection::all(), false).unwrap();
    let taken = fixed.snapshot.unwrap();
    let after_fix = fs::read_to_string(&path).unwrap();
    assert_ne!(after_fix, original);

    let outcome = engine.revert(&taken).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), original);
    let previous = outcome.previous.unwrap();
    assert_ne!(previous, taken);

    let listed = engine.list_snapshots("ch01").unwrap();
    assert_eq!(listed, vec![taken, previous.clone()]);
    let kept = engine.snapshots().revert(&previous).unwrap();
    assert_eq!(kept.to_json().unwrap(), after_fix);
}

#[test]
fn snapshot_and_revert_keep_ascii_escapes() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_chapter(dir.path(), "ch01_sampling", without_trailing());
    let original = fs::read_to_string(&path)
        .unwrap()
        .replace("How samples", "How \\u00e9chantillons");
    fs::write(&path, &original).unwrap();
    let engine = Engine::new(dir.path(), Template::default());

    let fixed = engine.fix("ch01", &Selection::all(), false).unwrap();
    let taken = fixed.snapshot.unwrap();
    let snapshot_file = dir.path().join(SNAPSHOT_DIR).join(format!("{}.ipynb", taken));
    assert_eq!(fs::read_to_string(snapshot_file).unwrap(), original);

    let after_fix = fs::read_to_string(&path).unwrap();
    assert!(after_fix.is_ascii());
    assert!(after_fix.contains("How \\u00e9chantillons"));

    engine.revert(&taken).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), original);
}

#[test]
fn revert_of_unknown_snapshot_fails() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new(dir.path(), Template::default());
    let id = SnapshotId::parse("ch01_sampling.20250301T101500000000").unwrap();
    assert!(matches!(
        engine.revert(&id),
        Err(RunError::Snapshot(SnapshotError::Unknown(_)))
    ));
}

//! Command execution: single chapters, sequential batches and exit codes.

use std::path::{Path, PathBuf};

use tracing::warn;

use chapter::store::chapter_id;
use compliance::{Engine, RunError, Selection, SnapshotId};

use crate::report::{self, Style};

pub const EXIT_OK: i32 = 0;
/// A chapter scored below the template threshold.
pub const EXIT_BELOW_THRESHOLD: i32 = 1;
/// A chapter could not be loaded, resolved or written.
pub const EXIT_ERROR: i32 = 2;

pub enum Target {
    One(String),
    All,
}

/// One chapter's result inside a batch. Errors are kept, not propagated.
pub struct Row<T> {
    pub chapter: String,
    pub path: PathBuf,
    pub result: Result<T, RunError>,
}

impl<T> Row<T> {
    fn run(path: &Path, f: impl FnOnce(&Path) -> Result<T, RunError>) -> Self {
        let chapter = chapter_id(path);
        let result = f(path);
        if let Err(e) = &result {
            warn!(chapter = %chapter, error = %e, "chapter failed");
        }
        Row {
            chapter,
            path: path.to_path_buf(),
            result,
        }
    }
}

fn batch<T>(
    engine: &Engine,
    style: &Style,
    f: impl Fn(&Path) -> Result<T, RunError>,
) -> Option<Vec<Row<T>>> {
    match engine.store().list() {
        Ok(paths) => Some(paths.iter().map(|path| Row::run(path, &f)).collect()),
        Err(e) => {
            report::error(style, &e);
            None
        }
    }
}

/// Errors win over failures, failures over passes.
fn batch_exit<T>(rows: &[Row<T>], accepted: impl Fn(&T) -> bool) -> i32 {
    if rows.iter().any(|row| row.result.is_err()) {
        EXIT_ERROR
    } else if rows
        .iter()
        .any(|row| row.result.as_ref().is_ok_and(|outcome| !accepted(outcome)))
    {
        EXIT_BELOW_THRESHOLD
    } else {
        EXIT_OK
    }
}

pub fn verify(engine: &Engine, target: &Target, json: bool, style: &Style) -> i32 {
    match target {
        Target::One(chapter) => match engine.verify(chapter) {
            Ok(outcome) => {
                if json {
                    report::print_json(style, &report::VerifyJson::new(&outcome));
                } else {
                    report::verify(style, &outcome);
                }
                if outcome.evaluation.accepted() {
                    EXIT_OK
                } else {
                    EXIT_BELOW_THRESHOLD
                }
            }
            Err(e) => {
                report::chapter_error(style, chapter, &e, json);
                EXIT_ERROR
            }
        },
        Target::All => {
            let Some(rows) = batch(engine, style, |path| engine.verify_path(path)) else {
                return EXIT_ERROR;
            };
            if json {
                report::print_json(style, &report::verify_batch_json(&rows));
            } else {
                report::verify_table(style, &rows);
            }
            batch_exit(&rows, |outcome| outcome.evaluation.accepted())
        }
    }
}

pub fn fix(
    engine: &Engine,
    target: &Target,
    selection: &Selection,
    dry_run: bool,
    json: bool,
    style: &Style,
) -> i32 {
    match target {
        Target::One(chapter) => match engine.fix(chapter, selection, dry_run) {
            Ok(outcome) => {
                if json {
                    report::print_json(style, &outcome);
                } else {
                    report::fix(style, &outcome);
                }
                EXIT_OK
            }
            Err(e) => {
                report::chapter_error(style, chapter, &e, json);
                EXIT_ERROR
            }
        },
        Target::All => {
            let Some(rows) = batch(engine, style, |path| {
                engine.fix_path(path, selection, dry_run)
            }) else {
                return EXIT_ERROR;
            };
            if json {
                report::print_json(style, &report::fix_batch_json(&rows));
            } else {
                report::fix_table(style, &rows, dry_run);
            }
            batch_exit(&rows, |_| true)
        }
    }
}

pub fn snapshots(engine: &Engine, chapter: &str, json: bool, style: &Style) -> i32 {
    match engine.list_snapshots(chapter) {
        Ok(ids) => {
            if json {
                report::print_json(style, &ids);
            } else {
                report::snapshots(style, chapter, &ids);
            }
            EXIT_OK
        }
        Err(e) => {
            report::chapter_error(style, chapter, &e, json);
            EXIT_ERROR
        }
    }
}

pub fn revert(engine: &Engine, snapshot: &str, style: &Style) -> i32 {
    let id = match SnapshotId::parse(snapshot) {
        Ok(id) => id,
        Err(e) => {
            report::error(style, &e);
            return EXIT_ERROR;
        }
    };
    match engine.revert(&id) {
        Ok(outcome) => {
            report::revert(style, &outcome);
            EXIT_OK
        }
        Err(e) => {
            report::chapter_error(style, id.source(), &e, false);
            EXIT_ERROR
        }
    }
}

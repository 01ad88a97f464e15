//! Per-chapter verify, fix and revert runs against a document root.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use chapter::store::{EXTENSION, chapter_id};
use chapter::{Document, DocumentError, DocumentStore, Outline};

use crate::finding::Evaluation;
use crate::fixer::{self, FixContext, FixReport, Selection};
use crate::rules;
use crate::snapshot::{SnapshotError, SnapshotId, SnapshotStore};
use crate::template::Template;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Nothing was persisted.
    #[error("{0}; document left unchanged")]
    Snapshot(#[from] SnapshotError),
}

/// Counts shown next to a verification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutlineSummary {
    pub blocks: usize,
    pub headings: usize,
    pub numbered_sections: usize,
    pub key_concepts: usize,
    pub tasks: usize,
    pub placeholders: usize,
}

impl OutlineSummary {
    pub fn of(outline: &Outline) -> Self {
        OutlineSummary {
            blocks: outline.block_count,
            headings: outline.headings.len(),
            numbered_sections: outline.numbered_headings().count(),
            key_concepts: outline.key_concepts().count(),
            tasks: outline.tasks.len(),
            placeholders: outline.placeholders.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyOutcome {
    pub chapter: String,
    pub path: PathBuf,
    pub outline: OutlineSummary,
    #[serde(flatten)]
    pub evaluation: Evaluation,
    #[serde(skip)]
    pub document: Document,
}

#[derive(Debug, Clone, Serialize)]
pub struct FixOutcome {
    pub chapter: String,
    pub path: PathBuf,
    pub dry_run: bool,
    pub fixes: Vec<FixReport>,
    pub blocks_before: usize,
    pub blocks_after: usize,
    pub score_before: u32,
    pub evaluation: Evaluation,
    /// Taken before the write; absent on dry runs and when nothing changed.
    pub snapshot: Option<SnapshotId>,
    pub persisted: bool,
}

impl FixOutcome {
    pub fn applied(&self) -> usize {
        self.fixes.iter().filter(|report| report.changed()).count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RevertOutcome {
    pub chapter: String,
    pub path: PathBuf,
    pub restored: SnapshotId,
    /// Snapshot of the content the revert replaced.
    pub previous: Option<SnapshotId>,
}

pub struct Engine {
    store: DocumentStore,
    snapshots: SnapshotStore,
    template: Template,
}

impl Engine {
    pub fn new(root: &Path, template: Template) -> Self {
        Engine {
            store: DocumentStore::new(root),
            snapshots: SnapshotStore::new(root),
            template,
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn evaluate(&self, document: &Document) -> (Outline, Evaluation) {
        let outline = Outline::extract(document, &self.template.extract_options());
        let evaluation = rules::evaluate(&outline, &self.template);
        (outline, evaluation)
    }

    pub fn verify(&self, chapter: &str) -> Result<VerifyOutcome, RunError> {
        let path = self.store.resolve(chapter)?;
        self.verify_path(&path)
    }

    pub fn verify_path(&self, path: &Path) -> Result<VerifyOutcome, RunError> {
        let document = Document::load(path)?;
        let (outline, evaluation) = self.evaluate(&document);
        debug!(path = %path.display(), score = evaluation.score, "verified");
        Ok(VerifyOutcome {
            chapter: chapter_id(path),
            path: path.to_path_buf(),
            outline: OutlineSummary::of(&outline),
            evaluation,
            document,
        })
    }

    pub fn fix(
        &self,
        chapter: &str,
        selection: &Selection,
        dry_run: bool,
    ) -> Result<FixOutcome, RunError> {
        let path = self.store.resolve(chapter)?;
        self.fix_path(&path, selection, dry_run)
    }

    /// Apply the selected fixes. Unless `dry_run`, a changed document is
    /// snapshotted and only then written back; a failed snapshot aborts the
    /// write.
    pub fn fix_path(
        &self,
        path: &Path,
        selection: &Selection,
        dry_run: bool,
    ) -> Result<FixOutcome, RunError> {
        let chapter = chapter_id(path);
        let original = Document::load(path)?;
        let (_, before) = self.evaluate(&original);

        let mut document = original.clone();
        let context = FixContext {
            template: &self.template,
            chapter: &chapter,
        };
        let fixes = fixer::run(&mut document, &context, selection)?;
        let (_, evaluation) = self.evaluate(&document);
        let changed = fixes.iter().any(FixReport::changed);

        let mut snapshot = None;
        if changed && !dry_run {
            let id = self.snapshots.snapshot(&original, &chapter).inspect_err(|e| {
                warn!(chapter = %chapter, error = %e, "snapshot failed, not writing");
            })?;
            document.save(path)?;
            info!(chapter = %chapter, snapshot = %id, "saved fixed document");
            snapshot = Some(id);
        }

        Ok(FixOutcome {
            chapter,
            path: path.to_path_buf(),
            dry_run,
            fixes,
            blocks_before: original.len(),
            blocks_after: document.len(),
            score_before: before.score,
            evaluation,
            persisted: snapshot.is_some(),
            snapshot,
        })
    }

    pub fn list_snapshots(&self, chapter: &str) -> Result<Vec<SnapshotId>, RunError> {
        let path = self.store.resolve(chapter)?;
        Ok(self.snapshots.list(&chapter_id(&path))?)
    }

    /// Restore a chapter from a snapshot, snapshotting its current content first.
    pub fn revert(&self, id: &SnapshotId) -> Result<RevertOutcome, RunError> {
        let restored = self.snapshots.revert(id)?;
        let chapter = id.source().to_string();
        let path = self
            .store
            .root()
            .join(format!("{}.{}", chapter, EXTENSION));

        let previous = match Document::load(&path) {
            Ok(current) => Some(self.snapshots.snapshot(&current, &chapter)?),
            Err(DocumentError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };
        restored.save(&path)?;
        info!(chapter = %chapter, snapshot = %id, "reverted document");
        Ok(RevertOutcome {
            chapter,
            path,
            restored: id.clone(),
            previous,
        })
    }
}

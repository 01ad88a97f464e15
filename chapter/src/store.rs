//! Chapter lookup under a document root.

use std::fs;
use std::path::{Path, PathBuf};

use crate::document::{Document, DocumentError};

pub const EXTENSION: &str = "ipynb";

/// A directory of chapter documents, addressed by chapter identifier.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DocumentStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every chapter document directly under the root, sorted by path.
    /// Hidden entries (snapshots, checkpoints, staging files) are skipped.
    pub fn list(&self) -> Result<Vec<PathBuf>, DocumentError> {
        let entries = fs::read_dir(&self.root).map_err(|e| DocumentError::io(&self.root, e))?;
        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| path.extension().is_some_and(|ext| ext == EXTENSION))
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| !name.starts_with('.'))
            })
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Resolve a chapter identifier to a file.
    ///
    /// A path to an existing document is taken as is. Otherwise an exact file
    /// stem match wins, then a unique stem starting with `<id>_` or `<id>-`.
    pub fn resolve(&self, chapter: &str) -> Result<PathBuf, DocumentError> {
        let direct = Path::new(chapter);
        if direct.extension().is_some_and(|ext| ext == EXTENSION) && direct.is_file() {
            return Ok(direct.to_path_buf());
        }

        let paths = self.list()?;
        if let Some(exact) = paths.iter().find(|path| chapter_id(path) == chapter) {
            return Ok(exact.clone());
        }

        let prefixed: Vec<&PathBuf> = paths
            .iter()
            .filter(|path| {
                let stem = chapter_id(path);
                stem.strip_prefix(chapter)
                    .is_some_and(|rest| rest.starts_with('_') || rest.starts_with('-'))
            })
            .collect();
        match prefixed.as_slice() {
            [] => Err(DocumentError::NotFound(
                self.root.join(format!("{}.{}", chapter, EXTENSION)),
            )),
            [only] => Ok((*only).clone()),
            many => Err(DocumentError::Ambiguous {
                chapter: chapter.to_string(),
                candidates: many.iter().map(|path| chapter_id(path)).collect(),
            }),
        }
    }

    pub fn load(&self, chapter: &str) -> Result<(PathBuf, Document), DocumentError> {
        let path = self.resolve(chapter)?;
        let document = Document::load(&path)?;
        Ok((path, document))
    }
}

/// The identifier of a chapter file: its stem.
pub fn chapter_id(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

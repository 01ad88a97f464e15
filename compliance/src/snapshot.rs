//! Append-only snapshot store under the document root.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use chapter::store::EXTENSION;
use chapter::{Document, DocumentError};

/// Subdirectory of the document root holding snapshots.
pub const SNAPSHOT_DIR: &str = ".chaplint-snapshots";

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%6f";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot failed for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("malformed snapshot id `{0}`")]
    InvalidId(String),

    #[error("no snapshot `{0}`")]
    Unknown(SnapshotId),
}

/// `<chapter>.<UTC timestamp>[-<n>]`, e.g. `ch01_intro.20250301T101500123456`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    /// Accepts an id with or without the container extension.
    pub fn parse(text: &str) -> Result<Self, SnapshotError> {
        let text = text.trim();
        let id = text
            .strip_suffix(EXTENSION)
            .and_then(|rest| rest.strip_suffix('.'))
            .unwrap_or(text);
        match id.rsplit_once('.') {
            Some((source, stamp))
                if !source.is_empty()
                    && stamp.len() >= 21
                    && stamp.as_bytes()[8] == b'T'
                    && !id.contains(['/', '\\']) =>
            {
                Ok(SnapshotId(id.to_string()))
            }
            _ => Err(SnapshotError::InvalidId(text.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Chapter identifier the snapshot was taken from.
    pub fn source(&self) -> &str {
        self.0.rsplit_once('.').map_or(&self.0, |(source, _)| source)
    }

    pub fn timestamp(&self) -> &str {
        self.0.rsplit_once('.').map_or("", |(_, stamp)| stamp)
    }

    fn file_name(&self) -> String {
        format!("{}.{}", self.0, EXTENSION)
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored copy of a document.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub document: Document,
}

impl Snapshot {
    pub fn source(&self) -> &str {
        self.id.source()
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// The store belonging to a document root.
    pub fn new(root: &Path) -> Self {
        SnapshotStore {
            dir: root.join(SNAPSHOT_DIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot(&self, document: &Document, source: &str) -> Result<SnapshotId, SnapshotError> {
        self.snapshot_at(document, source, Utc::now())
    }

    /// Write a full copy of `document` under a new id stamped `at`.
    /// Existing snapshots are never overwritten; a taken id gets a `-<n>` suffix.
    pub fn snapshot_at(
        &self,
        document: &Document,
        source: &str,
        at: DateTime<Utc>,
    ) -> Result<SnapshotId, SnapshotError> {
        fs::create_dir_all(&self.dir).map_err(|source| SnapshotError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let text = document.to_json()?;
        let stamp = at.format(TIMESTAMP_FORMAT).to_string();

        let mut attempt: u32 = 0;
        loop {
            let id = match attempt {
                0 => SnapshotId(format!("{}.{}", source, stamp)),
                n => SnapshotId(format!("{}.{}-{}", source, stamp, n)),
            };
            let path = self.dir.join(id.file_name());
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(text.as_bytes())
                        .and_then(|()| file.sync_all())
                        .map_err(|source| SnapshotError::Io { path, source })?;
                    info!(snapshot = %id, "wrote snapshot");
                    return Ok(id);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(snapshot = %id, "snapshot id taken");
                    attempt += 1;
                }
                Err(source) => return Err(SnapshotError::Io { path, source }),
            }
        }
    }

    pub fn load(&self, id: &SnapshotId) -> Result<Snapshot, SnapshotError> {
        let path = self.dir.join(id.file_name());
        let document = Document::load(&path).map_err(|e| match e {
            DocumentError::NotFound(_) => SnapshotError::Unknown(id.clone()),
            other => SnapshotError::Document(other),
        })?;
        Ok(Snapshot {
            id: id.clone(),
            document,
        })
    }

    /// The document exactly as it was when `id` was taken.
    pub fn revert(&self, id: &SnapshotId) -> Result<Document, SnapshotError> {
        Ok(self.load(id)?.document)
    }

    /// Snapshots of one chapter, oldest first.
    pub fn list(&self, source: &str) -> Result<Vec<SnapshotId>, SnapshotError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(SnapshotError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };
        let mut ids: Vec<SnapshotId> = entries
            .flatten()
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter_map(|name| SnapshotId::parse(&name).ok())
            .filter(|id| id.source() == source)
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ids_split_into_source_and_timestamp() {
        let id = SnapshotId::parse("ch1.2_sampling.20250301T101500123456.ipynb").unwrap();
        assert_eq!(id.as_str(), "ch1.2_sampling.20250301T101500123456");
        assert_eq!(id.source(), "ch1.2_sampling");
        assert_eq!(id.timestamp(), "20250301T101500123456");
        assert!(SnapshotId::parse("ch01_intro").is_err());
        assert!(SnapshotId::parse("../x.20250301T101500123456").is_err());
    }

    #[test]
    fn colliding_timestamps_get_a_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let document = Document::new(vec![chapter::Block::prose("hello")]);
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 10, 15, 0).unwrap();

        let first = store.snapshot_at(&document, "ch01", at).unwrap();
        let second = store.snapshot_at(&document, "ch01", at).unwrap();
        assert_eq!(first.as_str(), "ch01.20250301T101500000000");
        assert_eq!(second.as_str(), "ch01.20250301T101500000000-1");
        assert_eq!(store.list("ch01").unwrap(), vec![first, second]);
        assert!(store.list("ch02").unwrap().is_empty());
    }
}

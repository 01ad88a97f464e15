use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures of the document model and its container codec.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// No document matches the requested identifier.
    #[error("document not found: {}", .0.display())]
    NotFound(PathBuf),

    /// More than one document matches a chapter identifier.
    #[error("chapter `{chapter}` is ambiguous: matches {}", .candidates.join(", "))]
    Ambiguous {
        chapter: String,
        candidates: Vec<String>,
    },

    #[error("cannot access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The container is structurally invalid.
    #[error("malformed document{}: {message}", block_suffix(.block))]
    Parse {
        message: String,
        block: Option<usize>,
    },

    #[error("block index {index} out of range (document has {len} blocks)")]
    IndexOutOfRange { index: usize, len: usize },

    /// Only blank prose blocks may be deleted.
    #[error("block {0} holds author content and cannot be deleted")]
    NotDisposable(usize),
}

impl DocumentError {
    pub(crate) fn parse(message: impl Into<String>, block: Option<usize>) -> Self {
        DocumentError::Parse {
            message: message.into(),
            block,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        DocumentError::Io {
            path: path.into(),
            source,
        }
    }
}

fn block_suffix(block: &Option<usize>) -> String {
    match block {
        Some(index) => format!(" at block {}", index),
        None => String::new(),
    }
}

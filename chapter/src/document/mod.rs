pub mod error;
mod notebook;

use std::fs;
use std::io;
use std::path::Path;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::block::Block;
pub use error::DocumentError;
use notebook::Format;

/// A chapter: an ordered, mutable sequence of blocks.
///
/// Indices are always contiguous `0..len()`. Every mutation goes through
/// the index-based operations below, none of which can leave a gap or
/// overwrite a neighbour.
#[derive(Debug, Clone)]
pub struct Document {
    blocks: Vec<Block>,
    container: Map<String, Value>,
    format: Format,
    /// Text the document was parsed from; dropped by the first mutation.
    source: Option<String>,
}

impl Document {
    /// An in-memory nbformat 4.5 document holding `blocks`.
    pub fn new(blocks: Vec<Block>) -> Self {
        let mut container = Map::new();
        container.insert("cells".to_string(), Value::Array(Vec::new()));
        container.insert("metadata".to_string(), Value::Object(Map::new()));
        container.insert("nbformat".to_string(), Value::from(4));
        container.insert("nbformat_minor".to_string(), Value::from(5));
        let mut document = Document {
            blocks: Vec::with_capacity(blocks.len()),
            container,
            format: Format::default(),
            source: None,
        };
        for block in blocks {
            document.push_block(block);
        }
        document
    }

    /// Parse a serialized container.
    pub fn parse(source: &str) -> Result<Self, DocumentError> {
        let decoded = notebook::decode(source)?;
        Ok(Document {
            blocks: decoded.blocks,
            container: decoded.container,
            format: decoded.format,
            source: Some(source.to_string()),
        })
    }

    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let source = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => DocumentError::NotFound(path.to_path_buf()),
            _ => DocumentError::io(path, e),
        })?;
        let document = Document::parse(&source)?;
        debug!(path = %path.display(), blocks = document.len(), "loaded document");
        Ok(document)
    }

    /// Serialize back to the container format. An unmodified parsed
    /// document yields its source text verbatim.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        match &self.source {
            Some(source) => Ok(source.clone()),
            None => notebook::encode(&self.container, &self.blocks, &self.format),
        }
    }

    /// Whether the document still matches the text it was parsed from.
    pub fn is_pristine(&self) -> bool {
        self.source.is_some()
    }

    /// Write the document to `path`, replacing the file atomically.
    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        let text = self.to_json()?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let staging = path.with_file_name(format!(".{}.tmp", file_name));
        fs::write(&staging, text).map_err(|e| DocumentError::io(&staging, e))?;
        fs::rename(&staging, path).map_err(|e| DocumentError::io(path, e))?;
        debug!(path = %path.display(), blocks = self.len(), "saved document");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn get_block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Replace the block at `index`, returning the previous one.
    pub fn replace_block(&mut self, index: usize, block: Block) -> Result<Block, DocumentError> {
        let len = self.blocks.len();
        let slot = self
            .blocks
            .get_mut(index)
            .ok_or(DocumentError::IndexOutOfRange { index, len })?;
        self.source = None;
        Ok(std::mem::replace(slot, block))
    }

    /// Insert `block` at `index`, shifting everything at or after it up by one.
    pub fn insert_block(&mut self, index: usize, mut block: Block) -> Result<(), DocumentError> {
        let len = self.blocks.len();
        if index > len {
            return Err(DocumentError::IndexOutOfRange { index, len });
        }
        self.assign_id(&mut block);
        self.source = None;
        self.blocks.insert(index, block);
        Ok(())
    }

    pub fn push_block(&mut self, mut block: Block) {
        self.assign_id(&mut block);
        self.source = None;
        self.blocks.push(block);
    }

    /// Remove a disposable placeholder: a prose block with nothing but blank lines.
    pub fn delete_block(&mut self, index: usize) -> Result<Block, DocumentError> {
        let len = self.blocks.len();
        let block = self
            .blocks
            .get(index)
            .ok_or(DocumentError::IndexOutOfRange { index, len })?;
        if !block.kind.is_prose() || !block.is_blank() {
            return Err(DocumentError::NotDisposable(index));
        }
        self.source = None;
        Ok(self.blocks.remove(index))
    }

    /// nbformat 4.5 and later require every cell to carry an `id`.
    fn requires_cell_ids(&self) -> bool {
        let major = self.container.get("nbformat").and_then(Value::as_u64);
        let minor = self.container.get("nbformat_minor").and_then(Value::as_u64);
        matches!((major, minor), (Some(4), Some(m)) if m >= 5) || major.is_some_and(|m| m > 4)
    }

    /// Derive a stable id from the block's content, salted until unique.
    fn assign_id(&self, block: &mut Block) {
        if block.id().is_some() || !self.requires_cell_ids() {
            return;
        }
        let mut salt: u32 = 0;
        loop {
            let mut hasher = Sha256::new();
            hasher.update(block.kind.cell_type().as_bytes());
            hasher.update(block.text().as_bytes());
            hasher.update(salt.to_le_bytes());
            let id = hex::encode(&hasher.finalize()[..4]);
            if !self.blocks.iter().any(|b| b.id() == Some(id.as_str())) {
                block.attributes.insert("id".to_string(), Value::String(id));
                return;
            }
            salt += 1;
        }
    }
}

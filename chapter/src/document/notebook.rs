//! Notebook (nbformat 4) container codec.
//!
//! The codec is lossless for files written by Jupyter or by Python's
//! `json.dump`: key order, indent width, the shape of each `source` field,
//! `\uXXXX` escaping of non-ASCII text and the trailing newline are all read
//! from the input and reproduced on output.

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::{Map, Value};

use crate::block::{Block, BlockKind, Layout, split_lines};
use crate::document::error::DocumentError;

/// Serialization settings recovered from the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Format {
    /// Indent width; `None` means compact single-line JSON.
    pub(crate) indent: Option<usize>,
    pub(crate) trailing_newline: bool,
    /// Non-ASCII characters are written as `\uXXXX` escapes.
    pub(crate) ascii_escaped: bool,
}

impl Default for Format {
    fn default() -> Self {
        Format {
            indent: Some(1),
            trailing_newline: true,
            ascii_escaped: false,
        }
    }
}

pub(crate) struct Decoded {
    /// Top-level object with `cells` emptied but kept in position.
    pub(crate) container: Map<String, Value>,
    pub(crate) blocks: Vec<Block>,
    pub(crate) format: Format,
}

pub(crate) fn decode(source: &str) -> Result<Decoded, DocumentError> {
    let value: Value = serde_json::from_str(source)
        .map_err(|e| DocumentError::parse(format!("invalid JSON: {}", e), None))?;

    let Value::Object(mut container) = value else {
        return Err(DocumentError::parse("top level is not an object", None));
    };

    let cells = match container.get_mut("cells") {
        Some(Value::Array(cells)) => std::mem::take(cells),
        Some(_) => return Err(DocumentError::parse("`cells` is not an array", None)),
        None => return Err(DocumentError::parse("missing `cells` array", None)),
    };

    let blocks = cells
        .into_iter()
        .enumerate()
        .map(|(index, cell)| decode_cell(index, cell))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Decoded {
        container,
        blocks,
        format: detect_format(source),
    })
}

pub(crate) fn encode(
    container: &Map<String, Value>,
    blocks: &[Block],
    format: &Format,
) -> Result<String, DocumentError> {
    let mut root = container.clone();
    root.insert(
        "cells".to_string(),
        Value::Array(blocks.iter().map(encode_cell).collect()),
    );
    let root = Value::Object(root);

    let mut out = match format.indent {
        Some(width) => {
            let indent = vec![b' '; width];
            let mut buf = Vec::new();
            let mut serializer =
                Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(&indent));
            root.serialize(&mut serializer)
                .map_err(|e| DocumentError::parse(format!("cannot serialize: {}", e), None))?;
            String::from_utf8(buf)
                .map_err(|e| DocumentError::parse(format!("cannot serialize: {}", e), None))?
        }
        None => serde_json::to_string(&root)
            .map_err(|e| DocumentError::parse(format!("cannot serialize: {}", e), None))?,
    };
    if format.ascii_escaped {
        out = escape_non_ascii(&out);
    }
    if format.trailing_newline {
        out.push('\n');
    }
    Ok(out)
}

fn decode_cell(index: usize, cell: Value) -> Result<Block, DocumentError> {
    let Value::Object(fields) = cell else {
        return Err(DocumentError::parse("cell is not an object", Some(index)));
    };

    let key_order: Vec<String> = fields.keys().cloned().collect();
    let mut kind = None;
    let mut lines = None;
    let mut joined_source = false;
    let mut attributes = Map::new();

    for (key, value) in fields {
        match key.as_str() {
            "cell_type" => {
                let Some(cell_type) = value.as_str() else {
                    return Err(DocumentError::parse("`cell_type` is not a string", Some(index)));
                };
                kind = Some(BlockKind::from_cell_type(cell_type).ok_or_else(|| {
                    DocumentError::parse(format!("unknown cell_type {:?}", cell_type), Some(index))
                })?);
            }
            "source" => match value {
                Value::String(text) => {
                    lines = Some(split_lines(&text));
                    joined_source = true;
                }
                Value::Array(items) => {
                    let collected = items
                        .into_iter()
                        .map(|item| match item {
                            Value::String(line) => Ok(line),
                            _ => Err(DocumentError::parse(
                                "`source` contains a non-string line",
                                Some(index),
                            )),
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    lines = Some(collected);
                }
                _ => {
                    return Err(DocumentError::parse(
                        "`source` is neither a string nor a list of strings",
                        Some(index),
                    ));
                }
            },
            _ => {
                attributes.insert(key, value);
            }
        }
    }

    let kind = kind.ok_or_else(|| DocumentError::parse("missing `cell_type`", Some(index)))?;
    let lines = lines.ok_or_else(|| DocumentError::parse("missing `source`", Some(index)))?;

    Ok(Block {
        kind,
        lines,
        attributes,
        layout: Layout {
            key_order,
            joined_source,
        },
    })
}

fn encode_cell(block: &Block) -> Value {
    let mut cell = Map::new();
    for key in block.key_order() {
        match key {
            "cell_type" => {
                cell.insert(key.to_string(), Value::String(block.kind.cell_type().to_string()));
            }
            "source" => {
                cell.insert(key.to_string(), source_value(block));
            }
            other => {
                if let Some(value) = block.attributes.get(other) {
                    cell.insert(other.to_string(), value.clone());
                }
            }
        }
    }
    for (key, value) in &block.attributes {
        if !cell.contains_key(key) {
            cell.insert(key.clone(), value.clone());
        }
    }
    if !cell.contains_key("cell_type") {
        cell.insert(
            "cell_type".to_string(),
            Value::String(block.kind.cell_type().to_string()),
        );
    }
    if !cell.contains_key("source") {
        cell.insert("source".to_string(), source_value(block));
    }
    Value::Object(cell)
}

fn source_value(block: &Block) -> Value {
    if block.layout.joined_source {
        Value::String(block.text())
    } else {
        Value::Array(block.lines.iter().cloned().map(Value::String).collect())
    }
}

/// Indent width is the leading whitespace of the first nested line.
fn detect_format(source: &str) -> Format {
    let trailing_newline = source.ends_with('\n');
    let indent = source
        .trim_end()
        .split_once('\n')
        .map(|(_, rest)| rest.chars().take_while(|c| *c == ' ').count())
        .filter(|width| *width > 0);
    Format {
        indent,
        trailing_newline,
        ascii_escaped: source.is_ascii() && has_unicode_escape(source),
    }
}

/// True if the text contains a `\uXXXX` escape of a non-ASCII code unit.
fn has_unicode_escape(source: &str) -> bool {
    let bytes = source.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            i += 1;
            continue;
        }
        if bytes.get(i + 1) == Some(&b'u') {
            let unit = source
                .get(i + 2..i + 6)
                .and_then(|hex| u16::from_str_radix(hex, 16).ok());
            if unit.is_some_and(|unit| unit >= 0x80) {
                return true;
            }
        }
        i += 2;
    }
    false
}

/// Escape every character outside printable ASCII the way
/// `json.dump(ensure_ascii=True)` does: lowercase hex, astral characters as
/// surrogate pairs. JSON syntax is ASCII, so only string contents change.
fn escape_non_ascii(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut units = [0u16; 2];
    for c in text.chars() {
        if c.is_ascii() && c != '\x7f' {
            out.push(c);
            continue;
        }
        for unit in c.encode_utf16(&mut units) {
            let _ = write!(out, "\\u{:04x}", unit);
        }
    }
    out
}

use serde::Serialize;
use serde_json::{Map, Value};

/// What a block holds. Only prose is ever analysed structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BlockKind {
    /// Markdown text authored for the reader.
    Prose,
    /// Executable payload, passed through untouched.
    Executable,
    /// Raw cell. Opaque like `Executable`, but never scanned for placeholders.
    Raw,
}

impl BlockKind {
    pub fn from_cell_type(cell_type: &str) -> Option<Self> {
        match cell_type {
            "markdown" => Some(BlockKind::Prose),
            "code" => Some(BlockKind::Executable),
            "raw" => Some(BlockKind::Raw),
            _ => None,
        }
    }

    pub fn cell_type(self) -> &'static str {
        match self {
            BlockKind::Prose => "markdown",
            BlockKind::Executable => "code",
            BlockKind::Raw => "raw",
        }
    }

    pub fn is_prose(self) -> bool {
        self == BlockKind::Prose
    }
}

/// How a block was laid out in its container, so it can be written back
/// exactly as it was read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct Layout {
    /// Key order of the cell object. Empty for blocks created in memory.
    pub(crate) key_order: Vec<String>,
    /// The source was a single string rather than a list of lines.
    pub(crate) joined_source: bool,
}

/// A single unit of content in a chapter document.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    /// Lines as stored, each keeping its terminator except possibly the last.
    pub lines: Vec<String>,
    /// Every other key of the cell, carried opaquely.
    pub attributes: Map<String, Value>,
    pub(crate) layout: Layout,
}

impl Block {
    /// Build a block from text, splitting it into terminated lines.
    pub fn new(kind: BlockKind, text: &str) -> Self {
        let mut attributes = Map::new();
        attributes.insert("metadata".to_string(), Value::Object(Map::new()));
        if kind == BlockKind::Executable {
            attributes.insert("execution_count".to_string(), Value::Null);
            attributes.insert("outputs".to_string(), Value::Array(Vec::new()));
        }
        Block {
            kind,
            lines: split_lines(text),
            attributes,
            layout: Layout::default(),
        }
    }

    pub fn prose(text: &str) -> Self {
        Block::new(BlockKind::Prose, text)
    }

    pub fn executable(text: &str) -> Self {
        Block::new(BlockKind::Executable, text)
    }

    /// Line contents with terminators stripped.
    pub fn text_lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|line| strip_terminator(line))
    }

    /// The whole block as one string.
    pub fn text(&self) -> String {
        self.lines.concat()
    }

    /// True when every line is blank.
    pub fn is_blank(&self) -> bool {
        self.text_lines().all(|line| line.trim().is_empty())
    }

    /// Insert `text` as a new line at `index` without altering any existing line.
    ///
    /// The new line borrows the terminator of its neighbour so mixed line
    /// endings stay consistent. Appending after an unterminated last line is
    /// the one case that has to terminate that line first.
    pub fn insert_line(&mut self, index: usize, text: &str) {
        let index = index.min(self.lines.len());
        if self.lines.is_empty() {
            self.lines.push(text.to_string());
            return;
        }
        if index == self.lines.len() {
            let terminator = self.terminator_near(index - 1);
            if let Some(last) = self.lines.last_mut() {
                if terminator_of(last).is_empty() {
                    last.push_str(terminator);
                }
            }
            self.lines.push(text.to_string());
            return;
        }
        let terminator = self.terminator_near(index);
        self.lines.insert(index, format!("{}{}", text, terminator));
    }

    pub fn id(&self) -> Option<&str> {
        self.attributes.get("id").and_then(Value::as_str)
    }

    /// Loaded blocks keep their original key order; new ones are sorted
    /// the way Jupyter writes them.
    pub(crate) fn key_order(&self) -> Vec<&str> {
        if !self.layout.key_order.is_empty() {
            return self.layout.key_order.iter().map(String::as_str).collect();
        }
        let mut keys: Vec<&str> = self
            .attributes
            .keys()
            .map(String::as_str)
            .chain(["cell_type", "source"])
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    fn terminator_near(&self, index: usize) -> &'static str {
        let terminated = self.lines[index..]
            .iter()
            .chain(self.lines[..index].iter().rev())
            .map(|line| terminator_of(line))
            .find(|t| !t.is_empty());
        terminated.unwrap_or("\n")
    }
}

/// Split text into lines that keep their `\n` terminators.
pub fn split_lines(text: &str) -> Vec<String> {
    text.split_inclusive('\n').map(str::to_string).collect()
}

/// Strip a trailing `\n` or `\r\n`.
pub fn strip_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

fn terminator_of(line: &str) -> &'static str {
    if line.ends_with("\r\n") {
        "\r\n"
    } else if line.ends_with('\n') {
        "\n"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splitting_keeps_terminators() {
        let block = Block::prose("# Title\nbody\nlast");
        assert_eq!(block.lines, vec!["# Title\n", "body\n", "last"]);
        assert_eq!(block.text_lines().collect::<Vec<_>>(), vec!["# Title", "body", "last"]);
    }

    #[test]
    fn insert_at_head_is_terminated() {
        let mut block = Block::prose("# Title\nbody");
        block.insert_line(0, "![x](y.png)");
        assert_eq!(block.lines, vec!["![x](y.png)\n", "# Title\n", "body"]);
    }

    #[test]
    fn insert_into_empty_block() {
        let mut block = Block::prose("");
        block.insert_line(0, "only");
        assert_eq!(block.lines, vec!["only"]);
    }

    #[test]
    fn insert_follows_crlf() {
        let mut block = Block::prose("## 1.1 Intro\r\nText\r\n");
        block.insert_line(1, "");
        assert_eq!(block.lines, vec!["## 1.1 Intro\r\n", "\r\n", "Text\r\n"]);
    }

    #[test]
    fn append_after_unterminated_line() {
        let mut block = Block::prose("a\nb");
        block.insert_line(2, "c");
        assert_eq!(block.lines, vec!["a\n", "b\n", "c"]);
    }
}

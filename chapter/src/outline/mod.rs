//! Structure extraction: derive a chapter's logical outline from its blocks.
//!
//! Extraction runs in three layers. The lexer classifies single lines, the
//! block pass turns a prose block into at most one heading and at most one
//! callout, and the document pass resolves named-section boundaries from the
//! heading sequence. The outline is a fresh, read-only projection; nothing
//! in it is cached between evaluations.

pub mod inline;
pub mod lexer;
pub mod vocabulary;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::block::{Block, BlockKind};
use crate::document::Document;
pub use vocabulary::{CalloutKind, DifficultyTier, SectionName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SectionNumber {
    pub major: u32,
    pub minor: u32,
}

impl fmt::Display for SectionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl Serialize for SectionNumber {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    pub block: usize,
    pub line: usize,
    pub level: u8,
    /// Only set at the template's section level.
    pub number: Option<SectionNumber>,
    /// Heading text without markup or section number.
    pub title: String,
    /// Non-blank lines in the heading's block besides the heading itself.
    pub body_lines: usize,
}

impl Heading {
    /// Number and title, e.g. "2.1 Sampling".
    pub fn label(&self) -> String {
        match self.number {
            Some(number) => format!("{} {}", number, self.title),
            None => self.title.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalloutBox {
    pub block: usize,
    pub kind: CalloutKind,
    pub title: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskBlock {
    pub block: usize,
    pub ordinal: u32,
    pub tier: DifficultyTier,
}

/// A named section spanning `start..end` in block indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedSection {
    pub start: usize,
    pub end: usize,
    pub name: SectionName,
    /// Content beyond the heading line: other non-blank lines in the heading
    /// block, or a later block in the section that is not content-free.
    pub has_body: bool,
}

impl NamedSection {
    pub fn contains(&self, block: usize) -> bool {
        (self.start..self.end).contains(&block)
    }
}

/// Where a learner is expected to fill in code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlaceholderMarker {
    pub block: usize,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineRef {
    pub block: usize,
    pub line: usize,
}

/// Knobs the extractor takes from the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Heading level at which `<major>.<minor>` numbers are recognized.
    pub section_level: u8,
    /// Substring marking a learner fill-in inside executable blocks.
    pub placeholder_token: String,
    /// Upper bound on the visible characters of a closing block.
    pub closing_block_max_chars: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            section_level: 2,
            placeholder_token: "YOUR CODE HERE".to_string(),
            closing_block_max_chars: 80,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Outline {
    pub block_count: usize,
    pub headings: Vec<Heading>,
    pub callouts: Vec<CalloutBox>,
    pub tasks: Vec<TaskBlock>,
    pub sections: Vec<NamedSection>,
    pub placeholders: Vec<PlaceholderMarker>,
    /// Heading lines directly followed by a non-blank line.
    pub cramped_headings: Vec<LineRef>,
    /// The first block embeds an image.
    pub visual_summary: bool,
    /// The last block is a content-free prose block.
    pub closing_block: bool,
}

impl Outline {
    pub fn extract(document: &Document, options: &ExtractOptions) -> Self {
        let mut outline = Outline {
            block_count: document.len(),
            ..Outline::default()
        };
        for (index, block) in document.blocks().iter().enumerate() {
            match block.kind {
                BlockKind::Prose => outline.scan_prose(index, block, options),
                BlockKind::Executable => outline.scan_executable(index, block, options),
                BlockKind::Raw => {}
            }
        }
        outline.sections = resolve_sections(&outline.headings, document, options);
        outline.visual_summary = document
            .get_block(0)
            .is_some_and(|block| block.kind.is_prose() && inline::has_image(&block.text()));
        outline.closing_block = document
            .blocks()
            .last()
            .is_some_and(|block| lexer::is_content_free(block, options.closing_block_max_chars));

        debug!(
            blocks = outline.block_count,
            headings = outline.headings.len(),
            callouts = outline.callouts.len(),
            tasks = outline.tasks.len(),
            sections = outline.sections.len(),
            "extracted outline"
        );
        outline
    }

    pub fn numbered_headings(&self) -> impl Iterator<Item = &Heading> {
        self.headings.iter().filter(|h| h.number.is_some())
    }

    /// First section with this name.
    pub fn section(&self, name: SectionName) -> Option<&NamedSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn key_concepts(&self) -> impl Iterator<Item = &CalloutBox> {
        self.callouts
            .iter()
            .filter(|c| c.kind == CalloutKind::KeyConcept)
    }

    /// Section numbers used by more than one heading, in ascending order.
    pub fn duplicate_numbers(&self) -> Vec<SectionNumber> {
        let mut counts: BTreeMap<SectionNumber, usize> = BTreeMap::new();
        for number in self.headings.iter().filter_map(|h| h.number) {
            *counts.entry(number).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(number, _)| number)
            .collect()
    }

    fn scan_prose(&mut self, index: usize, block: &Block, options: &ExtractOptions) {
        let lines = lexer::scan(block);

        if let Some(first) = opening_line(&lines) {
            if let Some(callout) = callout_box(index, first.index, &lines) {
                self.callouts.push(callout);
            }
        }

        let mut heading_seen = false;
        for line in lines.iter().filter(|line| !line.fenced) {
            let Some((level, rest)) = lexer::heading_marker(line.text) else {
                continue;
            };
            if lines
                .get(line.index + 1)
                .is_some_and(|next| !lexer::is_blank(next.text))
            {
                self.cramped_headings.push(LineRef {
                    block: index,
                    line: line.index,
                });
            }
            if heading_seen {
                continue;
            }
            heading_seen = true;

            let mut title = inline::heading_title(line.text);
            let number = if level == options.section_level {
                lexer::section_number(rest).map(|(number, _)| number)
            } else {
                None
            };
            if number.is_some() {
                if let Some((_, stripped)) = lexer::section_number(&title) {
                    title = stripped.to_string();
                }
            }
            if let Some((ordinal, tier)) = vocabulary::task_heading(&title) {
                self.tasks.push(TaskBlock {
                    block: index,
                    ordinal,
                    tier,
                });
            }
            let body_lines = lines
                .iter()
                .filter(|other| other.index != line.index && !lexer::is_blank(other.text))
                .count();
            self.headings.push(Heading {
                block: index,
                line: line.index,
                level,
                number,
                title,
                body_lines,
            });
        }
    }

    fn scan_executable(&mut self, index: usize, block: &Block, options: &ExtractOptions) {
        if options.placeholder_token.is_empty() {
            return;
        }
        for (line, text) in block.text_lines().enumerate() {
            if text.contains(options.placeholder_token.as_str()) {
                self.placeholders.push(PlaceholderMarker { block: index, line });
            }
        }
    }
}

/// First line carrying text, skipping blank and image-only lines.
fn opening_line<'a, 'b>(lines: &'b [lexer::Line<'a>]) -> Option<&'b lexer::Line<'a>> {
    lines
        .iter()
        .find(|line| !lexer::is_blank(line.text) && !inline::is_image_line(line.text))
}

/// Recognize a callout opening at line `first`; unknown labels are ignored.
fn callout_box(block: usize, first: usize, lines: &[lexer::Line<'_>]) -> Option<CalloutBox> {
    let label = inline::callout_label(lines[first].text)?;
    let kind = vocabulary::callout_kind(&label.label)?;
    let body = lines[first + 1..]
        .iter()
        .map(|line| {
            let text = line.text.trim_start();
            match text.strip_prefix('>') {
                Some(quoted) => quoted.strip_prefix(' ').unwrap_or(quoted),
                None => text,
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    Some(CalloutBox {
        block,
        kind,
        title: label.title,
        body: body.trim().to_string(),
    })
}

/// A named section runs until the next heading at the same or a shallower level.
fn resolve_sections(
    headings: &[Heading],
    document: &Document,
    options: &ExtractOptions,
) -> Vec<NamedSection> {
    let block_count = document.len();
    headings
        .iter()
        .enumerate()
        .filter_map(|(i, heading)| {
            let name = vocabulary::section_name(&heading.title)?;
            let end = headings[i + 1..]
                .iter()
                .find(|next| next.level <= heading.level)
                .map(|next| next.block)
                .unwrap_or(block_count);
            let has_body = heading.body_lines > 0
                || document
                    .blocks()
                    .get(heading.block + 1..end)
                    .unwrap_or_default()
                    .iter()
                    .any(|block| !lexer::is_content_free(block, options.closing_block_max_chars));
            Some(NamedSection {
                start: heading.block,
                end,
                name,
                has_body,
            })
        })
        .collect()
}

/// True when `text`, as a prose block, opens with a key-concept callout.
pub fn is_key_concept_callout(text: &str) -> bool {
    let block = Block::prose(text);
    let lines = lexer::scan(&block);
    opening_line(&lines)
        .and_then(|first| callout_box(0, first.index, &lines))
        .is_some_and(|callout| callout.kind == CalloutKind::KeyConcept)
}

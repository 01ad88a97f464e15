//! Line-level patterns for prose blocks.

use crate::block::Block;
use crate::outline::SectionNumber;

/// One prose line with its position and fenced-code state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    pub index: usize,
    pub text: &'a str,
    /// Inside (or delimiting) a fenced code region.
    pub fenced: bool,
}

/// Tokenize a block into lines, tracking ``` and ~~~ fences.
pub fn scan(block: &Block) -> Vec<Line<'_>> {
    let mut open_fence: Option<&'static str> = None;
    block
        .text_lines()
        .enumerate()
        .map(|(index, text)| {
            let marker = fence_marker(text);
            let fenced = match (open_fence, marker) {
                (Some(open), Some(found)) if open == found => {
                    open_fence = None;
                    true
                }
                (Some(_), _) => true,
                (None, Some(found)) => {
                    open_fence = Some(found);
                    true
                }
                (None, None) => false,
            };
            Line {
                index,
                text,
                fenced,
            }
        })
        .collect()
}

fn fence_marker(text: &str) -> Option<&'static str> {
    let trimmed = text.trim_start();
    if trimmed.starts_with("```") {
        Some("```")
    } else if trimmed.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// `#{1,6}` followed by a space, indented by at most three spaces.
/// Returns the level and the rest of the line.
pub fn heading_marker(text: &str) -> Option<(u8, &str)> {
    let indent = text.bytes().take_while(|b| *b == b' ').count();
    if indent > 3 {
        return None;
    }
    let text = &text[indent..];
    let hashes = text.bytes().take_while(|b| *b == b'#').count();
    if !(1..=6).contains(&hashes) {
        return None;
    }
    let rest = text[hashes..].strip_prefix(' ')?;
    Some((hashes as u8, rest))
}

/// `<integer>.<integer><space>` at the start of `text`.
pub fn section_number(text: &str) -> Option<(SectionNumber, &str)> {
    let (major, rest) = leading_integer(text.trim_start())?;
    let rest = rest.strip_prefix('.')?;
    let (minor, rest) = leading_integer(rest)?;
    let rest = rest.strip_prefix(' ')?;
    Some((SectionNumber { major, minor }, rest.trim_start()))
}

fn leading_integer(text: &str) -> Option<(u32, &str)> {
    let digits = text.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let value = text[..digits].parse().ok()?;
    Some((value, &text[digits..]))
}

/// A block with no reader-facing content: blank lines, thematic breaks and
/// single-line HTML comments only, within `max_chars`.
pub fn is_content_free(block: &Block, max_chars: usize) -> bool {
    if !block.kind.is_prose() {
        return false;
    }
    let mut chars = 0;
    for line in block.text_lines() {
        let trimmed = line.trim();
        chars += trimmed.chars().count();
        let decorative = trimmed.is_empty()
            || is_thematic_break(trimmed)
            || (trimmed.starts_with("<!--") && trimmed.ends_with("-->"));
        if !decorative {
            return false;
        }
    }
    chars <= max_chars
}

fn is_thematic_break(text: &str) -> bool {
    let marks: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    marks.len() >= 3
        && ['-', '*', '_']
            .iter()
            .any(|mark| marks.iter().all(|c| c == mark))
}

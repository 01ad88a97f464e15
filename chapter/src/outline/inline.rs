//! Inline Markdown recognition for single lines and blocks.

use pulldown_cmark::{Event, Parser as CmarkParser, Tag, TagEnd};

/// A bold label opening a blockquote, e.g. `> **Key Concept:** Title`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalloutLabel {
    pub label: String,
    pub title: Option<String>,
}

/// Plain heading text of a heading line, markup stripped and whitespace collapsed.
pub fn heading_title(line: &str) -> String {
    let mut title = String::new();
    let mut in_heading = false;
    for event in CmarkParser::new(line) {
        match event {
            Event::Start(Tag::Heading { .. }) => in_heading = true,
            Event::End(TagEnd::Heading(_)) => break,
            Event::Text(text) | Event::Code(text) if in_heading => title.push_str(&text),
            _ => {}
        }
    }
    normalize(&title)
}

/// Parse the label of a callout line.
///
/// The title is the text after a colon, whether the colon sits inside the
/// bold label or right after it.
pub fn callout_label(line: &str) -> Option<CalloutLabel> {
    if !line.trim_start().starts_with('>') {
        return None;
    }
    let mut events = CmarkParser::new(line);
    if !matches!(events.next()?, Event::Start(Tag::BlockQuote(_))) {
        return None;
    }
    if !matches!(events.next()?, Event::Start(Tag::Paragraph)) {
        return None;
    }
    if !matches!(events.next()?, Event::Start(Tag::Strong)) {
        return None;
    }

    let mut label = String::new();
    for event in events.by_ref() {
        match event {
            Event::End(TagEnd::Strong) => break,
            Event::Text(text) | Event::Code(text) => label.push_str(&text),
            _ => {}
        }
    }
    let mut trailing = String::new();
    for event in events {
        match event {
            Event::End(TagEnd::Paragraph) => break,
            Event::Text(text) | Event::Code(text) => trailing.push_str(&text),
            _ => {}
        }
    }

    let label = normalize(&label);
    let (label, inner) = match label.split_once(':') {
        Some((label, inner)) => (label.trim().to_string(), inner.trim().to_string()),
        None => (label, String::new()),
    };
    if label.is_empty() {
        return None;
    }
    let trailing = trailing.trim().trim_start_matches(':').trim();
    let title = if !inner.is_empty() {
        Some(inner)
    } else if !trailing.is_empty() {
        Some(normalize(trailing))
    } else {
        None
    };
    Some(CalloutLabel { label, title })
}

/// True when the text embeds an image, as Markdown or as an `<img>` tag.
pub fn has_image(text: &str) -> bool {
    CmarkParser::new(text).any(|event| match event {
        Event::Start(Tag::Image { .. }) => true,
        Event::Html(html) | Event::InlineHtml(html) => html.contains("<img"),
        _ => false,
    })
}

/// True when the line holds image embeds and nothing else.
pub fn is_image_line(line: &str) -> bool {
    let mut images = 0;
    let mut depth = 0usize;
    for event in CmarkParser::new(line) {
        match event {
            Event::Start(Tag::Image { .. }) => {
                depth += 1;
                images += 1;
            }
            Event::End(TagEnd::Image) => depth = depth.saturating_sub(1),
            Event::Html(html) | Event::InlineHtml(html)
                if html.trim_start().starts_with("<img") =>
            {
                images += 1;
            }
            Event::Start(Tag::Paragraph | Tag::HtmlBlock)
            | Event::End(TagEnd::Paragraph | TagEnd::HtmlBlock)
            | Event::SoftBreak => {}
            Event::Text(text) if depth > 0 || text.trim().is_empty() => {}
            _ if depth > 0 => {}
            _ => return false,
        }
    }
    images > 0
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

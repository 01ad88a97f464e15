//! Additive fixes. Each fix re-reads the document's outline before it acts,
//! only ever inserts lines or blocks, and is a no-op once its rule passes.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use chapter::{Block, Document, DocumentError, Outline};

use crate::rules;
use crate::template::Template;

#[derive(Debug, Error)]
pub enum FixError {
    #[error("unknown fix `{name}` (expected one of: {})", names().collect::<Vec<_>>().join(", "))]
    Unknown { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FixStatus {
    /// The document was changed.
    Applied,
    /// The rule already passes.
    Satisfied,
    /// The fix has nothing to attach to.
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixReport {
    pub fix: &'static str,
    pub status: FixStatus,
    /// One entry per change made, or the reason nothing was done.
    pub notes: Vec<String>,
}

impl FixReport {
    fn applied(fix: &'static str, notes: Vec<String>) -> Self {
        FixReport {
            fix,
            status: FixStatus::Applied,
            notes,
        }
    }

    fn satisfied(fix: &'static str) -> Self {
        FixReport {
            fix,
            status: FixStatus::Satisfied,
            notes: Vec::new(),
        }
    }

    fn not_applicable(fix: &'static str, reason: impl Into<String>) -> Self {
        FixReport {
            fix,
            status: FixStatus::NotApplicable,
            notes: vec![reason.into()],
        }
    }

    pub fn changed(&self) -> bool {
        self.status == FixStatus::Applied
    }
}

/// What a fix may read besides the document itself.
pub struct FixContext<'a> {
    pub template: &'a Template,
    /// Chapter identifier, substituted into the visual summary line.
    pub chapter: &'a str,
}

type Apply = fn(&mut Document, &FixContext<'_>) -> Result<FixReport, DocumentError>;

pub struct Fix {
    /// Name accepted by `--only`.
    pub name: &'static str,
    pub title: &'static str,
    /// Rule this fix makes pass.
    pub rule: &'static str,
    apply: Apply,
}

impl Fix {
    pub fn apply(
        &self,
        document: &mut Document,
        context: &FixContext<'_>,
    ) -> Result<FixReport, DocumentError> {
        (self.apply)(document, context)
    }
}

pub const VISUAL_SUMMARY: &str = "visual_summary";
pub const HEADER_SPACING: &str = "header_spacing";
pub const KEY_CONCEPTS: &str = "key_concepts";
pub const TRAILING_BLOCK: &str = "trailing_block";

/// Every fix, in the order a run applies them.
pub const FIXES: &[Fix] = &[
    Fix {
        name: VISUAL_SUMMARY,
        title: "InsertVisualSummary",
        rule: rules::VISUAL_SUMMARY,
        apply: insert_visual_summary,
    },
    Fix {
        name: HEADER_SPACING,
        title: "NormalizeHeaderSpacing",
        rule: rules::HEADER_SPACING,
        apply: normalize_header_spacing,
    },
    Fix {
        name: KEY_CONCEPTS,
        title: "InsertCalloutPlaceholders",
        rule: rules::CALLOUT_PLACEMENT,
        apply: insert_callout_placeholders,
    },
    Fix {
        name: TRAILING_BLOCK,
        title: "InsertTrailingBlock",
        rule: rules::TRAILING_BLOCK,
        apply: insert_trailing_block,
    },
];

pub fn names() -> impl Iterator<Item = &'static str> {
    FIXES.iter().map(|fix| fix.name)
}

pub fn lookup(name: &str) -> Option<&'static Fix> {
    FIXES.iter().find(|fix| fix.name == name)
}

/// Which fixes a run applies. Order always follows [`FIXES`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    only: Option<Vec<&'static str>>,
}

impl Selection {
    pub fn all() -> Self {
        Selection::default()
    }

    pub fn only<S: AsRef<str>>(names: &[S]) -> Result<Self, FixError> {
        let selected = names
            .iter()
            .map(|name| {
                let name = name.as_ref().trim();
                lookup(name).map(|fix| fix.name).ok_or_else(|| FixError::Unknown {
                    name: name.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Selection {
            only: Some(selected),
        })
    }

    pub fn includes(&self, name: &str) -> bool {
        match &self.only {
            None => true,
            Some(names) => names.contains(&name),
        }
    }
}

/// Apply every selected fix in declared order.
pub fn run(
    document: &mut Document,
    context: &FixContext<'_>,
    selection: &Selection,
) -> Result<Vec<FixReport>, DocumentError> {
    let mut reports = Vec::new();
    for fix in FIXES.iter().filter(|fix| selection.includes(fix.name)) {
        let report = fix.apply(document, context)?;
        match report.status {
            FixStatus::Applied => info!(fix = fix.name, changes = report.notes.len(), "applied fix"),
            FixStatus::Satisfied => debug!(fix = fix.name, "nothing to fix"),
            FixStatus::NotApplicable => warn!(
                fix = fix.name,
                reason = report.notes.join("; "),
                "fix not applicable"
            ),
        }
        reports.push(report);
    }
    Ok(reports)
}

fn outline_of(document: &Document, template: &Template) -> Outline {
    Outline::extract(document, &template.extract_options())
}

fn insert_visual_summary(
    document: &mut Document,
    context: &FixContext<'_>,
) -> Result<FixReport, DocumentError> {
    if outline_of(document, context.template).visual_summary {
        return Ok(FixReport::satisfied(VISUAL_SUMMARY));
    }
    let Some(first) = document.get_block(0) else {
        return Ok(FixReport::not_applicable(VISUAL_SUMMARY, "document has no blocks"));
    };
    if !first.kind.is_prose() {
        return Ok(FixReport::not_applicable(VISUAL_SUMMARY, "first block is not prose"));
    }

    let line = context
        .template
        .visual_summary
        .line
        .replace("{chapter}", context.chapter);
    let mut block = first.clone();
    block.insert_line(0, &line);
    document.replace_block(0, block)?;
    Ok(FixReport::applied(
        VISUAL_SUMMARY,
        vec![format!("block 0: prepended `{}`", line)],
    ))
}

fn normalize_header_spacing(
    document: &mut Document,
    context: &FixContext<'_>,
) -> Result<FixReport, DocumentError> {
    let outline = outline_of(document, context.template);
    if outline.cramped_headings.is_empty() {
        return Ok(FixReport::satisfied(HEADER_SPACING));
    }

    let mut by_block: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for heading in &outline.cramped_headings {
        by_block.entry(heading.block).or_default().push(heading.line);
    }

    let mut notes = Vec::new();
    for (index, lines) in by_block {
        let len = document.len();
        let mut block = document
            .get_block(index)
            .cloned()
            .ok_or(DocumentError::IndexOutOfRange { index, len })?;
        // Bottom-up so earlier line indices stay valid.
        for line in lines.iter().rev() {
            block.insert_line(line + 1, "");
        }
        document.replace_block(index, block)?;
        notes.push(format!("block {}: blank line after {} heading(s)", index, lines.len()));
    }
    Ok(FixReport::applied(HEADER_SPACING, notes))
}

fn insert_callout_placeholders(
    document: &mut Document,
    context: &FixContext<'_>,
) -> Result<FixReport, DocumentError> {
    let template = context.template;
    let outline = outline_of(document, template);
    let numbered = outline.numbered_headings().count();
    if numbered == 0 {
        return Ok(FixReport::not_applicable(KEY_CONCEPTS, "no numbered sections"));
    }
    if rules::unplaced_headings(&outline, template).is_empty() {
        return Ok(FixReport::satisfied(KEY_CONCEPTS));
    }

    let (min, _) = template.density_bounds(numbered);
    let budget = min.saturating_sub(outline.key_concepts().count());
    let mut notes = Vec::new();
    for _ in 0..budget {
        let outline = outline_of(document, template);
        let Some(heading) = rules::unplaced_headings(&outline, template).first().copied() else {
            break;
        };
        let text = template
            .key_concepts
            .placeholder
            .replace("{section}", &heading.label())
            .replace("{title}", &heading.title);
        document.insert_block(heading.block + 1, Block::prose(&text))?;
        notes.push(format!(
            "block {}: key concept placeholder for {}",
            heading.block + 1,
            heading.label()
        ));
    }

    if notes.is_empty() {
        return Ok(FixReport::not_applicable(
            KEY_CONCEPTS,
            format!(
                "density target of {} already met; remaining sections need hand-written callouts",
                min
            ),
        ));
    }
    Ok(FixReport::applied(KEY_CONCEPTS, notes))
}

fn insert_trailing_block(
    document: &mut Document,
    context: &FixContext<'_>,
) -> Result<FixReport, DocumentError> {
    if document.is_empty() {
        return Ok(FixReport::not_applicable(TRAILING_BLOCK, "document has no blocks"));
    }
    if outline_of(document, context.template).closing_block {
        return Ok(FixReport::satisfied(TRAILING_BLOCK));
    }
    document.push_block(Block::prose(&context.template.trailing.text));
    Ok(FixReport::applied(
        TRAILING_BLOCK,
        vec![format!("block {}: appended closing block", document.len() - 1)],
    ))
}

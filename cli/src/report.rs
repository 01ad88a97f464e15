//! Human and JSON rendering of verify, fix and snapshot results.

use std::fmt::Display;
use std::ops::Range;
use std::path::Path;

use codespan_reporting::diagnostic::{self, Diagnostic, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use owo_colors::OwoColorize;
use serde::Serialize;

use chapter::Document;
use compliance::{
    Finding, FixOutcome, FixStatus, RevertOutcome, RunError, Severity, SnapshotId, VerifyOutcome,
};

use crate::runner::Row;

pub struct Style {
    color: bool,
}

impl Style {
    pub fn new(color: bool) -> Self {
        Style { color }
    }

    fn color_choice(&self) -> ColorChoice {
        if self.color {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        }
    }

    fn status(&self, passed: bool) -> String {
        match (passed, self.color) {
            (true, true) => "PASS".green().bold().to_string(),
            (true, false) => "PASS".to_string(),
            (false, true) => "FAIL".red().bold().to_string(),
            (false, false) => "FAIL".to_string(),
        }
    }

    fn failed(&self) -> String {
        if self.color {
            "ERROR".red().bold().to_string()
        } else {
            "ERROR".to_string()
        }
    }

    /// Padded before coloring so escape codes don't break alignment.
    fn severity(&self, severity: Severity) -> String {
        let text = format!("{:<8}", severity.as_str());
        match (severity, self.color) {
            (_, false) => text,
            (Severity::Critical, true) => text.red().to_string(),
            (Severity::Minor, true) => text.yellow().to_string(),
        }
    }

    fn bold(&self, text: &str) -> String {
        if self.color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn dim(&self, text: &str) -> String {
        if self.color {
            text.dimmed().to_string()
        } else {
            text.to_string()
        }
    }
}

pub fn error(style: &Style, error: &dyn Display) {
    let label = if style.color {
        "error".red().bold().to_string()
    } else {
        "error".to_string()
    };
    eprintln!("{}: {}", label, error);
}

#[derive(Serialize)]
struct ChapterErrorJson<'a> {
    chapter: &'a str,
    error: String,
}

pub fn chapter_error(style: &Style, chapter: &str, e: &RunError, json: bool) {
    if json {
        print_json(
            style,
            &ChapterErrorJson {
                chapter,
                error: e.to_string(),
            },
        );
    } else {
        error(style, &format!("{}: {}", chapter, e));
    }
}

pub fn print_json<T: Serialize + ?Sized>(style: &Style, value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => error(style, &e),
    }
}

// Verify

#[derive(Serialize)]
pub struct VerifyJson<'a> {
    #[serde(flatten)]
    outcome: &'a VerifyOutcome,
    accepted: bool,
}

impl<'a> VerifyJson<'a> {
    pub fn new(outcome: &'a VerifyOutcome) -> Self {
        VerifyJson {
            outcome,
            accepted: outcome.evaluation.accepted(),
        }
    }
}

pub fn verify(style: &Style, outcome: &VerifyOutcome) {
    let evaluation = &outcome.evaluation;
    let summary = &outcome.outline;
    println!(
        "{} {}",
        style.bold(&outcome.chapter),
        style.dim(&format!("({})", outcome.path.display()))
    );
    println!(
        "  {} blocks, {} headings ({} numbered), {} key concepts, {} tasks, {} placeholders",
        summary.blocks,
        summary.headings,
        summary.numbered_sections,
        summary.key_concepts,
        summary.tasks,
        summary.placeholders
    );
    println!();

    let width = evaluation
        .findings
        .iter()
        .map(|f| f.rule.len())
        .max()
        .unwrap_or(0);
    for finding in &evaluation.findings {
        println!(
            "  {}  {}  {:<width$}  {}",
            style.status(finding.passed),
            style.severity(finding.severity),
            finding.rule,
            finding.message,
            width = width
        );
    }
    println!();
    println!(
        "score {}/100 (threshold {}): {}",
        style.bold(&evaluation.score.to_string()),
        evaluation.threshold,
        style.status(evaluation.accepted())
    );

    emit_diagnostics(style, &outcome.path, &outcome.document, evaluation.failures());
}

/// The document's blocks laid out as one text, each under a `# %%` marker,
/// with the span of every block's first line.
struct BlockView {
    source: String,
    spans: Vec<Range<usize>>,
}

impl BlockView {
    fn of(document: &Document) -> Self {
        let mut source = String::new();
        let mut spans = Vec::with_capacity(document.len());
        for (index, block) in document.blocks().iter().enumerate() {
            source.push_str(&format!("# %% [{}] block {}\n", block.kind.cell_type(), index));
            let start = source.len();
            let first = block.text_lines().next().unwrap_or("");
            spans.push(start..start + first.len());
            for line in block.text_lines() {
                source.push_str(line);
                source.push('\n');
            }
        }
        BlockView { source, spans }
    }
}

fn emit_diagnostics<'a>(
    style: &Style,
    path: &Path,
    document: &Document,
    failures: impl Iterator<Item = &'a Finding>,
) {
    let located: Vec<&Finding> = failures.filter(|f| f.block.is_some()).collect();
    if located.is_empty() {
        return;
    }
    let BlockView { source, spans } = BlockView::of(document);
    let mut files = SimpleFiles::new();
    let file_id = files.add(path.display().to_string(), source);
    let writer = StandardStream::stderr(style.color_choice());
    let config = term::Config::default();

    for finding in located {
        let Some((block, span)) = finding
            .block
            .and_then(|block| spans.get(block).map(|span| (block, span.clone())))
        else {
            continue;
        };
        let severity = match finding.severity {
            Severity::Critical => diagnostic::Severity::Error,
            Severity::Minor => diagnostic::Severity::Warning,
        };
        let diagnostic = Diagnostic::new(severity)
            .with_code(finding.rule)
            .with_message(&finding.message)
            .with_labels(vec![
                Label::primary(file_id, span).with_message(format!("block {}", block)),
            ]);
        let _ = term::emit_to_write_style(&mut writer.lock(), &config, &files, &diagnostic);
    }
}

fn critical_minor(outcome: &VerifyOutcome) -> (usize, usize) {
    (
        outcome.evaluation.count_failures(Severity::Critical),
        outcome.evaluation.count_failures(Severity::Minor),
    )
}

pub fn verify_table(style: &Style, rows: &[Row<VerifyOutcome>]) {
    let width = rows
        .iter()
        .map(|row| row.chapter.len())
        .chain(["CHAPTER".len()])
        .max()
        .unwrap_or(0);
    println!(
        "{}",
        style.bold(&format!(
            "{:<width$}  {:>5}  {:>8}  {:>5}  STATUS",
            "CHAPTER",
            "SCORE",
            "CRITICAL",
            "MINOR",
            width = width
        ))
    );
    let (mut passed, mut failed, mut errors) = (0, 0, 0);
    for row in rows {
        match &row.result {
            Ok(outcome) => {
                let (critical, minor) = critical_minor(outcome);
                let accepted = outcome.evaluation.accepted();
                if accepted {
                    passed += 1;
                } else {
                    failed += 1;
                }
                println!(
                    "{:<width$}  {:>5}  {:>8}  {:>5}  {}",
                    row.chapter,
                    outcome.evaluation.score,
                    critical,
                    minor,
                    style.status(accepted),
                    width = width
                );
            }
            Err(e) => {
                errors += 1;
                println!(
                    "{:<width$}  {:>5}  {:>8}  {:>5}  {}  {}",
                    row.chapter,
                    "-",
                    "-",
                    "-",
                    style.failed(),
                    style.dim(&e.to_string()),
                    width = width
                );
            }
        }
    }
    println!();
    println!(
        "{} chapters: {} passed, {} failed, {} errors",
        rows.len(),
        passed,
        failed,
        errors
    );
}

#[derive(Serialize)]
struct BatchEntry<'a, T> {
    chapter: &'a str,
    path: &'a Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
pub struct BatchJson<'a, T> {
    chapters: Vec<BatchEntry<'a, T>>,
    errors: usize,
}

fn batch_json<'a, O, T>(rows: &'a [Row<O>], report: impl Fn(&'a O) -> T) -> BatchJson<'a, T> {
    let chapters: Vec<BatchEntry<'a, T>> = rows
        .iter()
        .map(|row| BatchEntry {
            chapter: &row.chapter,
            path: &row.path,
            report: row.result.as_ref().ok().map(&report),
            error: row.result.as_ref().err().map(ToString::to_string),
        })
        .collect();
    let errors = chapters.iter().filter(|entry| entry.error.is_some()).count();
    BatchJson { chapters, errors }
}

pub fn verify_batch_json(rows: &[Row<VerifyOutcome>]) -> BatchJson<'_, VerifyJson<'_>> {
    batch_json(rows, VerifyJson::new)
}

// Fix

fn fix_status(status: FixStatus) -> &'static str {
    match status {
        FixStatus::Applied => "applied",
        FixStatus::Satisfied => "ok",
        FixStatus::NotApplicable => "not applicable",
    }
}

pub fn fix(style: &Style, outcome: &FixOutcome) {
    let mode = if outcome.dry_run { " (dry run)" } else { "" };
    println!(
        "{}: {} fix(es) applied{}",
        style.bold(&outcome.chapter),
        outcome.applied(),
        mode
    );
    let width = outcome.fixes.iter().map(|r| r.fix.len()).max().unwrap_or(0);
    for report in &outcome.fixes {
        let status = format!("{:<14}", fix_status(report.status));
        let status = match (report.status, style.color) {
            (FixStatus::Applied, true) => status.green().to_string(),
            (FixStatus::NotApplicable, true) => status.yellow().to_string(),
            _ => status,
        };
        let mut notes = report.notes.iter();
        println!(
            "  {}  {:<width$}  {}",
            status,
            report.fix,
            notes.next().map(String::as_str).unwrap_or(""),
            width = width
        );
        for note in notes {
            println!("  {:<14}  {:<width$}  {}", "", "", note, width = width);
        }
    }
    println!(
        "blocks {} -> {}, score {} -> {}",
        outcome.blocks_before, outcome.blocks_after, outcome.score_before, outcome.evaluation.score
    );
    match (&outcome.snapshot, outcome.dry_run) {
        (Some(id), _) => println!("snapshot: {}", id),
        (None, true) => println!("{}", style.dim("dry run: nothing written")),
        (None, false) => println!("{}", style.dim("nothing to write")),
    }
}

pub fn fix_table(style: &Style, rows: &[Row<FixOutcome>], dry_run: bool) {
    let width = rows
        .iter()
        .map(|row| row.chapter.len())
        .chain(["CHAPTER".len()])
        .max()
        .unwrap_or(0);
    println!(
        "{}",
        style.bold(&format!(
            "{:<width$}  {:>5}  {:>10}  SNAPSHOT",
            "CHAPTER",
            "FIXES",
            "SCORE",
            width = width
        ))
    );
    for row in rows {
        match &row.result {
            Ok(outcome) => {
                let score = format!("{} -> {}", outcome.score_before, outcome.evaluation.score);
                let snapshot = outcome
                    .snapshot
                    .as_ref()
                    .map(SnapshotId::to_string)
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<width$}  {:>5}  {:>10}  {}",
                    row.chapter,
                    outcome.applied(),
                    score,
                    snapshot,
                    width = width
                );
            }
            Err(e) => println!(
                "{:<width$}  {:>5}  {:>10}  {}  {}",
                row.chapter,
                "-",
                "-",
                style.failed(),
                style.dim(&e.to_string()),
                width = width
            ),
        }
    }
    if dry_run {
        println!();
        println!("{}", style.dim("dry run: nothing written"));
    }
}

pub fn fix_batch_json(rows: &[Row<FixOutcome>]) -> BatchJson<'_, &FixOutcome> {
    batch_json(rows, |outcome| outcome)
}

// Snapshots

pub fn snapshots(style: &Style, chapter: &str, ids: &[SnapshotId]) {
    if ids.is_empty() {
        println!("{}", style.dim(&format!("no snapshots of {}", chapter)));
        return;
    }
    for id in ids {
        println!("{}", id);
    }
}

pub fn revert(style: &Style, outcome: &RevertOutcome) {
    println!(
        "restored {} from {}",
        style.bold(&outcome.path.display().to_string()),
        outcome.restored
    );
    if let Some(previous) = &outcome.previous {
        println!("previous content kept as {}", previous);
    }
}

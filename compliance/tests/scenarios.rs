mod common;

use chapter::{Block, BlockKind, Document, Outline};
use common::*;
use compliance::fixer::{self, FixContext, FixStatus, Selection};
use compliance::{Evaluation, Severity, Template, rules};

fn evaluate(document: &Document, template: &Template) -> Evaluation {
    let outline = Outline::extract(document, &template.extract_options());
    rules::evaluate(&outline, template)
}

fn fix(document: &mut Document, template: &Template, selection: &Selection) -> Vec<fixer::FixReport> {
    let context = FixContext {
        template,
        chapter: "ch01_sampling",
    };
    fixer::run(document, &context, selection).unwrap()
}

fn applied(reports: &[fixer::FixReport]) -> Vec<&'static str> {
    reports
        .iter()
        .filter(|report| report.changed())
        .map(|report| report.fix)
        .collect()
}

/// No image, cramped headings, no callouts and no closing block.
fn messy() -> Vec<Cell> {
    vec![
        TITLE_WITHOUT_IMAGE,
        Md("## Overview\nWhat you will learn."),
        Md("## Setup\n\nInstall things."),
        Md("## 1.1 Populations\nEveryone."),
        Md("## 1.2 Samples\n\nSome."),
        Code("sample = population.sample(10)"),
        Md("## 1.3 Bias\n\nGaps."),
        Md("## Key Takeaways\n\n- Samples estimate populations."),
        Md("## Practice Exercises\n\n1. Draw a sample.\n2. Measure its bias."),
    ]
}

/// Front matter, `sections` numbered sections with a callout after the
/// first `callouts` of them, and closing sections.
fn long_chapter(sections: usize, callouts: usize) -> Document {
    let mut blocks = vec![
        Block::prose("![Visual summary](images/ch05.png)\n# Chapter 5: Regression\n\nLines."),
        Block::prose("## Overview\n\nGoals."),
        Block::prose("## Setup\n\nImports."),
    ];
    for i in 1..=sections {
        blocks.push(Block::prose(&format!("## 5.{} Topic {}\n\nText.", i, i)));
        if i <= callouts {
            blocks.push(Block::prose(&format!(
                "> **Key Concept:** Topic {}\n>\n> Worth remembering.",
                i
            )));
        }
    }
    blocks.push(Block::prose("## Key Takeaways\n\n- Fit lines."));
    blocks.push(Block::prose("## Practice Exercises\n\n1. Fit one."));
    blocks.push(Block::prose("---"));
    Document::new(blocks)
}

/// A chapter opening with a callout instead of a title.
fn callout_first() -> Vec<Cell> {
    vec![
        Md("> **Key Concept:** Samples\n>\n> A subset of a population."),
        Md("## 1.1 Samples\n\nText."),
    ]
}

/// Closing sections where the exercises heading has nothing under it.
fn empty_exercises() -> Vec<Cell> {
    let mut cells = compliant();
    cells.pop();
    cells.pop();
    cells.push(Md("## Practice Exercises"));
    cells
}

#[test]
fn compliant_chapter_scores_full_marks() {
    let template = Template::default();
    let evaluation = evaluate(&document(compliant()), &template);
    let failures: Vec<&str> = evaluation.failures().map(|f| f.rule).collect();
    assert!(failures.is_empty(), "unexpected failures: {:?}", failures);
    assert_eq!(evaluation.score, 100);
    assert!(evaluation.accepted());
}

#[test]
fn compliant_chapter_needs_no_fixes() {
    let template = Template::default();
    let mut document = document(compliant());
    let before = document.to_json().unwrap();
    let reports = fix(&mut document, &template, &Selection::all());
    assert!(applied(&reports).is_empty());
    assert_eq!(document.to_json().unwrap(), before);
}

#[test]
fn scenario_a_visual_summary_is_prepended() {
    let template = Template::default();
    let mut cells = compliant();
    cells[0] = TITLE_WITHOUT_IMAGE;
    let mut document = document(cells);

    let before = evaluate(&document, &template);
    assert!(!before.finding(rules::VISUAL_SUMMARY).unwrap().passed);
    let blocks = document.len();
    let lines = document.get_block(0).unwrap().lines.len();

    let reports = fix(&mut document, &template, &Selection::all());
    assert_eq!(applied(&reports), vec![fixer::VISUAL_SUMMARY]);
    assert_eq!(document.len(), blocks);
    let first = document.get_block(0).unwrap();
    assert_eq!(first.lines.len(), lines + 1);
    assert_eq!(
        first.lines[0],
        "![Visual summary](images/ch01_sampling_visual_summary.png)\n"
    );
    assert!(evaluate(&document, &template).finding(rules::VISUAL_SUMMARY).unwrap().passed);
}

#[test]
fn scenario_b_placeholders_fill_density_minimum() {
    let template = Template::default();
    let cells: Vec<Cell> = compliant()
        .into_iter()
        .filter(|cell| !matches!(cell, Md(text) if text.starts_with("> **Key Concept")))
        .collect();
    let mut document = document(cells);
    let outline = Outline::extract(&document, &template.extract_options());
    assert_eq!(outline.numbered_headings().count(), 3);
    assert_eq!(outline.key_concepts().count(), 0);

    let only = Selection::only(&["key_concepts"]).unwrap();
    let reports = fix(&mut document, &template, &only);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].notes.len(), 2);

    let outline = Outline::extract(&document, &template.extract_options());
    let callouts: Vec<usize> = outline.key_concepts().map(|c| c.block).collect();
    let headings: Vec<usize> = outline.numbered_headings().map(|h| h.block).collect();
    assert_eq!(callouts, vec![headings[0] + 1, headings[1] + 1]);
    assert!(evaluate(&document, &template).finding(rules::CALLOUT_DENSITY).unwrap().passed);

    let again = fix(&mut document, &template, &only);
    assert!(applied(&again).is_empty());
    assert_eq!(again[0].status, FixStatus::NotApplicable);
    assert_eq!(
        Outline::extract(&document, &template.extract_options()).key_concepts().count(),
        2
    );
}

#[test]
fn scenario_c_closing_block_is_appended_once() {
    let template = Template::default();
    let mut cells = compliant();
    cells.pop();
    let mut document = document(cells);
    let blocks = document.len();

    let reports = fix(&mut document, &template, &Selection::all());
    assert_eq!(applied(&reports), vec![fixer::TRAILING_BLOCK]);
    assert_eq!(document.len(), blocks + 1);
    let last = document.get_block(blocks).unwrap();
    assert_eq!(last.kind, BlockKind::Prose);
    assert!(last.is_blank());

    let again = fix(&mut document, &template, &Selection::all());
    assert!(applied(&again).is_empty());
    assert_eq!(document.len(), blocks + 1);
}

#[test]
fn scenario_d_missing_exercises_cannot_be_fixed() {
    let template = Template::default();
    let cells: Vec<Cell> = compliant()
        .into_iter()
        .filter(|cell| !matches!(cell, Md(text) if text.contains("Practice Exercises")))
        .collect();
    let mut document = document(cells);

    let before = evaluate(&document, &template);
    let closing = before.finding(rules::CLOSING_SECTIONS).unwrap();
    assert!(!closing.passed);
    assert_eq!(closing.severity, Severity::Critical);
    assert!(!before.accepted());

    fix(&mut document, &template, &Selection::all());
    let after = evaluate(&document, &template);
    assert!(!after.finding(rules::CLOSING_SECTIONS).unwrap().passed);
    assert!(after.score < template.threshold);
}

#[test]
fn closing_block_does_not_count_as_exercises() {
    let template = Template::default();
    let mut document = document(empty_exercises());
    let before = evaluate(&document, &template);
    let closing = before.finding(rules::CLOSING_SECTIONS).unwrap();
    assert!(!closing.passed);
    assert_eq!(closing.message, "practice exercises is empty");

    let reports = fix(&mut document, &template, &Selection::all());
    assert!(applied(&reports).contains(&fixer::TRAILING_BLOCK));
    let after = evaluate(&document, &template);
    assert!(after.finding(rules::TRAILING_BLOCK).unwrap().passed);
    let closing = after.finding(rules::CLOSING_SECTIONS).unwrap();
    assert!(!closing.passed);
    assert_eq!(closing.severity, Severity::Critical);
}

#[test]
fn long_chapters_can_meet_callout_density() {
    let template = Template::default();
    let capped = long_chapter(16, 7);
    let evaluation = evaluate(&capped, &template);
    assert!(evaluation.finding(rules::CALLOUT_DENSITY).unwrap().passed);

    let over = evaluate(&long_chapter(16, 8), &template);
    let density = over.finding(rules::CALLOUT_DENSITY).unwrap();
    assert!(!density.passed);
    assert_eq!(density.severity, Severity::Minor);

    let mut bare = long_chapter(16, 0);
    let before = evaluate(&bare, &template);
    assert!(!before.finding(rules::CALLOUT_DENSITY).unwrap().passed);
    let only = Selection::only(&["key_concepts"]).unwrap();
    let reports = fix(&mut bare, &template, &only);
    assert_eq!(reports[0].notes.len(), 7);
    let after = evaluate(&bare, &template);
    assert!(after.finding(rules::CALLOUT_DENSITY).unwrap().passed);
    assert!(after.score > before.score);
}

#[test]
fn visual_summary_keeps_an_opening_callout() {
    let template = Template::default();
    let mut document = document(callout_first());
    let before = evaluate(&document, &template);
    assert!(before.finding(rules::CALLOUT_DENSITY).unwrap().passed);

    let only = Selection::only(&["visual_summary"]).unwrap();
    assert_eq!(applied(&fix(&mut document, &template, &only)), vec![fixer::VISUAL_SUMMARY]);
    let outline = Outline::extract(&document, &template.extract_options());
    assert_eq!(outline.key_concepts().count(), 1);
    let after = evaluate(&document, &template);
    assert!(after.finding(rules::CALLOUT_DENSITY).unwrap().passed);
    assert!(after.score > before.score);
}

#[test]
fn fixing_twice_changes_nothing() {
    let template = Template::default();
    let mut once = document(messy());
    let first = fix(&mut once, &template, &Selection::all());
    assert_eq!(applied(&first).len(), 4);

    let mut twice = once.clone();
    let second = fix(&mut twice, &template, &Selection::all());
    assert!(applied(&second).is_empty());
    assert_eq!(twice.to_json().unwrap(), once.to_json().unwrap());
}

#[test]
fn fixes_only_add() {
    let template = Template::default();
    let original = document(messy());
    let mut fixed = original.clone();
    fix(&mut fixed, &template, &Selection::all());

    let mut targets = fixed.blocks().iter();
    for block in original.blocks() {
        let found = targets.any(|candidate| {
            candidate.kind == block.kind
                && match block.kind {
                    BlockKind::Prose => is_subsequence(block, candidate),
                    _ => candidate == block,
                }
        });
        assert!(found, "block lost or rewritten: {:?}", block.text());
    }
}

#[test]
fn fixes_never_lower_the_score() {
    let template = Template::default();
    let chapters = [
        ("messy", document(messy())),
        ("callout first", document(callout_first())),
        ("empty exercises", document(empty_exercises())),
        ("long", long_chapter(16, 0)),
        ("long and dense", long_chapter(20, 9)),
    ];
    for (label, chapter) in &chapters {
        for name in fixer::names() {
            let mut document = chapter.clone();
            let before = evaluate(&document, &template).score;
            fix(&mut document, &template, &Selection::only(&[name]).unwrap());
            let after = evaluate(&document, &template).score;
            assert!(
                after >= before,
                "{} lowered the score of {}: {} -> {}",
                name,
                label,
                before,
                after
            );
        }
        let mut document = chapter.clone();
        let before = evaluate(&document, &template).score;
        fix(&mut document, &template, &Selection::all());
        assert!(evaluate(&document, &template).score >= before, "{}", label);
    }

    let mut document = document(messy());
    let before = evaluate(&document, &template).score;
    fix(&mut document, &template, &Selection::all());
    assert!(evaluate(&document, &template).score > before);
}

#[test]
fn custom_template_changes_policy() {
    let template = Template::from_toml_str(
        "threshold = 100\n[weights]\nminor = 10\n[key_concepts]\nmin = 3\n",
    )
    .unwrap();
    let mut cells = compliant();
    cells.pop();
    let document = document(cells);
    let evaluation = evaluate(&document, &template);
    assert_eq!(evaluation.score, 90);
    assert!(!evaluation.accepted());
    assert_eq!(evaluation.count_failures(Severity::Minor), 1);
}

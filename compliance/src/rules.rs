//! The rule registry: one pure check per structural requirement.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use chapter::Outline;
use chapter::outline::{DifficultyTier, Heading, SectionName, TaskBlock};

use crate::finding::{Evaluation, Finding, Severity};
use crate::template::Template;

pub const FRONT_MATTER: &str = "FrontMatterPresence";
pub const VISUAL_SUMMARY: &str = "VisualSummaryPresence";
pub const SECTION_CONTIGUITY: &str = "SectionNumberContiguity";
pub const UNIQUE_NUMBERS: &str = "UniqueSectionNumbers";
pub const HEADER_SPACING: &str = "HeaderSpacing";
pub const CALLOUT_DENSITY: &str = "CalloutDensity";
pub const CALLOUT_PLACEMENT: &str = "CalloutPlacement";
pub const CLOSING_SECTIONS: &str = "ClosingSectionsPresent";
pub const TRAILING_BLOCK: &str = "TrailingBlockPresence";
pub const CASE_STUDY: &str = "CaseStudyStructure";

pub type Check = fn(&Outline, &Template) -> Finding;

pub struct Rule {
    pub name: &'static str,
    pub check: Check,
}

/// Every rule, in reporting order.
pub const RULES: &[Rule] = &[
    Rule {
        name: FRONT_MATTER,
        check: front_matter,
    },
    Rule {
        name: VISUAL_SUMMARY,
        check: visual_summary,
    },
    Rule {
        name: SECTION_CONTIGUITY,
        check: section_contiguity,
    },
    Rule {
        name: UNIQUE_NUMBERS,
        check: unique_numbers,
    },
    Rule {
        name: HEADER_SPACING,
        check: header_spacing,
    },
    Rule {
        name: CALLOUT_DENSITY,
        check: callout_density,
    },
    Rule {
        name: CALLOUT_PLACEMENT,
        check: callout_placement,
    },
    Rule {
        name: CLOSING_SECTIONS,
        check: closing_sections,
    },
    Rule {
        name: TRAILING_BLOCK,
        check: trailing_block,
    },
    Rule {
        name: CASE_STUDY,
        check: case_study,
    },
];

pub fn evaluate(outline: &Outline, template: &Template) -> Evaluation {
    let findings = RULES
        .iter()
        .map(|rule| {
            let finding = (rule.check)(outline, template);
            debug!(
                rule = rule.name,
                passed = finding.passed,
                severity = %finding.severity,
                "{}",
                finding.message
            );
            finding
        })
        .collect();
    Evaluation::new(findings, &template.weights, template.threshold)
}

/// Numbered headings before the case study with no key-concept callout in
/// their lookahead window. The window starts at the heading's own block and
/// never reaches into the next numbered section.
pub fn unplaced_headings<'a>(outline: &'a Outline, template: &Template) -> Vec<&'a Heading> {
    let boundary = outline
        .section(SectionName::CaseStudy)
        .map(|section| section.start)
        .unwrap_or(usize::MAX);
    let window = template.key_concepts.window;
    let numbered: Vec<&Heading> = outline.numbered_headings().collect();

    numbered
        .iter()
        .enumerate()
        .filter(|(_, heading)| heading.block < boundary)
        .filter(|(i, heading)| {
            let next = numbered
                .get(i + 1)
                .map(|next| next.block)
                .unwrap_or(usize::MAX);
            let last = heading.block.saturating_add(window);
            !outline.key_concepts().any(|callout| {
                callout.block >= heading.block && callout.block <= last && callout.block < next
            })
        })
        .map(|(_, heading)| *heading)
        .collect()
}

fn first_numbered_block(outline: &Outline) -> Option<usize> {
    outline.numbered_headings().map(|h| h.block).next()
}

fn front_matter(outline: &Outline, _template: &Template) -> Finding {
    let first = first_numbered_block(outline);
    let mut problems = Vec::new();
    let mut block = None;
    for name in [SectionName::Title, SectionName::Overview, SectionName::Setup] {
        match outline.section(name) {
            None => problems.push(format!("missing {}", name)),
            Some(section) => {
                if first.is_some_and(|first| section.start >= first) {
                    problems.push(format!("{} starts after the first numbered section", name));
                    block.get_or_insert(section.start);
                }
            }
        }
    }

    if problems.is_empty() {
        Finding::pass(FRONT_MATTER, Severity::Critical, "title, overview and setup present")
    } else {
        Finding::fail(FRONT_MATTER, Severity::Critical, problems.join("; ")).at(block)
    }
}

fn visual_summary(outline: &Outline, _template: &Template) -> Finding {
    if outline.visual_summary {
        Finding::pass(VISUAL_SUMMARY, Severity::Minor, "first block embeds an image")
    } else {
        let block = (outline.block_count > 0).then_some(0);
        Finding::fail(VISUAL_SUMMARY, Severity::Minor, "first block has no visual summary image")
            .at(block)
    }
}

fn section_contiguity(outline: &Outline, _template: &Template) -> Finding {
    let mut by_major: BTreeMap<u32, BTreeSet<u32>> = BTreeMap::new();
    for number in outline.numbered_headings().filter_map(|h| h.number) {
        by_major.entry(number.major).or_default().insert(number.minor);
    }

    let mut gaps = Vec::new();
    for (major, minors) in &by_major {
        let highest = minors.iter().next_back().copied().unwrap_or(0);
        gaps.extend(
            (1..=highest)
                .filter(|minor| !minors.contains(minor))
                .map(|minor| format!("{}.{}", major, minor)),
        );
    }

    if gaps.is_empty() {
        let count = outline.numbered_headings().count();
        Finding::pass(
            SECTION_CONTIGUITY,
            Severity::Minor,
            format!("{} numbered sections, no gaps", count),
        )
    } else {
        Finding::fail(
            SECTION_CONTIGUITY,
            Severity::Minor,
            format!("missing section numbers: {}", gaps.join(", ")),
        )
    }
}

fn unique_numbers(outline: &Outline, _template: &Template) -> Finding {
    let duplicates = outline.duplicate_numbers();
    let Some(first) = duplicates.first() else {
        return Finding::pass(UNIQUE_NUMBERS, Severity::Minor, "section numbers are unique");
    };
    let block = outline
        .numbered_headings()
        .filter(|h| h.number == Some(*first))
        .nth(1)
        .map(|h| h.block);
    let listed: Vec<String> = duplicates.iter().map(ToString::to_string).collect();
    Finding::fail(
        UNIQUE_NUMBERS,
        Severity::Minor,
        format!("duplicate section numbers: {}", listed.join(", ")),
    )
    .at(block)
}

fn header_spacing(outline: &Outline, _template: &Template) -> Finding {
    match outline.cramped_headings.first() {
        None => Finding::pass(HEADER_SPACING, Severity::Minor, "headings are followed by a blank line"),
        Some(first) => Finding::fail(
            HEADER_SPACING,
            Severity::Minor,
            format!(
                "{} heading line(s) directly followed by text",
                outline.cramped_headings.len()
            ),
        )
        .at(Some(first.block)),
    }
}

fn callout_density(outline: &Outline, template: &Template) -> Finding {
    let numbered = outline.numbered_headings().count();
    let (min, max) = template.density_bounds(numbered);
    let count = outline.key_concepts().count();

    if count < min {
        Finding::fail(
            CALLOUT_DENSITY,
            Severity::Critical,
            format!("{} key-concept callouts, expected at least {}", count, min),
        )
    } else if count > max {
        let block = outline.key_concepts().nth(max).map(|c| c.block);
        Finding::fail(
            CALLOUT_DENSITY,
            Severity::Minor,
            format!("{} key-concept callouts, expected at most {}", count, max),
        )
        .at(block)
    } else {
        Finding::pass(
            CALLOUT_DENSITY,
            Severity::Critical,
            format!("{} key-concept callouts (expected {}..={})", count, min, max),
        )
    }
}

fn callout_placement(outline: &Outline, template: &Template) -> Finding {
    let unplaced = unplaced_headings(outline, template);
    let Some(first) = unplaced.first() else {
        return Finding::pass(
            CALLOUT_PLACEMENT,
            Severity::Minor,
            "every numbered section has a nearby key concept",
        );
    };
    let labels: Vec<String> = unplaced.iter().map(|h| h.label()).collect();
    Finding::fail(
        CALLOUT_PLACEMENT,
        Severity::Minor,
        format!("no key concept near: {}", labels.join(", ")),
    )
    .at(Some(first.block))
}

fn closing_sections(outline: &Outline, _template: &Template) -> Finding {
    let mut problems = Vec::new();
    let mut block = None;
    let mut starts = Vec::new();

    for name in [SectionName::KeyTakeaways, SectionName::PracticeExercises] {
        let Some(section) = outline.section(name) else {
            problems.push(format!("missing {}", name));
            continue;
        };
        starts.push(section.start);
        if !section.has_body {
            problems.push(format!("{} is empty", name));
            block.get_or_insert(section.start);
        }
    }
    if let &[takeaways, exercises] = starts.as_slice() {
        if exercises < takeaways {
            problems.push(format!(
                "{} must come before {}",
                SectionName::KeyTakeaways,
                SectionName::PracticeExercises
            ));
            block.get_or_insert(exercises);
        }
    }

    if problems.is_empty() {
        Finding::pass(
            CLOSING_SECTIONS,
            Severity::Critical,
            "key takeaways and practice exercises present",
        )
    } else {
        Finding::fail(CLOSING_SECTIONS, Severity::Critical, problems.join("; ")).at(block)
    }
}

fn trailing_block(outline: &Outline, _template: &Template) -> Finding {
    if outline.closing_block {
        Finding::pass(TRAILING_BLOCK, Severity::Minor, "document ends with a closing block")
    } else {
        Finding::fail(
            TRAILING_BLOCK,
            Severity::Minor,
            "last block is not a short content-free prose block",
        )
        .at(outline.block_count.checked_sub(1))
    }
}

fn case_study(outline: &Outline, template: &Template) -> Finding {
    let Some(section) = outline.section(SectionName::CaseStudy) else {
        return Finding::pass(CASE_STUDY, Severity::Minor, "no case study section");
    };
    let mut tasks: Vec<&TaskBlock> = outline
        .tasks
        .iter()
        .filter(|task| section.contains(task.block))
        .collect();
    if tasks.is_empty() {
        return Finding::fail(CASE_STUDY, Severity::Critical, "case study has no tasks")
            .at(Some(section.start));
    }
    tasks.sort_by_key(|task| task.ordinal);

    let mut problems = Vec::new();
    let mut block = None;
    if tasks.len() < template.case_study.min_tasks {
        problems.push(format!(
            "{} tasks, expected at least {}",
            tasks.len(),
            template.case_study.min_tasks
        ));
        block.get_or_insert(section.start);
    }
    for task in tasks.iter().filter(|t| t.tier == DifficultyTier::Unlabeled) {
        problems.push(format!("task {} has no difficulty label", task.ordinal));
        block.get_or_insert(task.block);
    }
    let labeled: Vec<&&TaskBlock> = tasks.iter().filter(|t| t.tier.rigor().is_some()).collect();
    for pair in labeled.windows(2) {
        let (earlier, later) = (pair[0], pair[1]);
        if later.tier.rigor() < earlier.tier.rigor() {
            problems.push(format!(
                "task {} ({}) is less rigorous than task {} ({})",
                later.ordinal,
                later.tier.as_str(),
                earlier.ordinal,
                earlier.tier.as_str()
            ));
            block.get_or_insert(later.block);
        }
    }

    if problems.is_empty() {
        Finding::pass(
            CASE_STUDY,
            Severity::Minor,
            format!("{} tasks in increasing difficulty", tasks.len()),
        )
    } else {
        Finding::fail(CASE_STUDY, Severity::Minor, problems.join("; ")).at(block)
    }
}

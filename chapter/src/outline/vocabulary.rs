//! Fixed vocabularies mapping heading and label text to structural kinds.
//!
//! Every function here is total and pure: any input yields either a kind or
//! `None`, never an error.

use std::fmt;

use serde::Serialize;

/// Structural sections a chapter template knows about, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionName {
    Title,
    Overview,
    Setup,
    CaseStudy,
    KeyTakeaways,
    PracticeExercises,
}

impl SectionName {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionName::Title => "title",
            SectionName::Overview => "overview",
            SectionName::Setup => "setup",
            SectionName::CaseStudy => "case study",
            SectionName::KeyTakeaways => "key takeaways",
            SectionName::PracticeExercises => "practice exercises",
        }
    }
}

impl fmt::Display for SectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum Matcher {
    /// `Chapter <digit>...`
    ChapterNumber,
    /// Whole-word phrase anywhere in the title.
    Phrase(&'static str),
}

const VOCABULARY: &[(SectionName, &[Matcher])] = &[
    (SectionName::Title, &[Matcher::ChapterNumber]),
    (
        SectionName::Overview,
        &[Matcher::Phrase("overview"), Matcher::Phrase("learning objectives")],
    ),
    (
        SectionName::Setup,
        &[
            Matcher::Phrase("setup"),
            Matcher::Phrase("set up"),
            Matcher::Phrase("setting up"),
        ],
    ),
    (
        SectionName::CaseStudy,
        &[Matcher::Phrase("case study"), Matcher::Phrase("case studies")],
    ),
    (
        SectionName::KeyTakeaways,
        &[Matcher::Phrase("key takeaways"), Matcher::Phrase("takeaways")],
    ),
    (
        SectionName::PracticeExercises,
        &[Matcher::Phrase("practice exercises"), Matcher::Phrase("exercises")],
    ),
];

/// Match heading text against the section vocabulary. The first entry in
/// declaration order wins when a title names several sections.
pub fn section_name(title: &str) -> Option<SectionName> {
    let words = normalize(title);
    let padded = format!(" {} ", words);
    VOCABULARY
        .iter()
        .find(|(_, matchers)| {
            matchers.iter().any(|matcher| match matcher {
                Matcher::ChapterNumber => words
                    .strip_prefix("chapter ")
                    .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit())),
                Matcher::Phrase(phrase) => padded.contains(&format!(" {} ", phrase)),
            })
        })
        .map(|(name, _)| *name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CalloutKind {
    KeyConcept,
}

impl CalloutKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CalloutKind::KeyConcept => "key-concept",
        }
    }
}

/// Callout labels are matched case-insensitively; a trailing number such
/// as "Key Concept 2.1" is allowed.
pub fn callout_kind(label: &str) -> Option<CalloutKind> {
    let words = normalize(label);
    let rest = words.strip_prefix("key concept")?;
    let rest = rest.strip_prefix('s').unwrap_or(rest);
    if rest.is_empty() || rest.starts_with(|c: char| c == ' ') {
        Some(CalloutKind::KeyConcept)
    } else {
        None
    }
}

/// Task difficulty, in increasing order of rigor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DifficultyTier {
    Guided,
    SemiGuided,
    Independent,
    Unlabeled,
}

impl DifficultyTier {
    /// Position on the rigor scale; unlabeled tasks have none.
    pub fn rigor(self) -> Option<u8> {
        match self {
            DifficultyTier::Guided => Some(0),
            DifficultyTier::SemiGuided => Some(1),
            DifficultyTier::Independent => Some(2),
            DifficultyTier::Unlabeled => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DifficultyTier::Guided => "guided",
            DifficultyTier::SemiGuided => "semi-guided",
            DifficultyTier::Independent => "independent",
            DifficultyTier::Unlabeled => "unlabeled",
        }
    }

    fn from_label(label: &str) -> Self {
        let letters: String = label
            .chars()
            .filter(|c| c.is_alphabetic())
            .flat_map(char::to_lowercase)
            .collect();
        match letters.as_str() {
            "guided" => DifficultyTier::Guided,
            "semiguided" => DifficultyTier::SemiGuided,
            "independent" => DifficultyTier::Independent,
            _ => DifficultyTier::Unlabeled,
        }
    }
}

/// `Task <n>` headings, with the tier from a trailing `(...)` label.
pub fn task_heading(title: &str) -> Option<(u32, DifficultyTier)> {
    let title = title.trim();
    let lower = title.to_lowercase();
    let rest = lower.strip_prefix("task")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    let ordinal = rest[..digits].parse().ok()?;

    let tier = title
        .strip_suffix(')')
        .and_then(|inner| inner.rfind('(').map(|open| &inner[open + 1..]))
        .map(DifficultyTier::from_label)
        .unwrap_or(DifficultyTier::Unlabeled);
    Some((ordinal, tier))
}

/// Lowercase words separated by single spaces, punctuation dropped.
fn normalize(text: &str) -> String {
    let spaced: String = text
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_names() {
        assert_eq!(section_name("Chapter 3: Multiple Regression"), Some(SectionName::Title));
        assert_eq!(section_name("Chapter Overview"), Some(SectionName::Overview));
        assert_eq!(section_name("Setup"), Some(SectionName::Setup));
        assert_eq!(section_name("Setting Up Your Environment"), Some(SectionName::Setup));
        assert_eq!(section_name("Case Study: Housing Prices"), Some(SectionName::CaseStudy));
        assert_eq!(section_name("Key Takeaways"), Some(SectionName::KeyTakeaways));
        assert_eq!(section_name("Practice Exercises"), Some(SectionName::PracticeExercises));
        assert_eq!(section_name("Sampling Distributions"), None);
        assert_eq!(section_name("Upsetting results"), None);
    }

    #[test]
    fn ambiguous_titles_take_the_first_declared_name() {
        assert_eq!(
            section_name("Key Takeaways and Practice Exercises"),
            Some(SectionName::KeyTakeaways)
        );
        assert_eq!(section_name("Case Study Exercises"), Some(SectionName::CaseStudy));
    }

    #[test]
    fn callout_kinds() {
        assert_eq!(callout_kind("Key Concept"), Some(CalloutKind::KeyConcept));
        assert_eq!(callout_kind("KEY CONCEPT 4.2"), Some(CalloutKind::KeyConcept));
        assert_eq!(callout_kind("Key Concepts"), Some(CalloutKind::KeyConcept));
        assert_eq!(callout_kind("Key Conceptual"), None);
        assert_eq!(callout_kind("Note"), None);
    }

    #[test]
    fn task_headings() {
        assert_eq!(
            task_heading("Task 1: Load the data (Guided)"),
            Some((1, DifficultyTier::Guided))
        );
        assert_eq!(
            task_heading("task 2 - Fit (Semi-guided)"),
            Some((2, DifficultyTier::SemiGuided))
        );
        assert_eq!(
            task_heading("Task 3: Extend (Advanced)"),
            Some((3, DifficultyTier::Unlabeled))
        );
        assert_eq!(task_heading("Task 4"), Some((4, DifficultyTier::Unlabeled)));
        assert_eq!(task_heading("Tasks for later"), None);
        assert_eq!(task_heading("Task list"), None);
    }
}

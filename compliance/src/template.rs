//! Template configuration: everything the engine treats as policy rather
//! than logic.

use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use chapter::Block;
use chapter::outline::{self, ExtractOptions, inline, lexer};

/// File name looked up in the document root when no template is given.
pub const TEMPLATE_FILE: &str = "chaplint.toml";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("cannot read template {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid template: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid template: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Template {
    /// Minimum score (0-100) for a chapter to be accepted.
    pub threshold: u32,
    /// Heading level that carries `<major>.<minor>` section numbers.
    pub section_level: u8,
    /// Substring marking a learner fill-in in executable blocks.
    pub placeholder_token: String,
    pub weights: Weights,
    pub visual_summary: VisualSummary,
    pub key_concepts: KeyConcepts,
    pub case_study: CaseStudy,
    pub trailing: Trailing,
}

/// Score penalty per failed finding.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Weights {
    pub critical: u32,
    pub minor: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VisualSummary {
    /// Image line prepended to the first block; `{chapter}` is substituted.
    pub line: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeyConcepts {
    /// Defaults to one callout per two numbered sections, rounded up.
    pub min: Option<usize>,
    /// Defaults to one callout per numbered section.
    pub max: Option<usize>,
    /// Hard upper bound on `max`.
    pub cap: usize,
    /// Blocks after a numbered heading searched for its callout.
    pub window: usize,
    /// Placeholder callout block; `{section}` and `{title}` are substituted.
    pub placeholder: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaseStudy {
    pub min_tasks: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Trailing {
    /// Longest closing block still considered content-free.
    pub max_chars: usize,
    /// Text of an appended closing block.
    pub text: String,
}

impl Default for Template {
    fn default() -> Self {
        Template {
            threshold: 90,
            section_level: 2,
            placeholder_token: "YOUR CODE HERE".to_string(),
            weights: Weights::default(),
            visual_summary: VisualSummary::default(),
            key_concepts: KeyConcepts::default(),
            case_study: CaseStudy::default(),
            trailing: Trailing::default(),
        }
    }
}

impl Default for Weights {
    fn default() -> Self {
        Weights {
            critical: 25,
            minor: 3,
        }
    }
}

impl Default for VisualSummary {
    fn default() -> Self {
        VisualSummary {
            line: "![Visual summary](images/{chapter}_visual_summary.png)".to_string(),
        }
    }
}

impl Default for KeyConcepts {
    fn default() -> Self {
        KeyConcepts {
            min: None,
            max: None,
            cap: 7,
            window: 3,
            placeholder: concat!(
                "> **Key Concept:** *to be completed*\n",
                ">\n",
                "> [TO BE COMPLETED: state the key concept of {section} in two or three sentences.]",
            )
            .to_string(),
        }
    }
}

impl Default for CaseStudy {
    fn default() -> Self {
        CaseStudy { min_tasks: 3 }
    }
}

impl Default for Trailing {
    fn default() -> Self {
        Trailing {
            max_chars: 80,
            text: String::new(),
        }
    }
}

impl Template {
    pub fn from_toml_str(text: &str) -> Result<Self, TemplateError> {
        let template: Template = toml::from_str(text)?;
        template.validate()?;
        Ok(template)
    }

    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let text = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Template::from_toml_str(&text)
    }

    /// An explicit path, else `chaplint.toml` in the document root, else defaults.
    pub fn discover(explicit: Option<&Path>, root: &Path) -> Result<Self, TemplateError> {
        if let Some(path) = explicit {
            return Template::load(path);
        }
        let local = root.join(TEMPLATE_FILE);
        if local.is_file() {
            return Template::load(&local);
        }
        Ok(Template::default())
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            section_level: self.section_level,
            placeholder_token: self.placeholder_token.clone(),
            closing_block_max_chars: self.trailing.max_chars,
        }
    }

    /// Closed `[min, max]` range of key-concept callouts for a chapter with
    /// `numbered` numbered sections. `cap` bounds both ends, so the range is
    /// never empty.
    pub fn density_bounds(&self, numbered: usize) -> (usize, usize) {
        let concepts = &self.key_concepts;
        let min = concepts.min.unwrap_or(numbered.div_ceil(2));
        let max = concepts.max.unwrap_or(numbered.max(min)).min(concepts.cap);
        (min.min(max), max)
    }

    /// Reject templates whose fixes could not satisfy their own rules.
    fn validate(&self) -> Result<(), TemplateError> {
        if !(1..=6).contains(&self.section_level) {
            return Err(TemplateError::Invalid(format!(
                "section_level must be between 1 and 6, got {}",
                self.section_level
            )));
        }
        if self.threshold > 100 {
            return Err(TemplateError::Invalid(format!(
                "threshold must be at most 100, got {}",
                self.threshold
            )));
        }
        if self.placeholder_token.is_empty() {
            return Err(TemplateError::Invalid("placeholder_token must not be empty".into()));
        }
        if self.key_concepts.window == 0 {
            return Err(TemplateError::Invalid("key_concepts.window must be at least 1".into()));
        }
        let concepts = &self.key_concepts;
        if let Some(min) = concepts.min {
            let max = concepts.max.unwrap_or(concepts.cap).min(concepts.cap);
            if min > max {
                return Err(TemplateError::Invalid(format!(
                    "key_concepts.min ({}) exceeds the maximum ({})",
                    min, max
                )));
            }
        }
        if !inline::has_image(&self.visual_summary.line) {
            return Err(TemplateError::Invalid(
                "visual_summary.line must embed an image".into(),
            ));
        }
        if !outline::is_key_concept_callout(&self.key_concepts.placeholder) {
            return Err(TemplateError::Invalid(
                "key_concepts.placeholder must open with a `> **Key Concept**` callout".into(),
            ));
        }
        if !lexer::is_content_free(&Block::prose(&self.trailing.text), self.trailing.max_chars) {
            return Err(TemplateError::Invalid(
                "trailing.text must be content-free (blank lines, rules or comments)".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_template_is_the_default() {
        assert_eq!(Template::from_toml_str("").unwrap(), Template::default());
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let template = Template::from_toml_str(
            "threshold = 80\n[key_concepts]\nmin = 2\n[weights]\ncritical = 40\n",
        )
        .unwrap();
        assert_eq!(template.threshold, 80);
        assert_eq!(template.key_concepts.min, Some(2));
        assert_eq!(template.key_concepts.window, 3);
        assert_eq!(template.weights.critical, 40);
        assert_eq!(template.weights.minor, 3);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            Template::from_toml_str("treshold = 80"),
            Err(TemplateError::Parse(_))
        ));
    }

    #[test]
    fn placeholder_must_be_a_callout() {
        let result = Template::from_toml_str("[key_concepts]\nplaceholder = \"TODO\"\n");
        assert!(matches!(result, Err(TemplateError::Invalid(_))));
    }

    #[test]
    fn trailing_text_must_be_content_free() {
        let result = Template::from_toml_str("[trailing]\ntext = \"The end.\"\n");
        assert!(matches!(result, Err(TemplateError::Invalid(_))));
        assert!(Template::from_toml_str("[trailing]\ntext = \"---\"\n").is_ok());
    }

    #[test]
    fn density_defaults_follow_section_count() {
        let template = Template::default();
        assert_eq!(template.density_bounds(0), (0, 0));
        assert_eq!(template.density_bounds(3), (2, 3));
        assert_eq!(template.density_bounds(14), (7, 7));
        assert_eq!(template.density_bounds(16), (7, 7));
        assert_eq!(template.density_bounds(20), (7, 7));
    }

    #[test]
    fn explicit_bounds_are_capped_together() {
        let template = Template::from_toml_str("[key_concepts]
max = 12
cap = 5
").unwrap();
        assert_eq!(template.density_bounds(30), (5, 5));
        assert_eq!(template.density_bounds(4), (2, 5));
    }

    #[test]
    fn min_above_max_is_rejected() {
        for text in [
            "[key_concepts]\nmin = 4\nmax = 3\n",
            "[key_concepts]\nmin = 9\n",
            "[key_concepts]\nmin = 3\ncap = 2\n",
        ] {
            assert!(
                matches!(Template::from_toml_str(text), Err(TemplateError::Invalid(_))),
                "{}",
                text
            );
        }
        assert!(Template::from_toml_str("[key_concepts]\nmin = 3\nmax = 3\n").is_ok());
    }

    #[test]
    fn discover_prefers_explicit_then_root_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            Template::discover(None, dir.path()).unwrap(),
            Template::default()
        );
        std::fs::write(dir.path().join(TEMPLATE_FILE), "threshold = 70\n").unwrap();
        assert_eq!(Template::discover(None, dir.path()).unwrap().threshold, 70);
        let explicit = dir.path().join("strict.toml");
        std::fs::write(&explicit, "threshold = 100\n").unwrap();
        assert_eq!(
            Template::discover(Some(&explicit), dir.path()).unwrap().threshold,
            100
        );
    }
}

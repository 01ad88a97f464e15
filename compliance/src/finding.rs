use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::template::Weights;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Minor,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Minor => "minor",
        }
    }

    pub fn penalty(self, weights: &Weights) -> u32 {
        match self {
            Severity::Critical => weights.critical,
            Severity::Minor => weights.minor,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of one rule against one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub rule: &'static str,
    pub passed: bool,
    pub severity: Severity,
    pub message: String,
    /// Block the finding points at, when it has a location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<usize>,
}

impl Finding {
    pub fn pass(rule: &'static str, severity: Severity, message: impl Into<String>) -> Self {
        Finding {
            rule,
            passed: true,
            severity,
            message: message.into(),
            block: None,
        }
    }

    pub fn fail(rule: &'static str, severity: Severity, message: impl Into<String>) -> Self {
        Finding {
            rule,
            passed: false,
            severity,
            message: message.into(),
            block: None,
        }
    }

    pub fn at(mut self, block: Option<usize>) -> Self {
        self.block = block;
        self
    }
}

/// All findings for a document, in rule registration order, with the score
/// they add up to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub score: u32,
    pub threshold: u32,
    pub findings: Vec<Finding>,
}

impl Evaluation {
    pub fn new(findings: Vec<Finding>, weights: &Weights, threshold: u32) -> Self {
        Evaluation {
            score: score(&findings, weights),
            threshold,
            findings,
        }
    }

    pub fn accepted(&self) -> bool {
        self.score >= self.threshold
    }

    pub fn failures(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.passed)
    }

    pub fn count_failures(&self, severity: Severity) -> usize {
        self.failures().filter(|f| f.severity == severity).count()
    }

    pub fn finding(&self, rule: &str) -> Option<&Finding> {
        self.findings.iter().find(|f| f.rule == rule)
    }

    /// Rule name to pass/fail.
    pub fn outcomes(&self) -> BTreeMap<&'static str, bool> {
        self.findings.iter().map(|f| (f.rule, f.passed)).collect()
    }
}

/// 100 minus the weighted penalty of every failed finding, floored at 0.
pub fn score(findings: &[Finding], weights: &Weights) -> u32 {
    let penalty = findings
        .iter()
        .filter(|f| !f.passed)
        .map(|f| f.severity.penalty(weights))
        .fold(0u32, u32::saturating_add);
    100u32.saturating_sub(penalty)
}

pub mod engine;
pub mod finding;
pub mod fixer;
pub mod rules;
pub mod snapshot;
pub mod template;

pub use engine::{Engine, FixOutcome, OutlineSummary, RevertOutcome, RunError, VerifyOutcome};
pub use finding::{Evaluation, Finding, Severity};
pub use fixer::{FixError, FixReport, FixStatus, Selection};
pub use snapshot::{SnapshotError, SnapshotId, SnapshotStore};
pub use template::{Template, TemplateError};

pub mod block;
pub mod document;
pub mod outline;
pub mod store;

pub use block::{Block, BlockKind};
pub use document::{Document, DocumentError};
pub use outline::{ExtractOptions, Outline};
pub use store::DocumentStore;

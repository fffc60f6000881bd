//! Answer store: the single source of truth for every collected value.

pub mod keys;
pub mod store;
pub mod value;

pub use store::{AnswerPatch, AnswerStore};
pub use value::{AnswerValue, DocumentRef, StagedFile};

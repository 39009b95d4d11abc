//! Minimal native index engine.
//!
//! Each directory holds exactly one segment: the analyzed, stored documents
//! plus deletion tombstones. Mutation goes through [`IndexWriter`] (append)
//! and [`IndexReader`] (term lookup and deletion); both persist their changes
//! on close. Exclusive access across execution contexts is the workspace's
//! responsibility, not the engine's.

pub mod reader;
pub mod segment;
pub mod writer;

pub use reader::IndexReader;
pub use segment::{Segment, StoredDocument, StoredField};
pub use writer::IndexWriter;

/// An exact term: a field name and the term text to match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Term {
    /// Field name.
    pub field: String,
    /// Exact term text.
    pub text: String,
}

impl Term {
    /// Create a new term.
    pub fn new(field: impl Into<String>, text: impl Into<String>) -> Self {
        Term {
            field: field.into(),
            text: text.into(),
        }
    }
}

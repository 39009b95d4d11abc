//! On-disk segment format.
//!
//! A segment is the bincode serialization of its stored documents followed by
//! a little-endian crc32 of those bytes. Deleted documents stay in place as
//! tombstones; physical reclamation is left to an external reindex.

use serde::{Deserialize, Serialize};

use crate::analysis::Analyzer;
use crate::document::{Document, Store, TokenizePolicy};
use crate::error::{QuiverError, Result};

/// One analyzed field of a stored document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredField {
    /// Field name.
    pub name: String,
    /// Raw value, present only for stored fields.
    pub stored_value: Option<String>,
    /// Index terms produced at write time.
    pub terms: Vec<String>,
    /// Field boost recorded at write time.
    pub boost: Option<f32>,
}

/// One document as it lives in a segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Analyzed fields.
    pub fields: Vec<StoredField>,
    /// Document-level boost recorded at write time.
    pub boost: Option<f32>,
    /// Deletion tombstone.
    pub deleted: bool,
}

impl StoredDocument {
    /// Analyze a document into its stored form.
    pub fn from_document(doc: &Document, analyzer: &dyn Analyzer) -> Self {
        let fields = doc
            .fields()
            .iter()
            .map(|field| {
                let text = field.value.as_text();
                let terms = match field.tokenize {
                    TokenizePolicy::Tokenized => analyzer.analyze(&text),
                    TokenizePolicy::Untokenized => {
                        if text.is_empty() {
                            Vec::new()
                        } else {
                            vec![text.clone()]
                        }
                    }
                    TokenizePolicy::No => Vec::new(),
                };
                StoredField {
                    name: field.name.clone(),
                    stored_value: match field.store {
                        Store::Yes => Some(text),
                        Store::No => None,
                    },
                    terms,
                    boost: field.boost,
                }
            })
            .collect();
        StoredDocument {
            fields,
            boost: doc.boost(),
            deleted: false,
        }
    }

    /// Stored value of the first field with the given name.
    pub fn stored_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .and_then(|f| f.stored_value.as_deref())
    }

    /// Whether any term of the named field matches exactly.
    pub fn has_term(&self, field: &str, term: &str) -> bool {
        self.fields
            .iter()
            .filter(|f| f.name == field)
            .any(|f| f.terms.iter().any(|t| t == term))
    }
}

/// A directory's single segment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Segment {
    /// All documents, live and tombstoned, in insertion order.
    pub documents: Vec<StoredDocument>,
}

impl Segment {
    /// Create an empty segment.
    pub fn new() -> Self {
        Segment::default()
    }

    /// Number of live (non-tombstoned) documents.
    pub fn num_live_docs(&self) -> usize {
        self.documents.iter().filter(|d| !d.deleted).count()
    }

    /// Encode to bytes with a trailing crc32 checksum.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut bytes = bincode::serialize(self)?;
        let checksum = crc32fast::hash(&bytes);
        bytes.extend_from_slice(&checksum.to_le_bytes());
        Ok(bytes)
    }

    /// Decode from bytes, verifying the checksum.
    pub fn decode(bytes: &[u8]) -> Result<Segment> {
        if bytes.len() < 4 {
            return Err(QuiverError::index("segment file truncated"));
        }
        let (payload, footer) = bytes.split_at(bytes.len() - 4);
        let expected = u32::from_le_bytes(footer.try_into().expect("footer is 4 bytes"));
        let actual = crc32fast::hash(payload);
        if expected != actual {
            return Err(QuiverError::index(format!(
                "segment checksum mismatch: expected {expected:08x}, got {actual:08x}"
            )));
        }
        Ok(bincode::deserialize(payload)?)
    }
}

//! Index document representation.
//!
//! A [`Document`] is an ordered, named bag of field values derived from one
//! entity instance at one point in time. Documents are immutable once built
//! by the document builder and are serializable so work lists can be
//! forwarded across processes.

use serde::{Deserialize, Serialize};

/// Storage policy for a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Store {
    /// The raw value is kept in the index and can be retrieved from hits.
    Yes,
    /// The value is indexed but not retrievable.
    No,
}

/// Tokenization policy for a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenizePolicy {
    /// Run the value through the analyzer.
    Tokenized,
    /// Index the value as a single exact term.
    Untokenized,
    /// Do not index the value at all (store-only field).
    No,
}

/// A field value. Non-text values are bridged to their canonical string
/// form before indexing so they can be matched and parsed back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Text value.
    Text(String),
    /// Integer value, bridged as its decimal representation.
    Integer(i64),
    /// Float value, bridged as its display representation.
    Float(f64),
    /// Boolean value, bridged as `true`/`false`.
    Boolean(bool),
}

impl FieldValue {
    /// Canonical string form used for indexing and term matching.
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::Boolean(b) => b.to_string(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Boolean(b)
    }
}

/// One named field inside a document, with its indexing policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    /// Field name, including any embedded-object prefix.
    pub name: String,
    /// Field value.
    pub value: FieldValue,
    /// Storage policy.
    pub store: Store,
    /// Tokenization policy.
    pub tokenize: TokenizePolicy,
    /// Optional per-field boost factor.
    pub boost: Option<f32>,
}

/// An index-ready document: the ordered fields derived from one entity
/// instance, including the hidden type-discriminator and identifier fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    fields: Vec<Field>,
    boost: Option<f32>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Document::default()
    }

    /// Append a field.
    pub fn add_field(
        &mut self,
        name: impl Into<String>,
        value: FieldValue,
        store: Store,
        tokenize: TokenizePolicy,
        boost: Option<f32>,
    ) {
        self.fields.push(Field {
            name: name.into(),
            value,
            store,
            tokenize,
            boost,
        });
    }

    /// Set the document-level boost factor.
    pub fn set_boost(&mut self, boost: f32) {
        self.boost = Some(boost);
    }

    /// Document-level boost factor, if any.
    pub fn boost(&self) -> Option<f32> {
        self.boost
    }

    /// All fields, in insertion order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// First field with the given name.
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Stored string value of the first field with the given name.
    pub fn get_text(&self, name: &str) -> Option<String> {
        self.get(name).map(|f| f.value.as_text())
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

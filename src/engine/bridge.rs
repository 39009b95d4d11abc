//! Identifier bridging.
//!
//! Entity identifiers are carried through the work queue in their typed form
//! and bridged to a canonical string when written to the identifier field, so
//! a hit can later be parsed back into the same typed identifier (two-way
//! bridge).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{QuiverError, Result};

/// A typed entity identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityId {
    /// Integer identifier, bridged as its decimal representation.
    Int(i64),
    /// String identifier, bridged as-is.
    Text(String),
}

impl EntityId {
    /// Canonical term text for the identifier field.
    pub fn as_term_text(&self) -> String {
        match self {
            EntityId::Int(i) => i.to_string(),
            EntityId::Text(s) => s.clone(),
        }
    }

    /// Parse a stored identifier field back into a typed identifier.
    pub fn parse(kind: IdKind, text: &str) -> Result<EntityId> {
        match kind {
            IdKind::Int => text
                .parse::<i64>()
                .map(EntityId::Int)
                .map_err(|_| {
                    QuiverError::index(format!("stored identifier is not an integer: '{text}'"))
                }),
            IdKind::Text => Ok(EntityId::Text(text.to_string())),
        }
    }

    /// The identifier kind of this value.
    pub fn kind(&self) -> IdKind {
        match self {
            EntityId::Int(_) => IdKind::Int,
            EntityId::Text(_) => IdKind::Text,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_term_text())
    }
}

impl From<i64> for EntityId {
    fn from(i: i64) -> Self {
        EntityId::Int(i)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId::Text(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        EntityId::Text(s)
    }
}

/// The declared identifier kind of an entity type, recorded at registration
/// so stored identifiers can be parsed back without guessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdKind {
    /// `i64` identifiers.
    Int,
    /// String identifiers.
    Text,
}

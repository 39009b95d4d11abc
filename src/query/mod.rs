//! Query surface over the indexed documents.
//!
//! Queries run against the persisted segments and return [`EntityRef`]s,
//! the (type name, identifier) pairs needed to load the live entities back
//! from the owning store through an [`EntityLoader`]. Results can be
//! materialized at once, iterated, or scrolled through a cursor.

use std::sync::Arc;

use tracing::trace;

use crate::analysis::Analyzer;
use crate::engine::{CLASS_FIELD_NAME, EntityHandle, EntityId};
use crate::error::{QuiverError, Result};
use crate::factory::SearchFactory;
use crate::index::{IndexReader, Term};
use crate::store::DirectoryProvider;

/// An exact single-term query against one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermQuery {
    /// Field to match against.
    pub field: String,
    /// The term, as it exists in the index.
    pub text: String,
}

impl TermQuery {
    /// Create a query from an already-analyzed term.
    pub fn new(field: impl Into<String>, text: impl Into<String>) -> Self {
        TermQuery {
            field: field.into(),
            text: text.into(),
        }
    }

    /// Parse `field:text`, running the text through the analyzer so the
    /// query matches what was written at indexing time.
    pub fn parse(input: &str, analyzer: &dyn Analyzer) -> Result<Self> {
        let (field, raw) = input.split_once(':').ok_or_else(|| {
            QuiverError::query(format!("expected 'field:text', got '{input}'"))
        })?;
        let field = field.trim();
        if field.is_empty() {
            return Err(QuiverError::query(format!("empty field name in '{input}'")));
        }
        let mut terms = analyzer.analyze(raw);
        match terms.len() {
            1 => Ok(TermQuery::new(field, terms.remove(0))),
            0 => Err(QuiverError::query(format!(
                "no searchable term in '{input}'"
            ))),
            _ => Err(QuiverError::query(format!(
                "more than one term in '{input}'"
            ))),
        }
    }
}

/// A hit: the type and identifier needed to load the live entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    /// Registered entity type name.
    pub type_name: String,
    /// Identifier, parsed back through the type's declared identifier kind.
    pub id: EntityId,
}

/// Loads live entities from hits; implemented by the owning store's session.
pub trait EntityLoader {
    /// Load the entity behind one hit. `None` means the entity no longer
    /// exists (the index lags the store) and the hit is silently dropped.
    fn load(&self, reference: &EntityRef) -> Option<EntityHandle>;
}

/// A query bound to a factory and an optional set of target types.
pub struct FullTextQuery<'a> {
    factory: &'a SearchFactory,
    query: TermQuery,
    types: Vec<String>,
}

impl<'a> FullTextQuery<'a> {
    pub(crate) fn new(factory: &'a SearchFactory, query: TermQuery) -> Self {
        FullTextQuery {
            factory,
            query,
            types: Vec::new(),
        }
    }

    /// Restrict the hits to the given entity types. Unrestricted queries
    /// search every registered type.
    pub fn restrict_to(mut self, type_name: impl Into<String>) -> Self {
        self.types.push(type_name.into());
        self
    }

    /// Distinct directories the query targets, one reader each: several
    /// requested types may share one directory.
    fn target_directories(&self) -> Result<Vec<Arc<dyn DirectoryProvider>>> {
        if self.types.is_empty() {
            return Ok(self.factory.directory_providers().to_vec());
        }
        let mut providers: Vec<Arc<dyn DirectoryProvider>> = Vec::new();
        for type_name in &self.types {
            let builder = self.factory.registry().get_by_name(type_name).ok_or_else(|| {
                QuiverError::query(format!("not an indexed entity type: {type_name}"))
            })?;
            let provider = builder.directory();
            if !providers.iter().any(|p| p.location() == provider.location()) {
                providers.push(provider.clone());
            }
        }
        Ok(providers)
    }

    fn matches(&self) -> Result<Vec<EntityRef>> {
        let term = Term::new(self.query.field.clone(), self.query.text.clone());
        let mut refs = Vec::new();
        for provider in self.target_directories()? {
            let reader = IndexReader::open(provider)?;
            for idx in reader.term_docs(&term) {
                let document = reader.document(idx)?;
                let Some(type_name) = document.stored_value(CLASS_FIELD_NAME) else {
                    // not one of ours; the directory may hold foreign data
                    continue;
                };
                if !self.types.is_empty() && !self.types.iter().any(|t| t == type_name) {
                    continue;
                }
                let Some(builder) = self.factory.registry().get_by_name(type_name) else {
                    continue;
                };
                let descriptor = builder.descriptor();
                let raw_id = document.stored_value(descriptor.id_field()).ok_or_else(|| {
                    QuiverError::query(format!(
                        "hit for {type_name} carries no identifier field"
                    ))
                })?;
                refs.push(EntityRef {
                    type_name: type_name.to_string(),
                    id: EntityId::parse(descriptor.id_kind(), raw_id)?,
                });
            }
        }
        trace!(
            field = %self.query.field,
            text = %self.query.text,
            hits = refs.len(),
            "query executed"
        );
        Ok(refs)
    }

    /// Number of matching documents.
    pub fn result_size(&self) -> Result<usize> {
        Ok(self.matches()?.len())
    }

    /// Materialize every hit.
    pub fn list(&self) -> Result<Vec<EntityRef>> {
        self.matches()
    }

    /// Materialize every hit and load the live entities, dropping hits whose
    /// entity no longer exists.
    pub fn list_with<L: EntityLoader + ?Sized>(&self, loader: &L) -> Result<Vec<EntityHandle>> {
        Ok(self
            .matches()?
            .iter()
            .filter_map(|reference| loader.load(reference))
            .collect())
    }

    /// Iterate over the hits.
    pub fn iter(&self) -> Result<QueryIterator> {
        Ok(QueryIterator {
            inner: self.matches()?.into_iter(),
        })
    }

    /// Open a bidirectional cursor over the hits.
    pub fn scroll(&self) -> Result<ScrollableResults> {
        Ok(ScrollableResults::new(self.matches()?))
    }
}

/// Owning iterator over query hits.
pub struct QueryIterator {
    inner: std::vec::IntoIter<EntityRef>,
}

impl Iterator for QueryIterator {
    type Item = EntityRef;

    fn next(&mut self) -> Option<EntityRef> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for QueryIterator {}

/// Bidirectional cursor over query hits. The cursor starts before the first
/// hit; `next` must be called once before `get` returns anything.
pub struct ScrollableResults {
    refs: Vec<EntityRef>,
    position: isize,
}

impl ScrollableResults {
    fn new(refs: Vec<EntityRef>) -> Self {
        ScrollableResults { refs, position: -1 }
    }

    /// Total number of hits.
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Whether there are no hits.
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// The hit under the cursor, if the cursor is on a valid row.
    pub fn get(&self) -> Option<&EntityRef> {
        usize::try_from(self.position)
            .ok()
            .and_then(|idx| self.refs.get(idx))
    }

    /// Advance; `false` once the cursor moves past the last hit.
    pub fn next(&mut self) -> bool {
        if self.position < self.refs.len() as isize {
            self.position += 1;
        }
        self.get().is_some()
    }

    /// Step back; `false` once the cursor moves before the first hit.
    pub fn previous(&mut self) -> bool {
        if self.position >= 0 {
            self.position -= 1;
        }
        self.get().is_some()
    }

    /// Jump to the first hit.
    pub fn first(&mut self) -> bool {
        self.position = 0;
        self.get().is_some()
    }

    /// Jump to the last hit.
    pub fn last(&mut self) -> bool {
        self.position = self.refs.len() as isize - 1;
        self.get().is_some()
    }

    /// Reset the cursor to before the first hit.
    pub fn before_first(&mut self) {
        self.position = -1;
    }
}

//! Document construction and work expansion for one entity type.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;

use crate::analysis::AnalyzerRef;
use crate::backend::{IndexWork, WorkKind};
use crate::document::{Document, FieldValue, Store, TokenizePolicy};
use crate::engine::descriptor::{AttributeSet, EntityDescriptor, EntityHandle};
use crate::engine::{CLASS_FIELD_NAME, EntityId};
use crate::error::Result;
use crate::index::Term;
use crate::store::DirectoryProvider;

/// Converts live instances of one entity type into index-ready documents and
/// expands work items into concrete index operations. Owns the type's
/// directory assignment and analyzer.
pub struct DocumentBuilder {
    descriptor: EntityDescriptor,
    analyzer: AnalyzerRef,
    directory: Arc<dyn DirectoryProvider>,
}

impl DocumentBuilder {
    /// Create a builder for one registered entity type.
    pub fn new(
        descriptor: EntityDescriptor,
        analyzer: AnalyzerRef,
        directory: Arc<dyn DirectoryProvider>,
    ) -> Self {
        DocumentBuilder {
            descriptor,
            analyzer,
            directory,
        }
    }

    /// The type's registration metadata.
    pub fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    /// The analyzer used when writing this type's documents.
    pub fn analyzer(&self) -> &AnalyzerRef {
        &self.analyzer
    }

    /// The directory this type is assigned to.
    pub fn directory(&self) -> &Arc<dyn DirectoryProvider> {
        &self.directory
    }

    /// Stable hash of this builder, used to derive the deadlock-free batch
    /// ordering: equal builders always sort together, in the same relative
    /// position, on every thread.
    pub fn stable_hash(&self) -> u32 {
        crc32fast::hash(self.descriptor.type_name.as_bytes())
    }

    /// The exact-match term identifying one instance's documents.
    pub fn id_term(&self, id: &EntityId) -> Term {
        Term::new(self.descriptor.id_field.clone(), id.as_term_text())
    }

    /// Derive the index document for one instance: type discriminator,
    /// bridged identifier, and every indexable attribute (embedded objects
    /// included, under their prefixes).
    pub fn document(&self, entity: &(dyn Any + Send + Sync), id: &EntityId) -> Result<Document> {
        let mut doc = Document::new();
        if let Some(boost) = self.descriptor.boost {
            doc.set_boost(boost);
        }
        doc.add_field(
            CLASS_FIELD_NAME,
            FieldValue::Text(self.descriptor.type_name.clone()),
            Store::Yes,
            TokenizePolicy::Untokenized,
            None,
        );
        doc.add_field(
            self.descriptor.id_field.clone(),
            FieldValue::Text(id.as_term_text()),
            Store::Yes,
            TokenizePolicy::Untokenized,
            self.descriptor.id_boost,
        );
        Self::build_fields(entity, &mut doc, &self.descriptor.metadata, None);
        Ok(doc)
    }

    /// `inherited` is the accumulated boost of the enclosing embedding
    /// levels; a level's own boost multiplies into it and into every field
    /// boost below.
    fn build_fields(
        instance: &(dyn Any + Send + Sync),
        doc: &mut Document,
        set: &AttributeSet,
        inherited: Option<f32>,
    ) {
        let level_boost = combine_boosts(inherited, set.boost);
        for attr in &set.attributes {
            if let Some(value) = (attr.accessor)(instance) {
                doc.add_field(
                    attr.name.clone(),
                    value,
                    attr.store,
                    attr.tokenize,
                    combine_boosts(level_boost, attr.boost),
                );
            }
        }
        for embedded in &set.embedded {
            if let Some(child) = (embedded.accessor)(instance) {
                Self::build_fields(child, doc, &embedded.metadata, level_boost);
            }
        }
    }

    /// Expand one work item into concrete index operations, then cascade to
    /// the containing documents that denormalize this instance.
    ///
    /// Whatever the operation, an entry already queued for the same
    /// (type, identifier) short-circuits the expansion; within one batch the
    /// first operation per key wins.
    pub fn add_work_to_queue(
        &self,
        registry: &DocumentBuilderRegistry,
        entity: &EntityHandle,
        id: EntityId,
        kind: WorkKind,
        queue: &mut Vec<IndexWork>,
    ) -> Result<()> {
        let type_name = self.descriptor.type_name.as_str();
        if queue
            .iter()
            .any(|work| work.type_name() == type_name && work.id() == &id)
        {
            return Ok(());
        }

        let search_for_containers = match kind {
            WorkKind::Add => {
                queue.push(IndexWork::Add {
                    type_name: type_name.to_string(),
                    id: id.clone(),
                    document: self.document(entity.as_ref(), &id)?,
                });
                true
            }
            WorkKind::Delete => {
                queue.push(IndexWork::Delete {
                    type_name: type_name.to_string(),
                    id: id.clone(),
                });
                false
            }
            WorkKind::Update => {
                // the index engine deletes by exact term only, so an update
                // is a delete-then-add pair
                queue.push(IndexWork::Delete {
                    type_name: type_name.to_string(),
                    id: id.clone(),
                });
                queue.push(IndexWork::Add {
                    type_name: type_name.to_string(),
                    id: id.clone(),
                    document: self.document(entity.as_ref(), &id)?,
                });
                true
            }
        };

        if search_for_containers {
            self.process_contained_in(registry, entity.as_ref(), queue)?;
        }
        Ok(())
    }

    fn process_contained_in(
        &self,
        registry: &DocumentBuilderRegistry,
        instance: &(dyn Any + Send + Sync),
        queue: &mut Vec<IndexWork>,
    ) -> Result<()> {
        // contained-in only applies at the root level: an embedded object
        // has no shared reference to walk back through
        for contained in &self.descriptor.metadata.contained_in {
            let Some(owner_builder) = registry.get(contained.owner_type) else {
                continue;
            };
            for owner in (contained.accessor)(instance) {
                let owner_id = owner_builder.descriptor.id_of(owner.as_ref())?;
                owner_builder.add_work_to_queue(
                    registry,
                    &owner,
                    owner_id,
                    WorkKind::Update,
                    queue,
                )?;
            }
        }
        Ok(())
    }
}

fn combine_boosts(a: Option<f32>, b: Option<f32>) -> Option<f32> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a * b),
        (boost, None) | (None, boost) => boost,
    }
}

impl fmt::Debug for DocumentBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentBuilder")
            .field("descriptor", &self.descriptor)
            .field("directory", &self.directory.name())
            .finish()
    }
}

/// Immutable registry of document builders, keyed by runtime type identity
/// and by type name.
#[derive(Debug, Default)]
pub struct DocumentBuilderRegistry {
    by_type: AHashMap<TypeId, Arc<DocumentBuilder>>,
    by_name: AHashMap<String, Arc<DocumentBuilder>>,
}

impl DocumentBuilderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        DocumentBuilderRegistry::default()
    }

    /// Register a builder.
    pub fn insert(&mut self, builder: Arc<DocumentBuilder>) {
        self.by_name
            .insert(builder.descriptor().type_name().to_string(), builder.clone());
        self.by_type.insert(builder.descriptor().type_id(), builder);
    }

    /// Look up by runtime type identity.
    pub fn get(&self, type_id: TypeId) -> Option<&Arc<DocumentBuilder>> {
        self.by_type.get(&type_id)
    }

    /// Look up by type name.
    pub fn get_by_name(&self, type_name: &str) -> Option<&Arc<DocumentBuilder>> {
        self.by_name.get(type_name)
    }

    /// Whether the type is registered for indexing.
    pub fn contains(&self, type_id: TypeId) -> bool {
        self.by_type.contains_key(&type_id)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    /// Whether no types are registered.
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    /// All registered builders.
    pub fn builders(&self) -> impl Iterator<Item = &Arc<DocumentBuilder>> {
        self.by_type.values()
    }
}

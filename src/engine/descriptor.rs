//! Indexed entity type descriptors.
//!
//! A descriptor is the startup-time registration of everything the indexing
//! layer needs to know about one entity type: its identifier accessor, its
//! indexable attributes, embedded objects (bounded by depth), and
//! contained-in back-references. Descriptors replace runtime reflection with
//! explicit closure accessors and are immutable once built.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::document::{FieldValue, Store, TokenizePolicy};
use crate::engine::bridge::{EntityId, IdKind};
use crate::error::{QuiverError, Result};

/// A shared, type-erased entity instance as it travels through work queues.
pub type EntityHandle = Arc<dyn Any + Send + Sync>;

pub(crate) type FieldAccessor =
    Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Option<FieldValue> + Send + Sync>;
pub(crate) type IdAccessor =
    Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Option<EntityId> + Send + Sync>;
pub(crate) type EmbeddedAccessor = Arc<
    dyn for<'a> Fn(&'a (dyn Any + Send + Sync)) -> Option<&'a (dyn Any + Send + Sync)>
        + Send
        + Sync,
>;
pub(crate) type ContainedInAccessor =
    Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Vec<EntityHandle> + Send + Sync>;

/// One indexable attribute: prefixed field name, accessor, and policies.
pub(crate) struct AttributeDescriptor {
    pub(crate) name: String,
    pub(crate) accessor: FieldAccessor,
    pub(crate) store: Store,
    pub(crate) tokenize: TokenizePolicy,
    pub(crate) boost: Option<f32>,
}

/// An embedded object: accessor into the referenced instance plus the
/// sub-attributes indexed under the embedding prefix.
pub(crate) struct EmbeddedDescriptor {
    pub(crate) accessor: EmbeddedAccessor,
    pub(crate) metadata: AttributeSet,
}

/// A contained-in back-reference: reaches from a changed instance back to
/// the root instances whose denormalized documents embed it.
pub(crate) struct ContainedInDescriptor {
    pub(crate) owner_type: TypeId,
    pub(crate) accessor: ContainedInAccessor,
}

/// Attribute metadata for one nesting level.
#[derive(Default)]
pub(crate) struct AttributeSet {
    pub(crate) attributes: Vec<AttributeDescriptor>,
    pub(crate) embedded: Vec<EmbeddedDescriptor>,
    pub(crate) contained_in: Vec<ContainedInDescriptor>,
    pub(crate) boost: Option<f32>,
}

/// The immutable registration of one indexed entity type.
pub struct EntityDescriptor {
    pub(crate) type_name: String,
    pub(crate) type_id: TypeId,
    pub(crate) index_name: String,
    pub(crate) id_field: String,
    pub(crate) id_kind: IdKind,
    pub(crate) id_accessor: IdAccessor,
    pub(crate) id_boost: Option<f32>,
    pub(crate) boost: Option<f32>,
    pub(crate) metadata: AttributeSet,
}

impl EntityDescriptor {
    /// Declared entity type name (the type discriminator value).
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Runtime type identity.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Name of the index this type is assigned to.
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Name of the identifier field.
    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Declared identifier kind.
    pub fn id_kind(&self) -> IdKind {
        self.id_kind
    }

    /// Extract the identifier from a live instance.
    pub fn id_of(&self, entity: &(dyn Any + Send + Sync)) -> Result<EntityId> {
        (self.id_accessor)(entity).ok_or_else(|| {
            QuiverError::index(format!(
                "entity instance is not a {} or has no identifier",
                self.type_name
            ))
        })
    }
}

impl fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("type_name", &self.type_name)
            .field("index_name", &self.index_name)
            .field("id_field", &self.id_field)
            .finish_non_exhaustive()
    }
}

fn erase_field<T, F>(f: F) -> FieldAccessor
where
    T: Send + Sync + 'static,
    F: Fn(&T) -> Option<FieldValue> + Send + Sync + 'static,
{
    Arc::new(move |any| any.downcast_ref::<T>().and_then(|t| f(t)))
}

/// Attribute mapping for one nesting level of one concrete type.
///
/// Used both at the root (through [`EntityDescriptorBuilder`]) and inside
/// embedded registrations.
pub struct AttributeMapping<T> {
    prefix: String,
    level: u32,
    max_level: u32,
    open_types: Vec<TypeId>,
    root_type_name: String,
    set: AttributeSet,
    error: Option<QuiverError>,
    _marker: std::marker::PhantomData<fn(&T)>,
}

impl<T: Send + Sync + 'static> AttributeMapping<T> {
    fn new(
        prefix: String,
        level: u32,
        max_level: u32,
        open_types: Vec<TypeId>,
        root_type_name: String,
    ) -> Self {
        AttributeMapping {
            prefix,
            level,
            max_level,
            open_types,
            root_type_name,
            set: AttributeSet::default(),
            error: None,
            _marker: std::marker::PhantomData,
        }
    }

    fn push(
        mut self,
        name: &str,
        store: Store,
        tokenize: TokenizePolicy,
        boost: Option<f32>,
        accessor: FieldAccessor,
    ) -> Self {
        self.set.attributes.push(AttributeDescriptor {
            name: format!("{}{}", self.prefix, name),
            accessor,
            store,
            tokenize,
            boost,
        });
        self
    }

    /// Declare a keyword attribute: stored, untokenized.
    pub fn keyword<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&T) -> Option<FieldValue> + Send + Sync + 'static,
    {
        self.push(
            name,
            Store::Yes,
            TokenizePolicy::Untokenized,
            None,
            erase_field(f),
        )
    }

    /// Declare a text attribute: stored, tokenized.
    pub fn text<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&T) -> Option<FieldValue> + Send + Sync + 'static,
    {
        self.push(
            name,
            Store::Yes,
            TokenizePolicy::Tokenized,
            None,
            erase_field(f),
        )
    }

    /// Declare an unstored attribute: tokenized but not retrievable.
    pub fn unstored<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&T) -> Option<FieldValue> + Send + Sync + 'static,
    {
        self.push(
            name,
            Store::No,
            TokenizePolicy::Tokenized,
            None,
            erase_field(f),
        )
    }

    /// Declare an attribute with explicit store/tokenize policies and an
    /// optional boost.
    pub fn field<F>(
        self,
        name: &str,
        store: Store,
        tokenize: TokenizePolicy,
        boost: Option<f32>,
        f: F,
    ) -> Self
    where
        F: Fn(&T) -> Option<FieldValue> + Send + Sync + 'static,
    {
        self.push(name, store, tokenize, boost, erase_field(f))
    }

    /// Set the boost factor for this nesting level.
    pub fn boost(mut self, boost: f32) -> Self {
        self.set.boost = Some(boost);
        self
    }

    /// Declare an embedded object indexed under `<name>.`.
    ///
    /// `depth` bounds how deep the embedding graph may recurse below this
    /// point; `None` means unlimited. An unlimited-depth embedding that
    /// cycles back through a type already open on the current path is a
    /// configuration error. Registrations beyond the depth bound are
    /// silently ignored.
    pub fn embedded<C, A, B>(mut self, name: &str, depth: Option<u32>, accessor: A, build: B) -> Self
    where
        C: Send + Sync + 'static,
        A: for<'a> Fn(&'a T) -> Option<&'a C> + Send + Sync + 'static,
        B: FnOnce(AttributeMapping<C>) -> AttributeMapping<C>,
    {
        if self.error.is_some() {
            return self;
        }
        let child_type = TypeId::of::<C>();
        let local_prefix = format!("{}{}.", self.prefix, name);

        let new_max = match depth {
            None => self.max_level,
            Some(d) => self.max_level.min(self.level.saturating_add(d)),
        };
        let level = self.level + 1;

        if new_max == u32::MAX && self.open_types.contains(&child_type) {
            self.error = Some(QuiverError::config(format!(
                "circular reference: duplicate use of {} in root entity {}#{}",
                std::any::type_name::<C>(),
                self.root_type_name,
                local_prefix
            )));
            return self;
        }
        if level > new_max {
            tracing::trace!(prefix = %local_prefix, "embedding depth reached, ignoring");
            return self;
        }

        let mut open_types = self.open_types.clone();
        open_types.push(child_type);
        let child = build(AttributeMapping::<C>::new(
            local_prefix,
            level,
            new_max,
            open_types,
            self.root_type_name.clone(),
        ));
        if let Some(e) = child.error {
            self.error = Some(e);
            return self;
        }

        let erased: EmbeddedAccessor = Arc::new(move |any: &(dyn Any + Send + Sync)| {
            any.downcast_ref::<T>()
                .and_then(|t| accessor(t))
                .map(|c| c as &(dyn Any + Send + Sync))
        });
        self.set.embedded.push(EmbeddedDescriptor {
            accessor: erased,
            metadata: child.set,
        });
        self
    }
}

/// Builder for an [`EntityDescriptor`].
///
/// # Examples
///
/// ```
/// use quiver::engine::{EntityDescriptorBuilder, EntityId};
///
/// struct Book {
///     id: i64,
///     title: String,
/// }
///
/// let descriptor = EntityDescriptorBuilder::<Book>::new("Book", "books")
///     .id_i64("id", |b| b.id)
///     .text("title", |b| Some(b.title.as_str().into()))
///     .build()
///     .unwrap();
/// assert_eq!(descriptor.index_name(), "books");
/// ```
pub struct EntityDescriptorBuilder<T> {
    type_name: String,
    index_name: String,
    id: Option<(String, IdKind, IdAccessor, Option<f32>)>,
    boost: Option<f32>,
    mapping: AttributeMapping<T>,
    error: Option<QuiverError>,
}

impl<T: Send + Sync + 'static> EntityDescriptorBuilder<T> {
    /// Start a registration for entity type `type_name`, assigned to
    /// directory `index_name`.
    pub fn new(type_name: impl Into<String>, index_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        EntityDescriptorBuilder {
            mapping: AttributeMapping::new(
                String::new(),
                0,
                u32::MAX,
                vec![TypeId::of::<T>()],
                type_name.clone(),
            ),
            type_name,
            index_name: index_name.into(),
            id: None,
            boost: None,
            error: None,
        }
    }

    fn set_id(&mut self, name: &str, kind: IdKind, accessor: IdAccessor, boost: Option<f32>) {
        if let Some((existing, ..)) = &self.id {
            self.error = Some(QuiverError::config(format!(
                "two identifier declarations for {}: '{}' and '{}'",
                self.type_name, existing, name
            )));
            return;
        }
        self.id = Some((name.to_string(), kind, accessor, boost));
    }

    /// Declare an `i64` identifier attribute.
    pub fn id_i64<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&T) -> i64 + Send + Sync + 'static,
    {
        let accessor: IdAccessor =
            Arc::new(move |any| any.downcast_ref::<T>().map(|t| EntityId::Int(f(t))));
        self.set_id(name, IdKind::Int, accessor, None);
        self
    }

    /// Declare a string identifier attribute.
    pub fn id_text<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        let accessor: IdAccessor =
            Arc::new(move |any| any.downcast_ref::<T>().map(|t| EntityId::Text(f(t))));
        self.set_id(name, IdKind::Text, accessor, None);
        self
    }

    /// Set the entity-level boost factor.
    pub fn boost(mut self, boost: f32) -> Self {
        self.boost = Some(boost);
        self
    }

    /// Declare a keyword attribute: stored, untokenized.
    pub fn keyword<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&T) -> Option<FieldValue> + Send + Sync + 'static,
    {
        self.mapping = self.mapping.keyword(name, f);
        self
    }

    /// Declare a text attribute: stored, tokenized.
    pub fn text<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&T) -> Option<FieldValue> + Send + Sync + 'static,
    {
        self.mapping = self.mapping.text(name, f);
        self
    }

    /// Declare an unstored attribute: tokenized but not retrievable.
    pub fn unstored<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&T) -> Option<FieldValue> + Send + Sync + 'static,
    {
        self.mapping = self.mapping.unstored(name, f);
        self
    }

    /// Declare an attribute with explicit policies.
    pub fn field<F>(
        mut self,
        name: &str,
        store: Store,
        tokenize: TokenizePolicy,
        boost: Option<f32>,
        f: F,
    ) -> Self
    where
        F: Fn(&T) -> Option<FieldValue> + Send + Sync + 'static,
    {
        self.mapping = self.mapping.field(name, store, tokenize, boost, f);
        self
    }

    /// Declare an embedded object (see [`AttributeMapping::embedded`]).
    pub fn embedded<C, A, B>(mut self, name: &str, depth: Option<u32>, accessor: A, build: B) -> Self
    where
        C: Send + Sync + 'static,
        A: for<'a> Fn(&'a T) -> Option<&'a C> + Send + Sync + 'static,
        B: FnOnce(AttributeMapping<C>) -> AttributeMapping<C>,
    {
        self.mapping = self.mapping.embedded(name, depth, accessor, build);
        self
    }

    /// Declare a contained-in back-reference: when an instance of this type
    /// changes, every owner returned by `f` is re-indexed.
    pub fn contained_in<O, F>(mut self, f: F) -> Self
    where
        O: Send + Sync + 'static,
        F: Fn(&T) -> Vec<Arc<O>> + Send + Sync + 'static,
    {
        let erased: ContainedInAccessor = Arc::new(move |any| {
            any.downcast_ref::<T>()
                .map(|t| {
                    f(t).into_iter()
                        .map(|o| {
                            let handle: EntityHandle = o;
                            handle
                        })
                        .collect()
                })
                .unwrap_or_default()
        });
        self.mapping.set.contained_in.push(ContainedInDescriptor {
            owner_type: TypeId::of::<O>(),
            accessor: erased,
        });
        self
    }

    /// Finish the registration.
    ///
    /// Fails when no identifier was declared, when two were declared, or
    /// when an unbounded embedding cycles back through an open type.
    pub fn build(self) -> Result<EntityDescriptor> {
        if let Some(e) = self.error {
            return Err(e);
        }
        if let Some(e) = self.mapping.error {
            return Err(e);
        }
        let (id_field, id_kind, id_accessor, id_boost) = self.id.ok_or_else(|| {
            QuiverError::config(format!("no document id declared for: {}", self.type_name))
        })?;
        Ok(EntityDescriptor {
            type_name: self.type_name,
            type_id: TypeId::of::<T>(),
            index_name: self.index_name,
            id_field,
            id_kind,
            id_accessor,
            id_boost,
            boost: self.boost,
            metadata: self.mapping.set,
        })
    }
}

//! Entity metadata and document construction.
//!
//! Indexed entity types are declared once at startup through
//! [`EntityDescriptorBuilder`] and are immutable afterwards. The
//! [`DocumentBuilder`] owns the field-extraction metadata and the directory
//! assignment for one entity type and converts live instances into
//! index-ready documents.

pub mod bridge;
pub mod descriptor;
pub mod document_builder;

pub use bridge::{EntityId, IdKind};
pub use descriptor::{AttributeMapping, EntityDescriptor, EntityDescriptorBuilder, EntityHandle};
pub use document_builder::{DocumentBuilder, DocumentBuilderRegistry};

/// Hidden field holding the exact entity type name; stored, untokenized.
/// Used to disambiguate identifier collisions across types sharing one
/// directory and to resolve hits back to live entities.
pub const CLASS_FIELD_NAME: &str = "_quiver_class";

//! Indexing backend: work queuing, transactional synchronization, and the
//! directory worker/workspace subsystem.
//!
//! A domain mutation becomes a [`WorkItem`]; items are buffered per
//! transaction by the [`TransactionalWorker`], expanded into [`IndexWork`]
//! entries by the [`BatchedQueueingProcessor`] on flush, and applied (or
//! forwarded) by a [`BackendQueueProcessorFactory`] strategy.

pub mod local;
pub mod queueing;
pub mod remote;
pub mod transactional;
pub mod workspace;

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

pub use local::{IndexWorker, LocalBackendQueueProcessorFactory};
pub use queueing::BatchedQueueingProcessor;
pub use remote::{ChannelMessageSender, MessageSender, RemoteBackendQueueProcessorFactory, WorkListener};
pub use transactional::{
    CompletionStatus, Synchronization, TransactionContext, TransactionalWorker, Worker,
};
pub use workspace::{LockTable, Workspace};

use crate::document::Document;
use crate::engine::{EntityHandle, EntityId};
use crate::error::Result;

/// The kind of index mutation requested for one entity instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkKind {
    /// Index a newly persisted entity.
    Add,
    /// Re-index a changed entity (expands to delete-then-add).
    Update,
    /// Remove a deleted entity from the index.
    Delete,
}

/// A pending, not-yet-expanded index mutation request.
#[derive(Clone)]
pub struct WorkItem {
    /// The live entity instance the mutation was observed on.
    pub entity: EntityHandle,
    /// Its identifier.
    pub id: EntityId,
    /// Requested operation.
    pub kind: WorkKind,
}

impl Debug for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkItem")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// A fully expanded, directly appliable index mutation.
///
/// Serializable so a work list can be forwarded to a remote processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IndexWork {
    /// Append the serialized document for one entity instance.
    Add {
        /// Entity type discriminator.
        type_name: String,
        /// Entity identifier.
        id: EntityId,
        /// The document derived from the instance.
        document: Document,
    },
    /// Remove the documents matching the identifier term for this type.
    Delete {
        /// Entity type discriminator.
        type_name: String,
        /// Entity identifier.
        id: EntityId,
    },
}

impl IndexWork {
    /// Entity type discriminator.
    pub fn type_name(&self) -> &str {
        match self {
            IndexWork::Add { type_name, .. } | IndexWork::Delete { type_name, .. } => type_name,
        }
    }

    /// Entity identifier.
    pub fn id(&self) -> &EntityId {
        match self {
            IndexWork::Add { id, .. } | IndexWork::Delete { id, .. } => id,
        }
    }

    /// Whether this is an add operation.
    pub fn is_add(&self) -> bool {
        matches!(self, IndexWork::Add { .. })
    }
}

/// One runnable backend batch. Errors surface to whoever executes the job:
/// the flushing caller in sync mode, the worker pool in async mode.
pub type BackendJob = Box<dyn FnOnce() -> Result<()> + Send>;

/// Pluggable execution strategy for expanded work lists.
pub trait BackendQueueProcessorFactory: Send + Sync + Debug {
    /// Wrap a work list into a runnable batch.
    fn processor(&self, queue: Vec<IndexWork>) -> BackendJob;
}

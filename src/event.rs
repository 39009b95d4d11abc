//! Lifecycle event bridge.
//!
//! The host mapping layer calls these hooks from its post-insert,
//! post-update and post-delete events. Instances whose type was never
//! registered for indexing are ignored, so the listener can be wired
//! globally.

use std::sync::Arc;

use crate::backend::{TransactionContext, TransactionalWorker, WorkItem, WorkKind, Worker};
use crate::engine::{DocumentBuilderRegistry, EntityHandle};
use crate::error::Result;
use crate::factory::SearchFactory;

/// Routes entity lifecycle events into the transactional worker.
#[derive(Debug)]
pub struct IndexingEventListener {
    worker: Arc<TransactionalWorker>,
    registry: Arc<DocumentBuilderRegistry>,
}

impl IndexingEventListener {
    /// Create a listener over a factory's worker.
    pub fn new(factory: &SearchFactory) -> Self {
        IndexingEventListener {
            worker: factory.worker().clone(),
            registry: factory.registry().clone(),
        }
    }

    /// A new entity instance was persisted.
    pub fn on_post_insert(
        &self,
        entity: EntityHandle,
        transaction: &dyn TransactionContext,
    ) -> Result<()> {
        self.process(entity, transaction, WorkKind::Add)
    }

    /// An entity instance was modified.
    pub fn on_post_update(
        &self,
        entity: EntityHandle,
        transaction: &dyn TransactionContext,
    ) -> Result<()> {
        self.process(entity, transaction, WorkKind::Update)
    }

    /// An entity instance was removed.
    pub fn on_post_delete(
        &self,
        entity: EntityHandle,
        transaction: &dyn TransactionContext,
    ) -> Result<()> {
        self.process(entity, transaction, WorkKind::Delete)
    }

    fn process(
        &self,
        entity: EntityHandle,
        transaction: &dyn TransactionContext,
        kind: WorkKind,
    ) -> Result<()> {
        let Some(builder) = self.registry.get(entity.as_ref().type_id()) else {
            // not an indexed type
            return Ok(());
        };
        let id = builder.descriptor().id_of(entity.as_ref())?;
        self.worker.perform_work(WorkItem { entity, id, kind }, transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Synchronization;
    use crate::config::Settings;
    use crate::engine::EntityDescriptorBuilder;
    use crate::query::TermQuery;

    struct Book {
        id: i64,
        title: String,
    }

    struct Invoice;

    /// Context with no transaction in progress: work flushes immediately.
    struct NoTransaction;

    impl TransactionContext for NoTransaction {
        fn is_transaction_in_progress(&self) -> bool {
            false
        }

        fn transaction_id(&self) -> u64 {
            0
        }

        fn register_synchronization(&self, _synchronization: Arc<dyn Synchronization>) {
            unreachable!("no transaction to register with");
        }
    }

    fn factory() -> SearchFactory {
        let descriptor = EntityDescriptorBuilder::<Book>::new("Book", "books")
            .id_i64("id", |b| b.id)
            .text("title", |b| Some(b.title.as_str().into()))
            .build()
            .unwrap();
        SearchFactory::builder()
            .settings(Settings::new().with("quiver.default.directory_provider", "ram"))
            .register(descriptor)
            .build()
            .unwrap()
    }

    #[test]
    fn test_post_insert_makes_the_entity_searchable() {
        let factory = factory();
        let listener = IndexingEventListener::new(&factory);
        listener
            .on_post_insert(
                Arc::new(Book {
                    id: 1,
                    title: "Hibernate in Action".into(),
                }),
                &NoTransaction,
            )
            .unwrap();

        let query = factory.create_query(TermQuery::new("title", "action"));
        assert_eq!(query.result_size().unwrap(), 1);
    }

    #[test]
    fn test_unregistered_type_is_ignored() {
        let factory = factory();
        let listener = IndexingEventListener::new(&factory);
        listener
            .on_post_insert(Arc::new(Invoice), &NoTransaction)
            .unwrap();

        let query = factory.create_query(TermQuery::new("title", "action"));
        assert_eq!(query.result_size().unwrap(), 0);
    }

    #[test]
    fn test_post_delete_removes_the_entity() {
        let factory = factory();
        let listener = IndexingEventListener::new(&factory);
        let book = Arc::new(Book {
            id: 1,
            title: "Hibernate in Action".into(),
        });
        listener.on_post_insert(book.clone(), &NoTransaction).unwrap();
        listener.on_post_delete(book, &NoTransaction).unwrap();

        let query = factory.create_query(TermQuery::new("title", "action"));
        assert_eq!(query.result_size().unwrap(), 0);
    }
}

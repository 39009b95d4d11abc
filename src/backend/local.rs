//! Local backend: applies expanded work lists to the index directories.

use std::sync::Arc;

use tracing::{error, trace};

use crate::backend::{BackendJob, BackendQueueProcessorFactory, IndexWork, LockTable, Workspace};
use crate::engine::{CLASS_FIELD_NAME, DocumentBuilderRegistry, EntityId};
use crate::error::Result;

/// Backend strategy that runs an [`IndexWorker`] over the local directories.
#[derive(Debug)]
pub struct LocalBackendQueueProcessorFactory {
    registry: Arc<DocumentBuilderRegistry>,
    locks: Arc<LockTable>,
}

impl LocalBackendQueueProcessorFactory {
    /// Create the local strategy over a factory's registry and lock table.
    pub fn new(registry: Arc<DocumentBuilderRegistry>, locks: Arc<LockTable>) -> Self {
        LocalBackendQueueProcessorFactory { registry, locks }
    }
}

impl BackendQueueProcessorFactory for LocalBackendQueueProcessorFactory {
    fn processor(&self, queue: Vec<IndexWork>) -> BackendJob {
        let worker = IndexWorker::new(self.registry.clone(), self.locks.clone());
        Box::new(move || worker.run(queue))
    }
}

/// Applies one expanded work list against the directories, inside a fresh
/// [`Workspace`].
///
/// The list is sorted before execution so that every worker, on every
/// thread, acquires directory locks in the same global order. The sort key
/// groups works by their builder's stable hash, deletes before adds; two
/// batches touching the same directories therefore can never hold a lock
/// each while waiting on the other's.
#[derive(Debug)]
pub struct IndexWorker {
    registry: Arc<DocumentBuilderRegistry>,
    locks: Arc<LockTable>,
}

impl IndexWorker {
    /// Create a worker over a factory's registry and lock table.
    pub fn new(registry: Arc<DocumentBuilderRegistry>, locks: Arc<LockTable>) -> Self {
        IndexWorker { registry, locks }
    }

    /// Apply a work list, releasing every handle and lock afterwards even on
    /// failure.
    pub fn run(&self, mut queue: Vec<IndexWork>) -> Result<()> {
        self.sort_queue(&mut queue);
        let mut workspace = Workspace::new(self.registry.clone(), self.locks.clone());
        let outcome = self.apply(&mut workspace, &queue);
        match outcome {
            Ok(()) => workspace.clean(),
            Err(e) => {
                if let Err(cleanup) = workspace.clean() {
                    error!(error = %cleanup, "subsequent error while cleaning workspace");
                }
                Err(e)
            }
        }
    }

    fn sort_queue(&self, queue: &mut [IndexWork]) {
        queue.sort_by_key(|work| {
            match self.registry.get_by_name(work.type_name()) {
                Some(builder) => (builder.stable_hash() as u64) * 2 + work.is_add() as u64,
                // unknown types sort last and fail during application
                None => u64::MAX,
            }
        });
    }

    fn apply(&self, workspace: &mut Workspace, queue: &[IndexWork]) -> Result<()> {
        for work in queue {
            match work {
                IndexWork::Add {
                    type_name,
                    id,
                    document,
                } => {
                    trace!(%type_name, %id, "adding to index");
                    let writer = workspace.writer(type_name)?;
                    writer.add_document(document)?;
                }
                IndexWork::Delete { type_name, id } => {
                    self.remove(workspace, type_name, id)?;
                }
            }
        }
        Ok(())
    }

    /// Delete every document carrying the identifier term, restricted to the
    /// requested type: directories are shared between types, and the same
    /// identifier value may belong to instances of several of them.
    fn remove(&self, workspace: &mut Workspace, type_name: &str, id: &EntityId) -> Result<()> {
        trace!(type_name, %id, "removing from index");
        let builder = workspace.document_builder(type_name)?;
        let term = builder.id_term(id);
        let reader = workspace.reader(type_name)?;
        for idx in reader.term_docs(&term) {
            let matches_type =
                reader.document(idx)?.stored_value(CLASS_FIELD_NAME) == Some(type_name);
            if matches_type {
                reader.delete_document(idx)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalyzerRef, StandardAnalyzer};
    use crate::document::Document;
    use crate::engine::{DocumentBuilder, EntityDescriptorBuilder};
    use crate::index::IndexReader;
    use crate::store::{DirectoryProvider, RamDirectoryProvider};

    struct Book {
        id: i64,
        title: String,
    }

    struct Email {
        id: i64,
        subject: String,
    }

    struct Fixture {
        registry: Arc<DocumentBuilderRegistry>,
        locks: Arc<LockTable>,
        directory: Arc<dyn DirectoryProvider>,
    }

    fn fixture() -> Fixture {
        let analyzer: AnalyzerRef = Arc::new(StandardAnalyzer::new());
        let directory: Arc<dyn DirectoryProvider> =
            Arc::new(RamDirectoryProvider::new("shared").unwrap());

        let book = EntityDescriptorBuilder::<Book>::new("Book", "shared")
            .id_i64("id", |b| b.id)
            .text("title", |b| Some(b.title.as_str().into()))
            .build()
            .unwrap();
        let email = EntityDescriptorBuilder::<Email>::new("Email", "shared")
            .id_i64("id", |e| e.id)
            .text("subject", |e| Some(e.subject.as_str().into()))
            .build()
            .unwrap();

        let mut registry = DocumentBuilderRegistry::new();
        registry.insert(Arc::new(DocumentBuilder::new(
            book,
            analyzer.clone(),
            directory.clone(),
        )));
        registry.insert(Arc::new(DocumentBuilder::new(
            email,
            analyzer,
            directory.clone(),
        )));

        let mut locks = LockTable::new();
        locks.register(directory.location());
        Fixture {
            registry: Arc::new(registry),
            locks: Arc::new(locks),
            directory,
        }
    }

    fn add_work(fixture: &Fixture, type_name: &str, id: i64) -> IndexWork {
        let builder = fixture.registry.get_by_name(type_name).unwrap();
        let document: Document = match type_name {
            "Book" => builder
                .document(
                    &Book {
                        id,
                        title: "Hibernate in Action".into(),
                    },
                    &EntityId::Int(id),
                )
                .unwrap(),
            _ => builder
                .document(
                    &Email {
                        id,
                        subject: "Hibernate in Action".into(),
                    },
                    &EntityId::Int(id),
                )
                .unwrap(),
        };
        IndexWork::Add {
            type_name: type_name.to_string(),
            id: EntityId::Int(id),
            document,
        }
    }

    fn delete_work(type_name: &str, id: i64) -> IndexWork {
        IndexWork::Delete {
            type_name: type_name.to_string(),
            id: EntityId::Int(id),
        }
    }

    #[test]
    fn test_add_then_delete_round_trip() {
        let fixture = fixture();
        let worker = IndexWorker::new(fixture.registry.clone(), fixture.locks.clone());

        worker.run(vec![add_work(&fixture, "Book", 1)]).unwrap();
        assert_eq!(
            IndexReader::open(fixture.directory.clone())
                .unwrap()
                .num_live_docs(),
            1
        );

        worker.run(vec![delete_work("Book", 1)]).unwrap();
        assert_eq!(
            IndexReader::open(fixture.directory.clone())
                .unwrap()
                .num_live_docs(),
            0
        );
    }

    #[test]
    fn test_delete_is_scoped_to_the_entity_type() {
        let fixture = fixture();
        let worker = IndexWorker::new(fixture.registry.clone(), fixture.locks.clone());

        // same identifier value, same directory, two types
        worker
            .run(vec![
                add_work(&fixture, "Book", 1),
                add_work(&fixture, "Email", 1),
            ])
            .unwrap();
        worker.run(vec![delete_work("Book", 1)]).unwrap();

        let reader = IndexReader::open(fixture.directory.clone()).unwrap();
        assert_eq!(reader.num_live_docs(), 1);
        let remaining = reader.term_docs(&crate::index::Term::new("id", "1"));
        assert_eq!(remaining.len(), 1);
        assert_eq!(
            reader
                .document(remaining[0])
                .unwrap()
                .stored_value(CLASS_FIELD_NAME),
            Some("Email")
        );
    }

    #[test]
    fn test_deletes_apply_before_adds_per_type() {
        let fixture = fixture();
        let worker = IndexWorker::new(fixture.registry.clone(), fixture.locks.clone());

        worker.run(vec![add_work(&fixture, "Book", 1)]).unwrap();
        // an update arrives as [delete, add]; even submitted reversed, the
        // sort re-establishes delete-then-add and exactly one document stays
        worker
            .run(vec![add_work(&fixture, "Book", 1), delete_work("Book", 1)])
            .unwrap();

        assert_eq!(
            IndexReader::open(fixture.directory.clone())
                .unwrap()
                .num_live_docs(),
            1
        );
    }

    #[test]
    fn test_delete_of_absent_document_is_noop() {
        let fixture = fixture();
        let worker = IndexWorker::new(fixture.registry.clone(), fixture.locks.clone());
        worker.run(vec![delete_work("Book", 99)]).unwrap();
        assert_eq!(
            IndexReader::open(fixture.directory).unwrap().num_live_docs(),
            0
        );
    }
}

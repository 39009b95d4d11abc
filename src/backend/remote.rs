//! Remote backend: serialize expanded work lists and forward them to a
//! processor running elsewhere, typically next to a master copy of the
//! index. The receiving side decodes the payload and applies it through the
//! regular local worker.

use std::fmt::Debug;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::debug;

use crate::backend::local::IndexWorker;
use crate::backend::{BackendJob, BackendQueueProcessorFactory, IndexWork, LockTable};
use crate::engine::DocumentBuilderRegistry;
use crate::error::Result;

/// Transport for forwarded work list payloads. Implementations live outside
/// this crate and surface their own error types through [`anyhow`].
pub trait MessageSender: Send + Sync + Debug {
    /// Deliver one encoded work list.
    fn send(&self, payload: Vec<u8>) -> anyhow::Result<()>;
}

/// Backend strategy that encodes the work list and hands it to a
/// [`MessageSender`] instead of touching the local directories.
#[derive(Debug)]
pub struct RemoteBackendQueueProcessorFactory {
    sender: Arc<dyn MessageSender>,
}

impl RemoteBackendQueueProcessorFactory {
    /// Create the remote strategy over a transport.
    pub fn new(sender: Arc<dyn MessageSender>) -> Self {
        RemoteBackendQueueProcessorFactory { sender }
    }
}

impl BackendQueueProcessorFactory for RemoteBackendQueueProcessorFactory {
    fn processor(&self, queue: Vec<IndexWork>) -> BackendJob {
        let sender = self.sender.clone();
        Box::new(move || {
            let payload = bincode::serialize(&queue)?;
            debug!(works = queue.len(), bytes = payload.len(), "forwarding work list");
            sender.send(payload)?;
            Ok(())
        })
    }
}

/// Receiving side of the remote backend: decodes forwarded payloads and
/// applies them to the directories it owns.
#[derive(Debug)]
pub struct WorkListener {
    worker: IndexWorker,
}

impl WorkListener {
    /// Create a listener applying to the given registry's directories.
    pub fn new(registry: Arc<DocumentBuilderRegistry>, locks: Arc<LockTable>) -> Self {
        WorkListener {
            worker: IndexWorker::new(registry, locks),
        }
    }

    /// Decode and apply one forwarded work list.
    pub fn on_message(&self, payload: &[u8]) -> Result<()> {
        let queue: Vec<IndexWork> = bincode::deserialize(payload)?;
        debug!(works = queue.len(), "applying forwarded work list");
        self.worker.run(queue)
    }
}

/// In-process [`MessageSender`] over an unbounded channel, for wiring a
/// listener living in the same process.
#[derive(Debug, Clone)]
pub struct ChannelMessageSender {
    sender: Sender<Vec<u8>>,
}

impl ChannelMessageSender {
    /// Create a sender and the receiver to drain on the listener side.
    pub fn new() -> (Self, Receiver<Vec<u8>>) {
        let (sender, receiver) = unbounded();
        (ChannelMessageSender { sender }, receiver)
    }
}

impl MessageSender for ChannelMessageSender {
    fn send(&self, payload: Vec<u8>) -> anyhow::Result<()> {
        self.sender
            .send(payload)
            .map_err(|_| anyhow::anyhow!("work listener channel is disconnected"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalyzerRef, StandardAnalyzer};
    use crate::engine::{DocumentBuilder, EntityDescriptorBuilder, EntityId};
    use crate::error::QuiverError;
    use crate::index::IndexReader;
    use crate::store::{DirectoryProvider, RamDirectoryProvider};

    struct Book {
        id: i64,
        title: String,
    }

    fn registry_over(directory: Arc<dyn DirectoryProvider>) -> Arc<DocumentBuilderRegistry> {
        let analyzer: AnalyzerRef = Arc::new(StandardAnalyzer::new());
        let descriptor = EntityDescriptorBuilder::<Book>::new("Book", "books")
            .id_i64("id", |b| b.id)
            .text("title", |b| Some(b.title.as_str().into()))
            .build()
            .unwrap();
        let mut registry = DocumentBuilderRegistry::new();
        registry.insert(Arc::new(DocumentBuilder::new(descriptor, analyzer, directory)));
        Arc::new(registry)
    }

    #[test]
    fn test_forwarded_work_list_is_applied_by_the_listener() {
        let directory: Arc<dyn DirectoryProvider> =
            Arc::new(RamDirectoryProvider::new("books").unwrap());
        let registry = registry_over(directory.clone());
        let mut locks = LockTable::new();
        locks.register(directory.location());
        let locks = Arc::new(locks);

        let (sender, receiver) = ChannelMessageSender::new();
        let factory = RemoteBackendQueueProcessorFactory::new(Arc::new(sender));

        let builder = registry.get_by_name("Book").unwrap();
        let document = builder
            .document(
                &Book {
                    id: 1,
                    title: "Hibernate in Action".into(),
                },
                &EntityId::Int(1),
            )
            .unwrap();
        let job = factory.processor(vec![IndexWork::Add {
            type_name: "Book".into(),
            id: EntityId::Int(1),
            document,
        }]);
        job().unwrap();

        let listener = WorkListener::new(registry, locks);
        let payload = receiver.try_recv().unwrap();
        listener.on_message(&payload).unwrap();

        assert_eq!(IndexReader::open(directory).unwrap().num_live_docs(), 1);
    }

    #[test]
    fn test_disconnected_listener_surfaces_the_transport_error() {
        let (sender, receiver) = ChannelMessageSender::new();
        drop(receiver);
        let factory = RemoteBackendQueueProcessorFactory::new(Arc::new(sender));
        let job = factory.processor(Vec::new());
        match job() {
            Err(QuiverError::Anyhow(e)) => {
                assert!(e.to_string().contains("disconnected"));
            }
            other => panic!("expected a transport error, got {other:?}"),
        }
    }

    #[test]
    fn test_garbage_payload_is_rejected() {
        let directory: Arc<dyn DirectoryProvider> =
            Arc::new(RamDirectoryProvider::new("books").unwrap());
        let registry = registry_over(directory.clone());
        let mut locks = LockTable::new();
        locks.register(directory.location());
        let listener = WorkListener::new(registry, Arc::new(locks));
        assert!(listener.on_message(&[0xde, 0xad, 0xbe, 0xef]).is_err());
    }
}

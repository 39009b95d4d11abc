//! Search factory: the one-stop assembly of the indexing engine.
//!
//! A [`SearchFactory`] is built once at startup from the property settings
//! and the entity registrations, and owns everything with a lifecycle: the
//! directory providers, the per-directory lock table, the queueing processor
//! (and its worker pool in async mode) and the transactional worker. It is
//! immutable and shareable once built.

use std::sync::Arc;

use tracing::info;

use crate::analysis::{AnalyzerRef, StandardAnalyzer};
use crate::backend::{
    BackendQueueProcessorFactory, BatchedQueueingProcessor, LocalBackendQueueProcessorFactory,
    LockTable, MessageSender, RemoteBackendQueueProcessorFactory, TransactionalWorker,
};
use crate::config::{BackendKind, Settings, WorkerConfig};
use crate::engine::{DocumentBuilder, DocumentBuilderRegistry, EntityDescriptor};
use crate::error::{QuiverError, Result};
use crate::query::{FullTextQuery, TermQuery};
use crate::store::{DirectoryProvider, DirectoryProviderFactory};

/// Builder for a [`SearchFactory`].
///
/// # Examples
///
/// ```
/// use quiver::config::Settings;
/// use quiver::engine::EntityDescriptorBuilder;
/// use quiver::factory::SearchFactory;
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
///
/// let factory = SearchFactory::builder()
///     .settings(Settings::new().with("quiver.default.directory_provider", "ram"))
///     .register(descriptor)
///     .build()
///     .unwrap();
/// assert_eq!(factory.directory_providers().len(), 1);
/// ```
pub struct SearchFactoryBuilder {
    settings: Settings,
    analyzer: AnalyzerRef,
    descriptors: Vec<EntityDescriptor>,
    message_sender: Option<Arc<dyn MessageSender>>,
}

impl SearchFactoryBuilder {
    fn new() -> Self {
        SearchFactoryBuilder {
            settings: Settings::new(),
            analyzer: Arc::new(StandardAnalyzer::new()),
            descriptors: Vec::new(),
            message_sender: None,
        }
    }

    /// Use the given property settings.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Use the given analyzer for every index. Defaults to
    /// [`StandardAnalyzer`].
    pub fn analyzer(mut self, analyzer: AnalyzerRef) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Register one indexed entity type.
    pub fn register(mut self, descriptor: EntityDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Transport used when the worker backend is `remote`.
    pub fn message_sender(mut self, sender: Arc<dyn MessageSender>) -> Self {
        self.message_sender = Some(sender);
        self
    }

    /// Assemble the factory: resolve the worker configuration, create (and
    /// share) the directory providers, and wire the backend.
    pub fn build(self) -> Result<SearchFactory> {
        let worker_config = WorkerConfig::from_settings(&self.settings)?;

        let mut provider_factory = DirectoryProviderFactory::new();
        let mut registry = DocumentBuilderRegistry::new();
        let mut locks = LockTable::new();
        for descriptor in self.descriptors {
            let provider = provider_factory.create(descriptor.index_name(), &self.settings)?;
            locks.register(provider.location());
            registry.insert(Arc::new(DocumentBuilder::new(
                descriptor,
                self.analyzer.clone(),
                provider,
            )));
        }
        let registry = Arc::new(registry);
        let locks = Arc::new(locks);

        let backend: Arc<dyn BackendQueueProcessorFactory> = match worker_config.backend {
            BackendKind::Local => Arc::new(LocalBackendQueueProcessorFactory::new(
                registry.clone(),
                locks.clone(),
            )),
            BackendKind::Remote => {
                let sender = self.message_sender.ok_or_else(|| {
                    QuiverError::config("remote worker backend configured without a message sender")
                })?;
                Arc::new(RemoteBackendQueueProcessorFactory::new(sender))
            }
        };

        let processor = Arc::new(BatchedQueueingProcessor::new(
            registry.clone(),
            backend,
            &worker_config,
        )?);
        let worker = Arc::new(TransactionalWorker::new(processor));

        info!(
            types = registry.len(),
            directories = provider_factory.providers().len(),
            execution = ?worker_config.execution,
            backend = ?worker_config.backend,
            "search factory built"
        );
        Ok(SearchFactory {
            settings: self.settings,
            analyzer: self.analyzer,
            registry,
            locks,
            providers: provider_factory.providers().to_vec(),
            worker,
        })
    }
}

/// The assembled indexing engine.
pub struct SearchFactory {
    settings: Settings,
    analyzer: AnalyzerRef,
    registry: Arc<DocumentBuilderRegistry>,
    locks: Arc<LockTable>,
    providers: Vec<Arc<dyn DirectoryProvider>>,
    worker: Arc<TransactionalWorker>,
}

impl SearchFactory {
    /// Start building a factory.
    pub fn builder() -> SearchFactoryBuilder {
        SearchFactoryBuilder::new()
    }

    /// The effective property settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The analyzer shared by every index.
    pub fn analyzer(&self) -> &AnalyzerRef {
        &self.analyzer
    }

    /// The registered document builders.
    pub fn registry(&self) -> &Arc<DocumentBuilderRegistry> {
        &self.registry
    }

    /// The per-directory lock table.
    pub fn lock_table(&self) -> &Arc<LockTable> {
        &self.locks
    }

    /// The distinct directory providers, in registration order.
    pub fn directory_providers(&self) -> &[Arc<dyn DirectoryProvider>] {
        &self.providers
    }

    /// The transactional worker mutation observers should go through.
    pub fn worker(&self) -> &Arc<TransactionalWorker> {
        &self.worker
    }

    /// Create a full-text query over every registered type.
    pub fn create_query(&self, query: TermQuery) -> FullTextQuery<'_> {
        FullTextQuery::new(self, query)
    }

    /// Parse `field:text` into a query, running the text through this
    /// factory's analyzer.
    pub fn parse_query(&self, input: &str) -> Result<TermQuery> {
        TermQuery::parse(input, self.analyzer.as_ref())
    }
}

impl std::fmt::Debug for SearchFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchFactory")
            .field("types", &self.registry.len())
            .field("directories", &self.providers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EntityDescriptorBuilder;

    struct Book {
        id: i64,
        title: String,
    }

    struct Email {
        id: i64,
        subject: String,
    }

    fn book_descriptor(index: &str) -> EntityDescriptor {
        EntityDescriptorBuilder::<Book>::new("Book", index)
            .id_i64("id", |b| b.id)
            .text("title", |b| Some(b.title.as_str().into()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_types_sharing_an_index_share_a_provider() {
        let email = EntityDescriptorBuilder::<Email>::new("Email", "shared")
            .id_i64("id", |e| e.id)
            .text("subject", |e| Some(e.subject.as_str().into()))
            .build()
            .unwrap();
        let factory = SearchFactory::builder()
            .settings(Settings::new().with("quiver.default.directory_provider", "ram"))
            .register(book_descriptor("shared"))
            .register(email)
            .build()
            .unwrap();
        assert_eq!(factory.registry().len(), 2);
        assert_eq!(factory.directory_providers().len(), 1);
        assert_eq!(factory.lock_table().len(), 1);
    }

    #[test]
    fn test_remote_backend_requires_a_sender() {
        let settings = Settings::new()
            .with("quiver.default.directory_provider", "ram")
            .with(crate::config::WORKER_BACKEND, "remote");
        let result = SearchFactory::builder()
            .settings(settings)
            .register(book_descriptor("books"))
            .build();
        assert!(matches!(result, Err(QuiverError::Config(_))));
    }

    #[test]
    fn test_fs_provider_without_base_fails_at_build() {
        let result = SearchFactory::builder()
            .register(book_descriptor("books"))
            .build();
        assert!(result.is_err());
    }
}

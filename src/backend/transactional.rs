//! Transaction-scoped work buffering.
//!
//! Index mutations observed during a transaction must not touch the index
//! until the transaction's outcome is known. The [`TransactionalWorker`]
//! buffers work per transaction and registers a [`Synchronization`] with the
//! host's transaction; on commit the buffered queue is flushed through the
//! queueing processor, on rollback it is discarded. Outside a transaction
//! the work is flushed immediately.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ahash::AHashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::backend::{BatchedQueueingProcessor, WorkItem};
use crate::error::Result;

/// Outcome of a completed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    /// The transaction committed; buffered work must be applied.
    Committed,
    /// The transaction rolled back; buffered work must be discarded.
    RolledBack,
}

/// A callback invoked by the host once its transaction completes.
pub trait Synchronization: Send + Sync {
    /// React to the transaction outcome.
    fn after_completion(&self, status: CompletionStatus) -> Result<()>;
}

/// The host's view of the current transaction, as seen at the point a
/// mutation is observed.
pub trait TransactionContext {
    /// Whether a transaction is in progress on the calling session.
    fn is_transaction_in_progress(&self) -> bool;

    /// Identifier of the in-progress transaction. Only meaningful when
    /// [`is_transaction_in_progress`](Self::is_transaction_in_progress)
    /// returns `true`.
    fn transaction_id(&self) -> u64;

    /// Register a completion callback with the in-progress transaction.
    fn register_synchronization(&self, synchronization: Arc<dyn Synchronization>);
}

/// Entry point for index mutations observed on the domain model.
pub trait Worker: Send + Sync {
    /// Queue one unit of work in the scope of the given transaction.
    fn perform_work(&self, work: WorkItem, transaction: &dyn TransactionContext) -> Result<()>;
}

type QueueMap = Mutex<AHashMap<u64, Arc<PostTransactionWorkQueue>>>;

/// [`Worker`] that defers index mutations to transaction completion.
pub struct TransactionalWorker {
    processor: Arc<BatchedQueueingProcessor>,
    per_transaction: Arc<QueueMap>,
}

impl TransactionalWorker {
    /// Create a worker flushing through the given processor.
    pub fn new(processor: Arc<BatchedQueueingProcessor>) -> Self {
        TransactionalWorker {
            processor,
            per_transaction: Arc::new(Mutex::new(AHashMap::new())),
        }
    }

    /// Number of transactions currently holding a buffered queue.
    pub fn pending_transactions(&self) -> usize {
        self.per_transaction.lock().len()
    }
}

impl Worker for TransactionalWorker {
    fn perform_work(&self, work: WorkItem, transaction: &dyn TransactionContext) -> Result<()> {
        if !transaction.is_transaction_in_progress() {
            // no transaction boundary to wait for
            let mut queue = Vec::with_capacity(1);
            self.processor.add(work, &mut queue);
            return self.processor.perform_works(queue);
        }

        let id = transaction.transaction_id();
        let registered = {
            let mut map = self.per_transaction.lock();
            match map.get(&id) {
                Some(existing) if !existing.is_consumed() => {
                    existing.push(work, &self.processor);
                    None
                }
                _ => {
                    // first work of the transaction, or the previous queue
                    // was already consumed by an earlier completion
                    let queue = Arc::new(PostTransactionWorkQueue::new(
                        id,
                        self.processor.clone(),
                        self.per_transaction.clone(),
                    ));
                    queue.push(work, &self.processor);
                    map.insert(id, queue.clone());
                    Some(queue)
                }
            }
        };
        if let Some(queue) = registered {
            transaction.register_synchronization(queue);
        }
        Ok(())
    }
}

impl std::fmt::Debug for TransactionalWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionalWorker")
            .field("pending_transactions", &self.pending_transactions())
            .finish_non_exhaustive()
    }
}

/// The per-transaction buffered queue, registered as its completion
/// callback.
struct PostTransactionWorkQueue {
    transaction_id: u64,
    processor: Arc<BatchedQueueingProcessor>,
    per_transaction: Arc<QueueMap>,
    queue: Mutex<Vec<WorkItem>>,
    consumed: AtomicBool,
}

impl PostTransactionWorkQueue {
    fn new(
        transaction_id: u64,
        processor: Arc<BatchedQueueingProcessor>,
        per_transaction: Arc<QueueMap>,
    ) -> Self {
        PostTransactionWorkQueue {
            transaction_id,
            processor,
            per_transaction,
            queue: Mutex::new(Vec::new()),
            consumed: AtomicBool::new(false),
        }
    }

    fn push(&self, work: WorkItem, processor: &BatchedQueueingProcessor) {
        processor.add(work, &mut self.queue.lock());
    }

    fn is_consumed(&self) -> bool {
        self.consumed.load(Ordering::Acquire)
    }
}

impl Synchronization for PostTransactionWorkQueue {
    fn after_completion(&self, status: CompletionStatus) -> Result<()> {
        self.consumed.store(true, Ordering::Release);
        self.per_transaction.lock().remove(&self.transaction_id);
        let queue = std::mem::take(&mut *self.queue.lock());
        debug!(
            transaction = self.transaction_id,
            items = queue.len(),
            ?status,
            "transaction completed"
        );
        match status {
            CompletionStatus::Committed => self.processor.perform_works(queue),
            CompletionStatus::RolledBack => {
                self.processor.cancel_works(queue);
                Ok(())
            }
        }
    }
}

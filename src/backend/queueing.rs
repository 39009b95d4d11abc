//! Batched work queue processing.
//!
//! Buffered [`WorkItem`]s are expanded into a [`IndexWork`] list through the
//! document builders, then handed to the backend strategy either inline
//! (synchronous execution) or through a bounded worker pool (asynchronous
//! execution). When the pool's queue is full the submitting thread runs the
//! batch itself, which applies natural backpressure instead of dropping work.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, unbounded};
use tracing::{debug, error, trace};

use crate::backend::{BackendJob, BackendQueueProcessorFactory, IndexWork, WorkItem};
use crate::config::{ExecutionMode, WorkerConfig};
use crate::engine::DocumentBuilderRegistry;
use crate::error::{QuiverError, Result};

/// Expands buffered work items and dispatches the resulting batches.
pub struct BatchedQueueingProcessor {
    registry: Arc<DocumentBuilderRegistry>,
    backend: Arc<dyn BackendQueueProcessorFactory>,
    mode: ExecutionMode,
    pool: Option<WorkerPool>,
}

impl BatchedQueueingProcessor {
    /// Create a processor; asynchronous execution spins up its worker pool.
    pub fn new(
        registry: Arc<DocumentBuilderRegistry>,
        backend: Arc<dyn BackendQueueProcessorFactory>,
        config: &WorkerConfig,
    ) -> Result<Self> {
        let pool = match config.execution {
            ExecutionMode::Sync => None,
            ExecutionMode::Async => Some(WorkerPool::new(
                config.thread_pool_size,
                config.buffer_queue_max,
            )?),
        };
        Ok(BatchedQueueingProcessor {
            registry,
            backend,
            mode: config.execution,
            pool,
        })
    }

    /// Buffer one work item, skipping it when the queue already holds an
    /// entry for the same entity instance. The first queued operation for a
    /// given entity wins within one batch.
    pub fn add(&self, work: WorkItem, queue: &mut Vec<WorkItem>) {
        let type_id = work.entity.as_ref().type_id();
        let duplicate = queue
            .iter()
            .any(|queued| queued.entity.as_ref().type_id() == type_id && queued.id == work.id);
        if duplicate {
            trace!(id = %work.id, "skipping duplicate work item");
            return;
        }
        queue.push(work);
    }

    /// Expand a buffered queue and execute (or submit) the resulting batch.
    pub fn perform_works(&self, queue: Vec<WorkItem>) -> Result<()> {
        if queue.is_empty() {
            return Ok(());
        }
        let mut works: Vec<IndexWork> = Vec::with_capacity(queue.len());
        for item in &queue {
            let type_id = item.entity.as_ref().type_id();
            let builder = self.registry.get(type_id).ok_or_else(|| {
                QuiverError::index(format!(
                    "work item for an unregistered entity type: {:?}",
                    item.id
                ))
            })?;
            builder.add_work_to_queue(
                &self.registry,
                &item.entity,
                item.id.clone(),
                item.kind,
                &mut works,
            )?;
        }
        debug!(
            items = queue.len(),
            works = works.len(),
            "flushing work queue"
        );
        let job = self.backend.processor(works);
        match self.mode {
            ExecutionMode::Sync => job(),
            ExecutionMode::Async => {
                if let Some(pool) = &self.pool {
                    pool.execute(job);
                }
                Ok(())
            }
        }
    }

    /// Discard a buffered queue without touching the index.
    pub fn cancel_works(&self, queue: Vec<WorkItem>) {
        debug!(items = queue.len(), "cancelling work queue");
        drop(queue);
    }

    /// Drain the worker pool, waiting for in-flight batches.
    pub fn close(&mut self) {
        self.pool = None;
    }
}

impl std::fmt::Debug for BatchedQueueingProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchedQueueingProcessor")
            .field("mode", &self.mode)
            .field("async_pool", &self.pool.is_some())
            .finish_non_exhaustive()
    }
}

/// Fixed-size thread pool over a bounded job channel.
struct WorkerPool {
    sender: Option<Sender<BackendJob>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    fn new(threads: usize, queue_max: Option<usize>) -> Result<Self> {
        let (sender, receiver): (Sender<BackendJob>, Receiver<BackendJob>) = match queue_max {
            Some(max) => bounded(max),
            None => unbounded(),
        };
        let mut handles = Vec::with_capacity(threads);
        for i in 0..threads {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("quiver-backend-{i}"))
                .spawn(move || {
                    for job in receiver.iter() {
                        if let Err(e) = job() {
                            error!(error = %e, "backend batch failed");
                        }
                    }
                })
                .map_err(|e| QuiverError::backend(format!("unable to spawn worker: {e}")))?;
            handles.push(handle);
        }
        Ok(WorkerPool {
            sender: Some(sender),
            handles,
        })
    }

    /// Submit a job; a full queue makes the submitter run the job inline.
    fn execute(&self, job: BackendJob) {
        let Some(sender) = &self.sender else {
            return;
        };
        match sender.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(job)) => {
                trace!("worker queue full, running batch on submitting thread");
                if let Err(e) = job() {
                    error!(error = %e, "backend batch failed");
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                error!("worker pool is shut down, dropping batch");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // closing the channel lets the workers drain and exit
        self.sender = None;
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

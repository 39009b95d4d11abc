//! Per-batch workspace over the index directories.
//!
//! A workspace lazily acquires read and write handles per directory,
//! taking the directory's mutual-exclusion lock on first touch (re-entrant
//! within one workspace). The handle discipline of the underlying engine is
//! enforced here: a write handle closes any open read handle for the same
//! directory first, and requesting a read handle while a write handle is
//! open is a programming error. `clean` releases everything, success or
//! failure, and is never short-circuited by an individual close failure.
//!
//! A workspace is scoped to one batch execution and is not meant to be
//! shared across threads.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::{Mutex, RawMutex};
use parking_lot::lock_api::ArcMutexGuard;
use tracing::error;

use crate::engine::{DocumentBuilder, DocumentBuilderRegistry};
use crate::error::{QuiverError, Result};
use crate::index::{IndexReader, IndexWriter};

type DirectoryLockGuard = ArcMutexGuard<RawMutex, ()>;

/// The per-directory mutual-exclusion locks, shared by every workspace of
/// one search factory. Keyed by physical directory location so entity types
/// sharing a directory share a lock.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: AHashMap<String, Arc<Mutex<()>>>,
}

impl LockTable {
    /// Create an empty lock table.
    pub fn new() -> Self {
        LockTable::default()
    }

    /// Register a directory location, keeping an existing lock if present.
    pub fn register(&mut self, location: &str) {
        self.locks.entry(location.to_string()).or_default();
    }

    /// The lock for a directory location.
    pub fn get(&self, location: &str) -> Option<Arc<Mutex<()>>> {
        self.locks.get(location).cloned()
    }

    /// Number of registered directories.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no directories are registered.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Per-batch scope owning acquired directory handles and their locks.
pub struct Workspace {
    registry: Arc<DocumentBuilderRegistry>,
    locks: Arc<LockTable>,
    readers: AHashMap<String, IndexReader>,
    writers: AHashMap<String, IndexWriter>,
    held: AHashMap<String, DirectoryLockGuard>,
}

impl Workspace {
    /// Create a workspace over a factory's registry and lock table.
    pub fn new(registry: Arc<DocumentBuilderRegistry>, locks: Arc<LockTable>) -> Self {
        Workspace {
            registry,
            locks,
            readers: AHashMap::new(),
            writers: AHashMap::new(),
            held: AHashMap::new(),
        }
    }

    /// The document builder registered for a type name.
    pub fn document_builder(&self, type_name: &str) -> Result<Arc<DocumentBuilder>> {
        self.registry
            .get_by_name(type_name)
            .cloned()
            .ok_or_else(|| {
                QuiverError::index(format!("no indexing configuration for type: {type_name}"))
            })
    }

    /// Read handle for the entity type's directory, opened on first use.
    ///
    /// Fails fast when a write handle is already open for that directory.
    pub fn reader(&mut self, type_name: &str) -> Result<&mut IndexReader> {
        let builder = self.document_builder(type_name)?;
        let location = builder.directory().location().to_string();
        if self.writers.contains_key(&location) {
            return Err(QuiverError::workspace(format!(
                "tries to read for update while a writer is open: {type_name}"
            )));
        }
        if !self.readers.contains_key(&location) {
            self.lock_directory(&location)?;
            match IndexReader::open(builder.directory().clone()) {
                Ok(reader) => {
                    self.readers.insert(location.clone(), reader);
                }
                Err(e) => {
                    return Err(self.abort(QuiverError::index(format!(
                        "unable to open index reader for {type_name}: {e}"
                    ))));
                }
            }
        }
        Ok(self
            .readers
            .get_mut(&location)
            .expect("reader was just inserted"))
    }

    /// Write handle for the entity type's directory, opened on first use.
    ///
    /// An open read handle for the same directory is closed (flushing its
    /// deletions) before the writer is opened.
    pub fn writer(&mut self, type_name: &str) -> Result<&mut IndexWriter> {
        let builder = self.document_builder(type_name)?;
        let location = builder.directory().location().to_string();
        if let Some(reader) = self.readers.remove(&location) {
            reader.close().map_err(|e| {
                QuiverError::index(format!("exception while closing index reader: {e}"))
            })?;
        }
        if !self.writers.contains_key(&location) {
            self.lock_directory(&location)?;
            match IndexWriter::open(builder.directory().clone(), builder.analyzer().clone()) {
                Ok(writer) => {
                    self.writers.insert(location.clone(), writer);
                }
                Err(e) => {
                    return Err(self.abort(QuiverError::index(format!(
                        "unable to open index writer for {type_name}: {e}"
                    ))));
                }
            }
        }
        Ok(self
            .writers
            .get_mut(&location)
            .expect("writer was just inserted"))
    }

    /// Number of directory locks currently held by this workspace.
    pub fn locked_directory_count(&self) -> usize {
        self.held.len()
    }

    /// Release every handle and every lock. Invoked unconditionally at the
    /// end of a batch; close failures do not stop the remaining cleanup and
    /// the first error encountered is propagated.
    pub fn clean(&mut self) -> Result<()> {
        match self.release_all(None) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn lock_directory(&mut self, location: &str) -> Result<()> {
        // a workspace cannot race with itself: never re-acquire a held lock
        if self.held.contains_key(location) {
            return Ok(());
        }
        let lock = self.locks.get(location).ok_or_else(|| {
            QuiverError::index(format!("no lock registered for directory: {location}"))
        })?;
        let guard = lock.lock_arc();
        self.held.insert(location.to_string(), guard);
        Ok(())
    }

    /// Run the full cleanup on a failed handle acquisition, preserving the
    /// original error.
    fn abort(&mut self, original: QuiverError) -> QuiverError {
        self.release_all(Some(original))
            .expect("release_all keeps the original error")
    }

    fn release_all(&mut self, original: Option<QuiverError>) -> Option<QuiverError> {
        let mut raised = original;
        for (location, reader) in self.readers.drain() {
            if let Err(e) = reader.close() {
                if raised.is_some() {
                    error!(directory = %location, error = %e, "subsequent error while closing index reader");
                } else {
                    raised = Some(QuiverError::index(format!(
                        "exception while closing index reader: {e}"
                    )));
                }
            }
        }
        for (location, writer) in self.writers.drain() {
            if let Err(e) = writer.close() {
                if raised.is_some() {
                    error!(directory = %location, error = %e, "subsequent error while closing index writer");
                } else {
                    raised = Some(QuiverError::index(format!(
                        "exception while closing index writer: {e}"
                    )));
                }
            }
        }
        // dropping the guards releases the directory locks
        self.held.clear();
        raised
    }
}

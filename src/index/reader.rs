//! Term-lookup index reader with tombstone deletion.

use std::sync::Arc;

use ahash::AHashMap;
use tracing::trace;

use crate::error::{QuiverError, Result};
use crate::index::Term;
use crate::index::segment::{Segment, StoredDocument};
use crate::store::DirectoryProvider;

/// A read-for-update handle on one directory's segment.
///
/// Builds an in-memory posting map at open time; deletions are tombstones
/// persisted on [`close`](Self::close). The caller is responsible for
/// exclusive access while deletions are pending.
#[derive(Debug)]
pub struct IndexReader {
    provider: Arc<dyn DirectoryProvider>,
    segment: Segment,
    postings: AHashMap<(String, String), Vec<usize>>,
    dirty: bool,
}

impl IndexReader {
    /// Open a reader over the directory's current segment.
    pub fn open(provider: Arc<dyn DirectoryProvider>) -> Result<Self> {
        let segment = provider.read_segment()?;
        let mut postings: AHashMap<(String, String), Vec<usize>> = AHashMap::new();
        for (idx, doc) in segment.documents.iter().enumerate() {
            if doc.deleted {
                continue;
            }
            for field in &doc.fields {
                for term in &field.terms {
                    postings
                        .entry((field.name.clone(), term.clone()))
                        .or_default()
                        .push(idx);
                }
            }
        }
        Ok(IndexReader {
            provider,
            segment,
            postings,
            dirty: false,
        })
    }

    /// Indexes of live documents containing the exact term.
    pub fn term_docs(&self, term: &Term) -> Vec<usize> {
        self.postings
            .get(&(term.field.clone(), term.text.clone()))
            .map(|docs| {
                docs.iter()
                    .copied()
                    .filter(|&idx| !self.segment.documents[idx].deleted)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fetch a document by index.
    pub fn document(&self, idx: usize) -> Result<&StoredDocument> {
        self.segment
            .documents
            .get(idx)
            .ok_or_else(|| QuiverError::index(format!("document index out of range: {idx}")))
    }

    /// Tombstone a document.
    pub fn delete_document(&mut self, idx: usize) -> Result<()> {
        let doc = self
            .segment
            .documents
            .get_mut(idx)
            .ok_or_else(|| QuiverError::index(format!("document index out of range: {idx}")))?;
        if !doc.deleted {
            trace!(directory = self.provider.name(), idx, "deleting document");
            doc.deleted = true;
            self.dirty = true;
        }
        Ok(())
    }

    /// Number of live documents.
    pub fn num_live_docs(&self) -> usize {
        self.segment.num_live_docs()
    }

    /// Persist pending deletions and release the handle.
    pub fn close(self) -> Result<()> {
        if self.dirty {
            self.provider.write_segment(&self.segment)?;
        }
        Ok(())
    }
}

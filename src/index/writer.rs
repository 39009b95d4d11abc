//! Append-only index writer.

use std::sync::Arc;

use tracing::trace;

use crate::analysis::AnalyzerRef;
use crate::document::Document;
use crate::error::Result;
use crate::index::segment::{Segment, StoredDocument};
use crate::store::DirectoryProvider;

/// A write handle on one directory's segment.
///
/// Documents are analyzed on append and persisted on [`close`](Self::close).
/// The caller is responsible for exclusive access to the directory while the
/// writer is open.
#[derive(Debug)]
pub struct IndexWriter {
    provider: Arc<dyn DirectoryProvider>,
    analyzer: AnalyzerRef,
    segment: Segment,
    dirty: bool,
}

impl IndexWriter {
    /// Open a writer, loading the directory's current segment.
    pub fn open(provider: Arc<dyn DirectoryProvider>, analyzer: AnalyzerRef) -> Result<Self> {
        let segment = provider.read_segment()?;
        Ok(IndexWriter {
            provider,
            analyzer,
            segment,
            dirty: false,
        })
    }

    /// Append one document.
    pub fn add_document(&mut self, doc: &Document) -> Result<()> {
        trace!(directory = self.provider.name(), "appending document");
        self.segment
            .documents
            .push(StoredDocument::from_document(doc, self.analyzer.as_ref()));
        self.dirty = true;
        Ok(())
    }

    /// Number of live documents currently in the segment.
    pub fn num_live_docs(&self) -> usize {
        self.segment.num_live_docs()
    }

    /// Persist appended documents and release the handle.
    pub fn close(self) -> Result<()> {
        if self.dirty {
            self.provider.write_segment(&self.segment)?;
        }
        Ok(())
    }
}

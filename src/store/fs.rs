//! File-system directory provider.
//!
//! The index lives in `<index_base>/<index name>/segment.qvr`. The directory
//! and an empty segment are created at initialization; writes go through a
//! temporary file and an atomic rename so readers never observe a torn
//! segment.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{QuiverError, Result};
use crate::index::Segment;
use crate::store::DirectoryProvider;

/// Segment file name inside an index directory.
pub const SEGMENT_FILE: &str = "segment.qvr";

/// A directory provider backed by the local file system.
#[derive(Debug)]
pub struct FsDirectoryProvider {
    name: String,
    location: String,
    path: PathBuf,
}

impl FsDirectoryProvider {
    /// Initialize the provider, creating the index directory and an empty
    /// segment when absent. An unusable base directory is a configuration
    /// error.
    pub fn new(name: &str, index_base: &Path) -> Result<Self> {
        let dir = index_base.join(name);
        fs::create_dir_all(&dir).map_err(|e| {
            QuiverError::config(format!(
                "unable to initialize index directory {}: {e}",
                dir.display()
            ))
        })?;
        let canonical = dir.canonicalize().map_err(|e| {
            QuiverError::config(format!(
                "unable to resolve index directory {}: {e}",
                dir.display()
            ))
        })?;
        let provider = FsDirectoryProvider {
            name: name.to_string(),
            location: canonical.to_string_lossy().into_owned(),
            path: canonical,
        };
        if !provider.segment_path().exists() {
            debug!(index = name, "creating empty segment");
            provider.write_segment(&Segment::new())?;
        }
        Ok(provider)
    }

    fn segment_path(&self) -> PathBuf {
        self.path.join(SEGMENT_FILE)
    }
}

impl DirectoryProvider for FsDirectoryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn location(&self) -> &str {
        &self.location
    }

    fn read_segment(&self) -> Result<Segment> {
        let bytes = fs::read(self.segment_path())?;
        Segment::decode(&bytes)
    }

    fn write_segment(&self, segment: &Segment) -> Result<()> {
        let bytes = segment.encode()?;
        let tmp = self.path.join(format!("{SEGMENT_FILE}.tmp"));
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, self.segment_path())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialization_creates_empty_segment() {
        let base = tempfile::tempdir().unwrap();
        let provider = FsDirectoryProvider::new("books", base.path()).unwrap();
        let segment = provider.read_segment().unwrap();
        assert_eq!(segment.num_live_docs(), 0);
    }

    #[test]
    fn test_write_then_read() {
        let base = tempfile::tempdir().unwrap();
        let provider = FsDirectoryProvider::new("books", base.path()).unwrap();
        let mut segment = Segment::new();
        segment.documents.push(crate::index::StoredDocument {
            fields: vec![],
            boost: None,
            deleted: false,
        });
        provider.write_segment(&segment).unwrap();
        assert_eq!(provider.read_segment().unwrap().num_live_docs(), 1);
    }

    #[test]
    fn test_same_path_means_same_location() {
        let base = tempfile::tempdir().unwrap();
        let a = FsDirectoryProvider::new("books", base.path()).unwrap();
        let b = FsDirectoryProvider::new("books", base.path()).unwrap();
        assert_eq!(a.location(), b.location());
    }
}

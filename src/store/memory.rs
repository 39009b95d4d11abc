//! In-memory directory provider, for tests and volatile indexes.

use parking_lot::Mutex;

use crate::error::Result;
use crate::index::Segment;
use crate::store::DirectoryProvider;

/// A directory provider holding its segment in process memory.
#[derive(Debug)]
pub struct RamDirectoryProvider {
    name: String,
    location: String,
    segment: Mutex<Vec<u8>>,
}

impl RamDirectoryProvider {
    /// Create an in-memory directory with an empty segment.
    pub fn new(name: &str) -> Result<Self> {
        let provider = RamDirectoryProvider {
            name: name.to_string(),
            location: format!("ram://{name}"),
            segment: Mutex::new(Vec::new()),
        };
        provider.write_segment(&Segment::new())?;
        Ok(provider)
    }
}

impl DirectoryProvider for RamDirectoryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn location(&self) -> &str {
        &self.location
    }

    fn read_segment(&self) -> Result<Segment> {
        let bytes = self.segment.lock();
        Segment::decode(&bytes)
    }

    fn write_segment(&self, segment: &Segment) -> Result<()> {
        let bytes = segment.encode()?;
        *self.segment.lock() = bytes;
        Ok(())
    }
}

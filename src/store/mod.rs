//! Directory providers.
//!
//! A [`DirectoryProvider`] owns one physical index storage location. Several
//! entity types may share one provider; providers resolving to the same
//! physical location are deduplicated by the factory so they also share one
//! mutual-exclusion lock.

pub mod factory;
pub mod fs;
pub mod fs_slave;
pub mod memory;

use std::fmt::Debug;

pub use factory::DirectoryProviderFactory;
pub use fs::FsDirectoryProvider;
pub use fs_slave::FsSlaveDirectoryProvider;
pub use memory::RamDirectoryProvider;

use crate::error::Result;
use crate::index::Segment;

/// One physical index storage location.
pub trait DirectoryProvider: Send + Sync + Debug {
    /// Index name this provider was created for.
    fn name(&self) -> &str;

    /// Physical location identity. Providers with equal locations are the
    /// same directory and must share one lock.
    fn location(&self) -> &str;

    /// Load the directory's segment.
    fn read_segment(&self) -> Result<Segment>;

    /// Replace the directory's segment.
    fn write_segment(&self, segment: &Segment) -> Result<()>;
}

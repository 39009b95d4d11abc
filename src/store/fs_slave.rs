//! Replicated slave directory provider.
//!
//! Serves a local read-only mirror of a master index directory, refreshed by
//! copying the master's segment on a fixed interval. Index mutation goes to
//! the master node; a slave rejects writes.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Sender, bounded};
use tracing::{debug, warn};

use crate::error::{QuiverError, Result};
use crate::index::Segment;
use crate::store::DirectoryProvider;
use crate::store::fs::{FsDirectoryProvider, SEGMENT_FILE};

/// A read-only directory provider refreshed from a master location.
#[derive(Debug)]
pub struct FsSlaveDirectoryProvider {
    local: FsDirectoryProvider,
    stop: Option<Sender<()>>,
    refresher: Option<JoinHandle<()>>,
}

impl FsSlaveDirectoryProvider {
    /// Initialize the mirror and start the refresh loop.
    ///
    /// `source_base` is the master's index base directory; `refresh` is the
    /// copy interval.
    pub fn new(
        name: &str,
        index_base: &Path,
        source_base: &Path,
        refresh: Duration,
    ) -> Result<Self> {
        let source = source_base.join(name).join(SEGMENT_FILE);
        if !source.exists() {
            return Err(QuiverError::config(format!(
                "slave source segment does not exist: {}",
                source.display()
            )));
        }
        let local = FsDirectoryProvider::new(name, index_base)?;
        let target = PathBuf::from(local.location()).join(SEGMENT_FILE);

        // initial copy so the mirror starts current
        copy_segment(&source, &target)?;

        let (stop, stopped) = bounded::<()>(0);
        let index_name = name.to_string();
        let refresher = std::thread::spawn(move || {
            loop {
                match stopped.recv_timeout(refresh) {
                    Ok(()) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                }
                match copy_segment(&source, &target) {
                    Ok(()) => debug!(index = %index_name, "refreshed slave segment"),
                    Err(e) => warn!(index = %index_name, error = %e, "slave refresh failed"),
                }
            }
        });

        Ok(FsSlaveDirectoryProvider {
            local,
            stop: Some(stop),
            refresher: Some(refresher),
        })
    }
}

fn copy_segment(source: &Path, target: &Path) -> Result<()> {
    let tmp = target.with_extension("qvr.tmp");
    fs::copy(source, &tmp)?;
    fs::rename(&tmp, target)?;
    Ok(())
}

impl DirectoryProvider for FsSlaveDirectoryProvider {
    fn name(&self) -> &str {
        self.local.name()
    }

    fn location(&self) -> &str {
        self.local.location()
    }

    fn read_segment(&self) -> Result<Segment> {
        self.local.read_segment()
    }

    fn write_segment(&self, _segment: &Segment) -> Result<()> {
        Err(QuiverError::index(format!(
            "slave directory '{}' is read-only",
            self.local.name()
        )))
    }
}

impl Drop for FsSlaveDirectoryProvider {
    fn drop(&mut self) {
        self.stop.take();
        if let Some(handle) = self.refresher.take() {
            let _ = handle.join();
        }
    }
}

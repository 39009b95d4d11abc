//! Directory provider construction from configuration.
//!
//! Providers are configured through namespaced properties, with
//! `quiver.<indexname>.*` overriding `quiver.default.*`:
//!
//! - `directory_provider`: `fs` (default), `ram`, or `fs-slave`
//! - `index_base`: base directory for file-system providers
//! - `source_base`, `refresh`: master location and copy interval (seconds)
//!   for slave providers
//!
//! Two indexes resolving to the same physical location share one provider
//! instance (and therefore one lock).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::error::{QuiverError, Result};
use crate::store::{
    DirectoryProvider, FsDirectoryProvider, FsSlaveDirectoryProvider, RamDirectoryProvider,
};

const DEFAULT_DIRECTORY_PROVIDER: &str = "fs";

/// Creates directory providers, sharing instances for equal locations.
#[derive(Debug, Default)]
pub struct DirectoryProviderFactory {
    providers: Vec<Arc<dyn DirectoryProvider>>,
}

impl DirectoryProviderFactory {
    /// Create an empty factory.
    pub fn new() -> Self {
        DirectoryProviderFactory::default()
    }

    /// Create (or reuse) the provider for one index.
    pub fn create(
        &mut self,
        index_name: &str,
        settings: &Settings,
    ) -> Result<Arc<dyn DirectoryProvider>> {
        let props = settings.index_properties(index_name);
        let kind = props.get_or("directory_provider", DEFAULT_DIRECTORY_PROVIDER);

        let provider: Arc<dyn DirectoryProvider> = match kind {
            "fs" => {
                let base = props.get("index_base").ok_or_else(|| {
                    QuiverError::config(format!(
                        "no index_base configured for fs index '{index_name}'"
                    ))
                })?;
                Arc::new(FsDirectoryProvider::new(index_name, Path::new(base))?)
            }
            "ram" => Arc::new(RamDirectoryProvider::new(index_name)?),
            "fs-slave" => {
                let base = props.get("index_base").ok_or_else(|| {
                    QuiverError::config(format!(
                        "no index_base configured for slave index '{index_name}'"
                    ))
                })?;
                let source = props.get("source_base").ok_or_else(|| {
                    QuiverError::config(format!(
                        "no source_base configured for slave index '{index_name}'"
                    ))
                })?;
                let refresh = Duration::from_secs(props.get_u64("refresh", 3600)?);
                Arc::new(FsSlaveDirectoryProvider::new(
                    index_name,
                    Path::new(base),
                    Path::new(source),
                    refresh,
                )?)
            }
            other => {
                return Err(QuiverError::config(format!(
                    "unknown directory provider '{other}' for index '{index_name}'"
                )));
            }
        };

        // share one provider per physical location
        if let Some(existing) = self
            .providers
            .iter()
            .find(|p| p.location() == provider.location())
        {
            return Ok(existing.clone());
        }
        self.providers.push(provider.clone());
        Ok(provider)
    }

    /// All distinct providers created so far.
    pub fn providers(&self) -> &[Arc<dyn DirectoryProvider>] {
        &self.providers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ram_provider_by_default_override() {
        let settings = Settings::new().with("quiver.default.directory_provider", "ram");
        let mut factory = DirectoryProviderFactory::new();
        let provider = factory.create("books", &settings).unwrap();
        assert_eq!(provider.location(), "ram://books");
    }

    #[test]
    fn test_shared_location_returns_shared_provider() {
        let base = tempfile::tempdir().unwrap();
        let settings = Settings::new()
            .with("quiver.default.directory_provider", "fs")
            .with(
                "quiver.default.index_base",
                base.path().to_string_lossy().into_owned(),
            );
        let mut factory = DirectoryProviderFactory::new();
        let a = factory.create("shared", &settings).unwrap();
        let b = factory.create("shared", &settings).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.providers().len(), 1);
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let settings = Settings::new().with("quiver.default.directory_provider", "s3");
        let mut factory = DirectoryProviderFactory::new();
        assert!(factory.create("books", &settings).is_err());
    }

    #[test]
    fn test_missing_index_base_is_config_error() {
        let settings = Settings::new();
        let mut factory = DirectoryProviderFactory::new();
        assert!(factory.create("books", &settings).is_err());
    }
}

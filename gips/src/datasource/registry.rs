//! Registry of known data sources.
//!
//! The registry is built once at startup and never mutated afterwards. It can
//! be used as a plain value, or installed as process-wide state so that any
//! worker can look sources up without locking.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use thiserror::Error;

use super::DataSource;

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// Registry errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A source with the same name was already added.
    #[error("data source '{0}' registered twice")]
    Duplicate(String),

    /// [`Registry::install`] was called more than once.
    #[error("the global data source registry is already installed")]
    AlreadyInstalled,
}

/// Immutable collection of data sources keyed by name.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    sources: BTreeMap<String, Arc<DataSource>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a data source, rejecting duplicate names.
    pub fn with(mut self, source: DataSource) -> Result<Self, RegistryError> {
        if self.sources.contains_key(&source.name) {
            return Err(RegistryError::Duplicate(source.name));
        }
        self.sources.insert(source.name.clone(), Arc::new(source));
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<Arc<DataSource>> {
        self.sources.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Install this registry as the process-wide registry.
    ///
    /// Succeeds once; later calls fail with [`RegistryError::AlreadyInstalled`].
    pub fn install(self) -> Result<&'static Registry, RegistryError> {
        GLOBAL
            .set(self)
            .map_err(|_| RegistryError::AlreadyInstalled)?;
        GLOBAL.get().ok_or(RegistryError::AlreadyInstalled)
    }

    /// The installed process-wide registry, if any.
    pub fn global() -> Option<&'static Registry> {
        GLOBAL.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::catalog;

    #[test]
    fn test_registry_lookup() {
        let registry = Registry::new().with(catalog::landsat()).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("landsat").is_some());
        assert!(registry.get("modis").is_none());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["landsat"]);
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let err = Registry::new()
            .with(catalog::landsat())
            .unwrap()
            .with(catalog::landsat())
            .unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("landsat".to_string()));
    }

    #[test]
    fn test_install_once() {
        // Only this test touches the global registry.
        let installed = Registry::new().with(catalog::landsat()).unwrap().install();
        assert!(installed.is_ok());
        assert!(Registry::global().unwrap().get("landsat").is_some());
        assert_eq!(
            Registry::new().install().unwrap_err(),
            RegistryError::AlreadyInstalled
        );
    }
}

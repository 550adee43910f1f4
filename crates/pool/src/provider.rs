//! Filesystem providers and the scheme registry
//!
//! A provider turns an archive-style URI into an open [`MountedFileSystem`].
//! The pool never parses container formats itself; it only asks the
//! provider registered for the URI's scheme.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;
use url::Url;

use resource::Resource;

use crate::error::{MountError, ProviderError};

/// An open filesystem rooted at a canonical URI
pub trait MountedFileSystem: Send + Sync + Debug {
    /// The filesystem's own root URI, used as the pool key
    fn root_uri(&self) -> &Url;

    /// A resource for an absolute URI inside this filesystem
    fn resource(&self, uri: &Url) -> resource::Result<Arc<dyn Resource>>;

    fn is_open(&self) -> bool;

    /// Release the underlying handles; must be idempotent
    fn close(&self);
}

/// Opens filesystems for one or more URI schemes
pub trait FileSystemProvider: Send + Sync + Debug {
    /// Schemes this provider handles, lower-case
    fn schemes(&self) -> Vec<String>;

    /// Open a new filesystem for `uri`
    ///
    /// Returns [`ProviderError::AlreadyExists`] when the provider already
    /// holds an open filesystem for the same container.
    fn new_file_system(&self, uri: &Url) -> Result<Arc<dyn MountedFileSystem>, ProviderError>;

    /// The already open filesystem for `uri`
    fn get_file_system(&self, uri: &Url) -> Result<Arc<dyn MountedFileSystem>, ProviderError>;
}

/// Providers keyed by lower-cased scheme
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn FileSystemProvider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider for all of its schemes
    ///
    /// Nothing is registered if any scheme is already taken.
    pub fn register(&self, provider: Arc<dyn FileSystemProvider>) -> Result<(), MountError> {
        let schemes: Vec<String> = provider
            .schemes()
            .iter()
            .map(|scheme| scheme.to_ascii_lowercase())
            .collect();

        let mut providers = self.providers.write();
        if let Some(taken) = schemes.iter().find(|scheme| providers.contains_key(*scheme)) {
            return Err(MountError::DuplicateProvider(taken.clone()));
        }

        for scheme in schemes {
            tracing::debug!(scheme = %scheme, "registered filesystem provider");
            providers.insert(scheme, provider.clone());
        }
        Ok(())
    }

    pub fn get(&self, scheme: &str) -> Option<Arc<dyn FileSystemProvider>> {
        self.providers
            .read()
            .get(&scheme.to_ascii_lowercase())
            .cloned()
    }

    /// Registered schemes, sorted
    pub fn schemes(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self.providers.read().keys().cloned().collect();
        schemes.sort();
        schemes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct NamedProvider(Vec<&'static str>);

    impl FileSystemProvider for NamedProvider {
        fn schemes(&self) -> Vec<String> {
            self.0.iter().map(|s| s.to_string()).collect()
        }

        fn new_file_system(
            &self,
            _uri: &Url,
        ) -> Result<Arc<dyn MountedFileSystem>, ProviderError> {
            Err(ProviderError::NotFound)
        }

        fn get_file_system(
            &self,
            _uri: &Url,
        ) -> Result<Arc<dyn MountedFileSystem>, ProviderError> {
            Err(ProviderError::NotFound)
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ProviderRegistry::new();
        registry
            .register(Arc::new(NamedProvider(vec!["Jar", "zip"])))
            .unwrap();

        assert!(registry.get("jar").is_some());
        assert!(registry.get("JAR").is_some());
        assert!(registry.get("tar").is_none());
        assert_eq!(registry.schemes(), vec!["jar", "zip"]);
    }

    #[test]
    fn test_duplicate_scheme_rejected() {
        let registry = ProviderRegistry::new();
        registry
            .register(Arc::new(NamedProvider(vec!["jar"])))
            .unwrap();

        let err = registry
            .register(Arc::new(NamedProvider(vec!["tar", "JAR"])))
            .unwrap_err();
        assert!(matches!(err, MountError::DuplicateProvider(ref s) if s == "jar"));
        assert!(registry.get("tar").is_none());
    }
}

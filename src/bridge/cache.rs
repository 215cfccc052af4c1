//! Memoized catalog enumeration.
//!
//! Enumerating installable or installed item names is a seconds-scale
//! external call on large catalogs; the cache makes repeated interactive
//! lookups cheap. A stale entry is a correctness bug (autocomplete would
//! offer already-installed items as installable), so every mutating batch
//! must invalidate the scope it affected.

use std::sync::Arc;

use async_trait::async_trait;

use super::error::BridgeError;

/// The catalog-enumeration collaborator.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// All installable item names.
    async fn available_names(&self) -> Result<Vec<String>, BridgeError>;

    /// All currently installed item names.
    async fn installed_names(&self) -> Result<Vec<String>, BridgeError>;
}

/// Which cached entries a mutation affects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheScope {
    Available,
    Installed,
    Both,
}

/// Process-wide catalog cache. Owned by the bridge context and passed by
/// reference; only completed batch runs invalidate it.
pub struct CatalogCache {
    source: Arc<dyn CatalogSource>,
    available: Option<Vec<String>>,
    installed: Option<Vec<String>>,
}

impl CatalogCache {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self {
            source,
            available: None,
            installed: None,
        }
    }

    pub async fn available(&mut self, force_refresh: bool) -> Result<&[String], BridgeError> {
        if force_refresh || self.available.is_none() {
            self.available = Some(self.source.available_names().await?);
        }
        Ok(self.available.as_deref().expect("populated above"))
    }

    pub async fn installed(&mut self, force_refresh: bool) -> Result<&[String], BridgeError> {
        if force_refresh || self.installed.is_none() {
            self.installed = Some(self.source.installed_names().await?);
        }
        Ok(self.installed.as_deref().expect("populated above"))
    }

    /// Drop cached entries. Required post-condition of every mutating batch.
    pub fn invalidate(&mut self, scope: CacheScope) {
        match scope {
            CacheScope::Available => self.available = None,
            CacheScope::Installed => self.installed = None,
            CacheScope::Both => {
                self.available = None;
                self.installed = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        available_calls: AtomicUsize,
        installed_calls: AtomicUsize,
    }

    impl CountingSource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                available_calls: AtomicUsize::new(0),
                installed_calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CatalogSource for CountingSource {
        async fn available_names(&self) -> Result<Vec<String>, BridgeError> {
            self.available_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec!["neovim".to_string(), "tmux".to_string()])
        }

        async fn installed_names(&self) -> Result<Vec<String>, BridgeError> {
            self.installed_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec!["bash".to_string()])
        }
    }

    #[tokio::test]
    async fn test_second_read_hits_the_cache() {
        let source = CountingSource::new();
        let mut cache = CatalogCache::new(source.clone());

        let first = cache.available(false).await.unwrap().to_vec();
        let second = cache.available(false).await.unwrap().to_vec();

        assert_eq!(first, second);
        assert_eq!(source.available_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_requeries() {
        let source = CountingSource::new();
        let mut cache = CatalogCache::new(source.clone());

        cache.available(false).await.unwrap();
        cache.available(true).await.unwrap();

        assert_eq!(source.available_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidation_forces_requery() {
        let source = CountingSource::new();
        let mut cache = CatalogCache::new(source.clone());

        cache.installed(false).await.unwrap();
        cache.invalidate(CacheScope::Installed);
        cache.installed(false).await.unwrap();

        assert_eq!(source.installed_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_scopes_are_independent() {
        let source = CountingSource::new();
        let mut cache = CatalogCache::new(source.clone());

        cache.available(false).await.unwrap();
        cache.installed(false).await.unwrap();
        cache.invalidate(CacheScope::Installed);

        cache.available(false).await.unwrap();
        cache.installed(false).await.unwrap();

        assert_eq!(source.available_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.installed_calls.load(Ordering::SeqCst), 2);
    }
}

//! Unified store over the durable and ephemeral backends.

use std::sync::Arc;

use tracing::debug;

use crate::backend::{DurableBackend, EphemeralBackend};
use crate::error::Result;
use crate::keys::StoreKeys;

/// One get/set/remove contract over both backends.
///
/// Reads prefer the durable side when it is configured; writes go through
/// both. On platforms without a durable backend every operation reduces to
/// the ephemeral side.
pub struct HybridStore {
    ephemeral: Arc<dyn EphemeralBackend>,
    durable: Option<Arc<dyn DurableBackend>>,
}

impl HybridStore {
    #[must_use]
    pub fn new(
        ephemeral: Arc<dyn EphemeralBackend>,
        durable: Option<Arc<dyn DurableBackend>>,
    ) -> Self {
        Self { ephemeral, durable }
    }

    #[must_use]
    pub fn ephemeral_only(ephemeral: Arc<dyn EphemeralBackend>) -> Self {
        Self::new(ephemeral, None)
    }

    /// Build the store and run the migration pass over the tracked keys
    /// before returning, so startup code can rely on [`Self::get_cached`].
    pub async fn open(
        ephemeral: Arc<dyn EphemeralBackend>,
        durable: Option<Arc<dyn DurableBackend>>,
        keys: &StoreKeys,
    ) -> Result<Self> {
        let store = Self::new(ephemeral, durable);
        store.migrate(&keys.tracked()).await?;
        Ok(store)
    }

    /// Authoritative read. Durable hits are mirrored into the ephemeral
    /// side so later cached reads observe them.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let Some(durable) = &self.durable else {
            return Ok(self.ephemeral.get(key));
        };
        match durable.get(key).await? {
            Some(value) => {
                self.ephemeral.set(key, &value);
                Ok(Some(value))
            }
            None => Ok(self.ephemeral.get(key)),
        }
    }

    /// Best-effort synchronous read of the ephemeral side only. May be
    /// stale or absent; call [`Self::get`] when authority matters.
    #[must_use]
    pub fn get_cached(&self, key: &str) -> Option<String> {
        self.ephemeral.get(key)
    }

    /// Write through both backends. The durable write happens first and
    /// its failure aborts the ephemeral write, so the cache never claims a
    /// value the durable side lost.
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        if let Some(durable) = &self.durable {
            durable.set(key, value).await?;
        }
        self.ephemeral.set(key, value);
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        if let Some(durable) = &self.durable {
            durable.remove(key).await?;
        }
        self.ephemeral.remove(key);
        Ok(())
    }

    /// One-time reconciliation pass: a key present in exactly one backend
    /// is copied to the other; a key present in both keeps both values
    /// untouched (first observed wins, no merge). Idempotent, so calling
    /// it again after a partial failure is safe.
    pub async fn migrate(&self, keys: &[&str]) -> Result<()> {
        let Some(durable) = &self.durable else {
            return Ok(());
        };
        for key in keys.iter().copied() {
            let durable_value = durable.get(key).await?;
            let ephemeral_value = self.ephemeral.get(key);
            match (durable_value, ephemeral_value) {
                (Some(value), None) => {
                    debug!(key, "migrating key durable -> ephemeral");
                    self.ephemeral.set(key, &value);
                }
                (None, Some(value)) => {
                    debug!(key, "migrating key ephemeral -> durable");
                    durable.set(key, &value).await?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::HybridStore;
    use crate::backend::{DurableBackend, EphemeralBackend, MemoryBackend};
    use crate::error::{Result, StoreError};
    use crate::keys::StoreKeys;

    fn hybrid() -> (Arc<MemoryBackend>, Arc<MemoryBackend>, HybridStore) {
        let ephemeral = Arc::new(MemoryBackend::new());
        let durable = Arc::new(MemoryBackend::new());
        let store = HybridStore::new(ephemeral.clone(), Some(durable.clone()));
        (ephemeral, durable, store)
    }

    async fn durable_get(backend: &MemoryBackend, key: &str) -> Option<String> {
        DurableBackend::get(backend, key).await.expect("durable get")
    }

    async fn durable_set(backend: &MemoryBackend, key: &str, value: &str) {
        DurableBackend::set(backend, key, value)
            .await
            .expect("durable set");
    }

    #[tokio::test]
    async fn set_writes_both_backends() {
        let (ephemeral, durable, store) = hybrid();
        store.set("k", "v").await.expect("set");

        assert_eq!(EphemeralBackend::get(&*ephemeral, "k"), Some("v".into()));
        assert_eq!(durable_get(&durable, "k").await, Some("v".into()));
    }

    #[tokio::test]
    async fn remove_clears_both_backends() {
        let (ephemeral, durable, store) = hybrid();
        store.set("k", "v").await.expect("set");
        store.remove("k").await.expect("remove");

        assert_eq!(EphemeralBackend::get(&*ephemeral, "k"), None);
        assert_eq!(durable_get(&durable, "k").await, None);
    }

    #[tokio::test]
    async fn migrate_copies_durable_only_key_to_ephemeral() {
        let (ephemeral, durable, store) = hybrid();
        durable_set(&durable, "k", "native").await;

        store.migrate(&["k"]).await.expect("migrate");
        assert_eq!(
            EphemeralBackend::get(&*ephemeral, "k"),
            Some("native".into())
        );
    }

    #[tokio::test]
    async fn migrate_copies_ephemeral_only_key_to_durable() {
        let (ephemeral, durable, store) = hybrid();
        EphemeralBackend::set(&*ephemeral, "k", "web");

        store.migrate(&["k"]).await.expect("migrate");
        assert_eq!(durable_get(&durable, "k").await, Some("web".into()));
    }

    #[tokio::test]
    async fn migrate_keeps_conflicting_values_untouched() {
        let (ephemeral, durable, store) = hybrid();
        EphemeralBackend::set(&*ephemeral, "k", "web");
        durable_set(&durable, "k", "native").await;

        store.migrate(&["k"]).await.expect("migrate");
        assert_eq!(EphemeralBackend::get(&*ephemeral, "k"), Some("web".into()));
        assert_eq!(durable_get(&durable, "k").await, Some("native".into()));
    }

    #[tokio::test]
    async fn migrate_leaves_absent_keys_absent() {
        let (ephemeral, durable, store) = hybrid();
        store.migrate(&["missing"]).await.expect("migrate");

        assert_eq!(EphemeralBackend::get(&*ephemeral, "missing"), None);
        assert_eq!(durable_get(&durable, "missing").await, None);
    }

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let (ephemeral, durable, store) = hybrid();
        durable_set(&durable, "k", "native").await;

        store.migrate(&["k"]).await.expect("first");
        store.migrate(&["k"]).await.expect("second");

        assert_eq!(
            EphemeralBackend::get(&*ephemeral, "k"),
            Some("native".into())
        );
        assert_eq!(durable_get(&durable, "k").await, Some("native".into()));
    }

    #[tokio::test]
    async fn open_runs_migration_before_returning() {
        let ephemeral = Arc::new(MemoryBackend::new());
        let durable = Arc::new(MemoryBackend::new());
        let keys = StoreKeys::with_prefix("test");
        durable_set(&durable, &keys.device_uuid, "uuid-1").await;

        let store = HybridStore::open(ephemeral, Some(durable), &keys)
            .await
            .expect("open");
        assert_eq!(store.get_cached(&keys.device_uuid), Some("uuid-1".into()));
    }

    #[tokio::test]
    async fn get_mirrors_durable_hit_into_cache() {
        let (ephemeral, durable, store) = hybrid();
        durable_set(&durable, "k", "native").await;

        assert_eq!(EphemeralBackend::get(&*ephemeral, "k"), None);
        assert_eq!(store.get("k").await.expect("get"), Some("native".into()));
        assert_eq!(
            EphemeralBackend::get(&*ephemeral, "k"),
            Some("native".into())
        );
    }

    #[tokio::test]
    async fn get_cached_never_touches_the_durable_side() {
        let (_, durable, store) = hybrid();
        durable_set(&durable, "k", "native").await;

        // Not yet mirrored, so the cached read is allowed to miss.
        assert_eq!(store.get_cached("k"), None);
    }

    #[tokio::test]
    async fn ephemeral_only_store_reduces_to_single_backend() {
        let ephemeral = Arc::new(MemoryBackend::new());
        let store = HybridStore::ephemeral_only(ephemeral);

        store.set("k", "v").await.expect("set");
        assert_eq!(store.get("k").await.expect("get"), Some("v".into()));
        assert_eq!(store.get_cached("k"), Some("v".into()));
        store.migrate(&["k"]).await.expect("noop migrate");
        store.remove("k").await.expect("remove");
        assert_eq!(store.get("k").await.expect("get"), None);
    }

    struct FailingDurable;

    #[async_trait]
    impl DurableBackend for FailingDurable {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(StoreError::Backend("durable offline".to_string()))
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(StoreError::Backend("durable offline".to_string()))
        }

        async fn remove(&self, _key: &str) -> Result<()> {
            Err(StoreError::Backend("durable offline".to_string()))
        }
    }

    #[tokio::test]
    async fn durable_write_failure_propagates_and_skips_cache() {
        let ephemeral = Arc::new(MemoryBackend::new());
        let store = HybridStore::new(ephemeral.clone(), Some(Arc::new(FailingDurable)));

        let result = store.set("k", "v").await;
        assert!(matches!(result, Err(StoreError::Backend(_))));
        assert_eq!(EphemeralBackend::get(&*ephemeral, "k"), None);
    }
}

//! Storage backend seams and their built-in implementations.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;

/// Web-style ephemeral storage: synchronous, fast, best-effort durability.
pub trait EphemeralBackend: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Platform-provided durable storage. Round trips are asynchronous and can
/// fail, so every operation reports errors to the caller.
#[async_trait]
pub trait DurableBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory backend. Serves as the ephemeral side in production shells
/// that bridge it to web storage, and as either side in tests.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EphemeralBackend for MemoryBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.lock().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.lock().remove(key);
    }
}

#[async_trait]
impl DurableBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}

/// Durable backend persisting entries as a JSON object in a single file.
///
/// The whole snapshot is rewritten on every mutation; the tracked key set
/// is a handful of short strings, so the simplicity wins over a journal.
pub struct FileBackend {
    path: PathBuf,
    guard: tokio::sync::Mutex<()>,
}

impl FileBackend {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: tokio::sync::Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(error) => Err(error.into()),
        }
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl DurableBackend for FileBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _slot = self.guard.lock().await;
        Ok(self.load().await?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _slot = self.guard.lock().await;
        let mut entries = self.load().await?;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _slot = self.guard.lock().await;
        let mut entries = self.load().await?;
        if entries.remove(key).is_some() {
            self.persist(&entries).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{DurableBackend, EphemeralBackend, FileBackend, MemoryBackend};

    #[test]
    fn memory_backend_set_get_remove() {
        let backend = MemoryBackend::new();
        assert_eq!(EphemeralBackend::get(&backend, "k"), None);

        EphemeralBackend::set(&backend, "k", "v");
        assert_eq!(EphemeralBackend::get(&backend, "k"), Some("v".to_string()));

        EphemeralBackend::remove(&backend, "k");
        assert_eq!(EphemeralBackend::get(&backend, "k"), None);
    }

    #[tokio::test]
    async fn file_backend_round_trips_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = FileBackend::new(dir.path().join("state.json"));

        assert_eq!(backend.get("device_uuid").await.expect("get"), None);

        backend.set("device_uuid", "abc").await.expect("set");
        backend.set("theme", "night").await.expect("set");
        assert_eq!(
            backend.get("device_uuid").await.expect("get"),
            Some("abc".to_string())
        );

        backend.remove("theme").await.expect("remove");
        assert_eq!(backend.get("theme").await.expect("get"), None);
    }

    #[tokio::test]
    async fn file_backend_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.json");

        let first = FileBackend::new(&path);
        first.set("device_uuid", "abc").await.expect("set");
        drop(first);

        let second = FileBackend::new(&path);
        assert_eq!(
            second.get("device_uuid").await.expect("get"),
            Some("abc".to_string())
        );
    }

    #[tokio::test]
    async fn file_backend_missing_file_reads_as_absent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = FileBackend::new(dir.path().join("never_written.json"));
        assert_eq!(backend.get("anything").await.expect("get"), None);
    }
}

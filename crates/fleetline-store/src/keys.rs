//! Stable key namespace for persisted client state.

/// Keys the client persists across versions. The names form a compatibility
/// contract with already-shipped builds and must not change.
///
/// Injected into consumers rather than read from ambient constants so tests
/// can run isolated stores side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreKeys {
    /// Device UUID, written at most once per device-storage-lifetime.
    pub device_uuid: String,
    /// Canonical device number assigned by the fleet registry.
    pub device_number: String,
    /// Theme preference, owned by the settings screens but migrated here.
    pub theme_preference: String,
}

impl Default for StoreKeys {
    fn default() -> Self {
        Self::with_prefix("fleetline")
    }
}

impl StoreKeys {
    /// Namespace every key under `prefix`.
    #[must_use]
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            device_uuid: format!("{prefix}.device_uuid"),
            device_number: format!("{prefix}.device_number"),
            theme_preference: format!("{prefix}.theme"),
        }
    }

    /// Every key covered by the startup migration pass.
    #[must_use]
    pub fn tracked(&self) -> [&str; 3] {
        [
            self.device_uuid.as_str(),
            self.device_number.as_str(),
            self.theme_preference.as_str(),
        ]
    }
}

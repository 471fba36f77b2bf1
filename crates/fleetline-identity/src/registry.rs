//! Stable device identity over the hybrid store.

use std::sync::Arc;

use fleetline_store::{HybridStore, StoreError, StoreKeys};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::registration::{DeviceRegisterRequest, RegistrationApi};

/// Canonical UUIDs are 36 characters; anything shorter in the store is a
/// truncated write from an old build and is treated as absent.
pub const UUID_MIN_LEN: usize = 36;

/// Fallback numbers live in `0..1000`, matching the registry's assignment
/// space so display formatting stays uniform.
const FALLBACK_NUMBER_SPACE: u32 = 1000;

/// Shown while no device number has been assigned yet.
pub const PENDING_DISPLAY_ID: &str = "D?";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity storage failed: {0}")]
    Store(#[from] StoreError),
}

/// The identifier pair carried on every outgoing report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub uuid: String,
    pub number: Option<i32>,
    pub name: Option<String>,
}

/// Platform hook for a hardware-backed identifier (e.g. an OS-provided
/// serial). Optional; absent on platforms that do not expose one.
pub trait HardwareIdProvider: Send + Sync {
    fn hardware_uuid(&self) -> Option<String>;
}

/// Derives and caches the stable identity for this device.
///
/// The UUID is generated at most once per device-storage-lifetime and never
/// regenerated once durably stored. The device number is assigned at most
/// once by the fleet registry; a locally computed fallback is deliberately
/// never persisted so a later successful registration can still cache the
/// canonical number.
pub struct IdentityRegistry {
    store: Arc<HybridStore>,
    keys: StoreKeys,
    api: Arc<dyn RegistrationApi>,
    hardware: Option<Arc<dyn HardwareIdProvider>>,
}

impl IdentityRegistry {
    #[must_use]
    pub fn new(store: Arc<HybridStore>, keys: StoreKeys, api: Arc<dyn RegistrationApi>) -> Self {
        Self {
            store,
            keys,
            api,
            hardware: None,
        }
    }

    #[must_use]
    pub fn with_hardware_id(mut self, provider: Arc<dyn HardwareIdProvider>) -> Self {
        self.hardware = Some(provider);
        self
    }

    /// Return the device UUID, creating and persisting one on first use.
    ///
    /// Preference order: stored value, hardware-backed identifier, fresh
    /// random v4. Only the first call ever writes.
    pub async fn stable_uuid(&self) -> Result<String, IdentityError> {
        if let Some(cached) = self.store.get(&self.keys.device_uuid).await? {
            if cached.len() >= UUID_MIN_LEN {
                return Ok(cached);
            }
            debug!("stored device uuid too short, regenerating");
        }

        let uuid = self
            .hardware
            .as_ref()
            .and_then(|provider| provider.hardware_uuid())
            .filter(|value| value.len() >= UUID_MIN_LEN)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        self.store.set(&self.keys.device_uuid, &uuid).await?;
        info!("established device uuid");
        Ok(uuid)
    }

    /// Return the device number, registering with the fleet service on
    /// first use.
    ///
    /// The cached-number fast path is checked before any network attempt,
    /// so at most one successful remote registration happens per device
    /// lifetime. When the remote call fails the returned fallback number is
    /// a pure function of the UUID and is not cached.
    pub async fn register_device(&self, name: Option<&str>) -> Result<i32, IdentityError> {
        if let Some(number) = parse_number(self.store.get(&self.keys.device_number).await?) {
            return Ok(number);
        }

        let uuid = self.stable_uuid().await?;
        let request = DeviceRegisterRequest {
            device_uuid: uuid.clone(),
            device_name: name.map(str::to_string),
        };

        match self.api.register(&request).await {
            Ok(number) => {
                self.store
                    .set(&self.keys.device_number, &number.to_string())
                    .await?;
                info!(number, "device registered");
                Ok(number)
            }
            Err(error) => {
                let fallback = fallback_number(&uuid);
                warn!(%error, fallback, "device registration failed, using fallback number");
                Ok(fallback)
            }
        }
    }

    /// Resolve the full identity in one call: stable UUID plus the
    /// canonical or fallback number.
    pub async fn identity(&self, name: Option<&str>) -> Result<DeviceIdentity, IdentityError> {
        let uuid = self.stable_uuid().await?;
        let number = self.register_device(name).await?;
        Ok(DeviceIdentity {
            uuid,
            number: Some(number),
            name: name.map(str::to_string),
        })
    }

    /// Synchronous read of the cached device number. Best effort: consults
    /// only the ephemeral side of the store.
    #[must_use]
    pub fn cached_number(&self) -> Option<i32> {
        parse_number(self.store.get_cached(&self.keys.device_number))
    }

    /// Display form of the device number, or a pending sentinel while no
    /// number has been cached. Never performs I/O.
    #[must_use]
    pub fn display_id(&self) -> String {
        match self.cached_number() {
            Some(number) => format!("D{number}"),
            None => PENDING_DISPLAY_ID.to_string(),
        }
    }
}

/// Deterministic local device number for when the registry is unreachable:
/// a polynomial rolling hash of the UUID folded into `0..1000`. Matches the
/// numbers already in the field, so it must not change.
#[must_use]
pub fn fallback_number(uuid: &str) -> i32 {
    let mut hash: i32 = 0;
    for ch in uuid.chars() {
        hash = hash.wrapping_mul(31).wrapping_add(ch as i32);
    }
    (hash.unsigned_abs() % FALLBACK_NUMBER_SPACE) as i32
}

fn parse_number(value: Option<String>) -> Option<i32> {
    value.and_then(|raw| raw.trim().parse::<i32>().ok())
}

//! Device identity for the Fleetline client core.
//!
//! Every device carries a stable identifier pair: a UUID generated at most
//! once per device-storage-lifetime, and a small integer number assigned by
//! the fleet registry. The registry caches the number once assigned; while
//! the registry is unreachable a deterministic fallback number derived from
//! the UUID keeps the app usable without ever becoming canonical.

mod registration;
mod registry;

pub use registration::{
    DEFAULT_REGISTRY_BASE_URL, DEFAULT_REQUEST_ATTEMPTS, DEFAULT_TIMEOUT_MS,
    DeviceRegisterRequest, DeviceRegisterResponse, ENV_REGISTRY_BASE_URL, RegistrationApi,
    RegistrationClient, RegistrationClientConfig, RegistrationError, resolve_registry_base_url,
};
pub use registry::{
    DeviceIdentity, HardwareIdProvider, IdentityError, IdentityRegistry, PENDING_DISPLAY_ID,
    fallback_number,
};

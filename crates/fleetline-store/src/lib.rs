//! Hybrid key-value store for the Fleetline client core.
//!
//! Client state is duplicated across two backends with different durability
//! guarantees: a durable native store that survives app restarts and OS
//! memory pressure, and an ephemeral web-style store that is fast and
//! synchronous but not guaranteed to survive every platform condition.
//! [`HybridStore`] unifies them behind one get/set/remove contract and
//! reconciles them with a one-time migration pass at startup.

mod backend;
mod error;
mod hybrid;
mod keys;

pub use backend::{DurableBackend, EphemeralBackend, FileBackend, MemoryBackend};
pub use error::{Result, StoreError};
pub use hybrid::HybridStore;
pub use keys::StoreKeys;

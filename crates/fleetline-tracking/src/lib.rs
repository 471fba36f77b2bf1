//! Background location tracking for the Fleetline client core.
//!
//! The actual tracker is a long-lived native service reached through a
//! bridge; it keeps running even if the hosting process dies, so the
//! authoritative "is tracking" answer always lives on the native side. The
//! controller here orchestrates start/stop, tags outgoing reports with the
//! device identity, and turns the native layer's loosely formatted event
//! text into structured events for subscribers.

mod bridge;
mod controller;
mod event;
mod normalize;

pub use bridge::{
    BridgeAck, BridgeError, BridgePosition, BridgeStartConfig, NoopBridge,
    RAW_EVENT_CHANNEL_CAPACITY, TrackingBridge,
};
pub use controller::{
    SessionState, TrackingConfig, TrackingController, TrackingError, WatchCallback, WatchHandle,
};
pub use event::{GeofenceEvent, LocationSample, ParseError, TrackingEvent, decode_event};
pub use normalize::normalize;

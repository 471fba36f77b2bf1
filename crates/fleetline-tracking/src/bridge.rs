//! Native tracking bridge seam.
//!
//! The background tracker is platform-provided (foreground service, exact
//! alarms) and owns the authoritative running state, which can outlive the
//! hosting process. This module defines the capability interface the
//! controller talks to, plus the inert implementation used on platforms
//! without a native tracker, so controller logic stays platform-agnostic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::event::LocationSample;

/// Fan-out buffer for raw event text. Watches that fall this far behind
/// start skipping events rather than stalling the producer.
pub const RAW_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Request/response ack from the native start/stop operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeAck {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

/// Configuration handed to the native start operation: where to report,
/// how to authenticate, and which device the reports belong to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeStartConfig {
    pub endpoint: String,
    pub auth_token: String,
    pub device_uuid: String,
    pub device_number: Option<i32>,
    pub device_name: Option<String>,
    pub interval_seconds: u32,
}

/// Wire shape of the native `getLastPosition` response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgePosition {
    pub has_position: bool,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl BridgePosition {
    /// Convert to a sample, `None` when the bridge reports no position or
    /// the coordinates are incomplete.
    #[must_use]
    pub fn into_sample(self) -> Option<LocationSample> {
        if !self.has_position {
            return None;
        }
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(LocationSample {
                latitude,
                longitude,
                timestamp_ms: self.timestamp.unwrap_or(0),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("native tracking bridge unavailable")]
    Unavailable,
    #[error("bridge call failed: {0}")]
    Call(String),
}

/// Capability interface over the platform's background tracker.
#[async_trait]
pub trait TrackingBridge: Send + Sync {
    async fn start_tracking(&self, config: &BridgeStartConfig) -> Result<BridgeAck, BridgeError>;
    async fn stop_tracking(&self) -> Result<BridgeAck, BridgeError>;
    /// Authoritative running state. Must round-trip to the native layer
    /// because the service can keep running across a process restart.
    async fn is_tracking(&self) -> Result<bool, BridgeError>;
    async fn last_position(&self) -> Result<Option<LocationSample>, BridgeError>;
    /// Subscribe to the raw, loosely formatted event text the native layer
    /// emits. Each subscription is independent.
    fn raw_events(&self) -> broadcast::Receiver<String>;
}

/// Bridge for platforms without a native tracker. Start reports failure,
/// stop is a no-op, status is never tracking, and the event stream stays
/// open but silent.
pub struct NoopBridge {
    events: broadcast::Sender<String>,
}

impl NoopBridge {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(RAW_EVENT_CHANNEL_CAPACITY);
        Self { events }
    }
}

impl Default for NoopBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrackingBridge for NoopBridge {
    async fn start_tracking(&self, _config: &BridgeStartConfig) -> Result<BridgeAck, BridgeError> {
        Ok(BridgeAck {
            success: false,
            message: "native tracking unavailable on this platform".to_string(),
        })
    }

    async fn stop_tracking(&self) -> Result<BridgeAck, BridgeError> {
        Ok(BridgeAck {
            success: true,
            message: String::new(),
        })
    }

    async fn is_tracking(&self) -> Result<bool, BridgeError> {
        Ok(false)
    }

    async fn last_position(&self) -> Result<Option<LocationSample>, BridgeError> {
        Ok(None)
    }

    fn raw_events(&self) -> broadcast::Receiver<String> {
        self.events.subscribe()
    }
}

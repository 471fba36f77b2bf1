//! Structured tracking events decoded from raw payload text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::normalize::normalize;

/// A position produced by the native bridge. The controller never
/// synthesizes one of these.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, rename = "timestampMillis", alias = "timestamp")]
    pub timestamp_ms: i64,
}

/// A geofence boundary crossing reported by the native layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceEvent {
    pub action: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Event delivered to `watch_position` subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingEvent {
    Position(LocationSample),
    Geofence(GeofenceEvent),
    /// A payload that stayed unparsable after normalization. Delivered so
    /// subscribers can surface diagnostics; the payload itself is dropped.
    Error { message: String },
}

/// Payload unparsable even after normalization. Not fatal: the event is
/// logged and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("payload parse failed: {message}")]
pub struct ParseError {
    pub message: String,
}

/// Wire shape of the loosely formatted event text. The native layer is not
/// consistent about field names across versions, hence the aliases.
#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default, alias = "lat")]
    latitude: Option<f64>,
    #[serde(default, alias = "lng", alias = "lon")]
    longitude: Option<f64>,
    #[serde(default, alias = "timestampMillis")]
    timestamp: Option<i64>,
    #[serde(default)]
    action: Option<String>,
}

/// Normalize raw payload text and decode it into a structured event.
pub fn decode_event(raw: &str) -> Result<TrackingEvent, ParseError> {
    let normalized = normalize(raw);
    let event: RawEvent =
        serde_json::from_str(&normalized).map_err(|error| ParseError {
            message: error.to_string(),
        })?;

    let (latitude, longitude) = match (event.latitude, event.longitude) {
        (Some(latitude), Some(longitude)) => (latitude, longitude),
        _ => {
            return Err(ParseError {
                message: "payload missing latitude/longitude".to_string(),
            });
        }
    };

    if let Some(action) = event.action {
        return Ok(TrackingEvent::Geofence(GeofenceEvent {
            action,
            latitude,
            longitude,
        }));
    }

    Ok(TrackingEvent::Position(LocationSample {
        latitude,
        longitude,
        timestamp_ms: event.timestamp.unwrap_or(0),
    }))
}

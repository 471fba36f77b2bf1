//! Tracking session orchestration.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use fleetline_identity::{IdentityError, IdentityRegistry};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{debug, info, warn};

use crate::bridge::{BridgeError, BridgeStartConfig, TrackingBridge};
use crate::event::{LocationSample, TrackingEvent, decode_event};

/// Advisory session state. The authoritative "is tracking" answer lives in
/// the native layer and survives process death, so status queries go
/// through [`TrackingController::is_active`] rather than this value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Stopping,
    Error(String),
}

impl SessionState {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Error(_) => "error",
        }
    }
}

/// Caller-supplied tracking configuration; the controller adds the device
/// identity before handing it to the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingConfig {
    pub endpoint: String,
    pub auth_token: String,
    pub interval_seconds: u32,
    pub device_name: Option<String>,
}

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("tracking start rejected: {0}")]
    StartRejected(String),
    #[error("tracking stop rejected: {0}")]
    StopRejected(String),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Callback receiving structured tracking events.
pub type WatchCallback = Arc<dyn Fn(TrackingEvent) + Send + Sync>;

/// Orchestrates the background tracking session.
pub struct TrackingController {
    bridge: Arc<dyn TrackingBridge>,
    identity: Arc<IdentityRegistry>,
    state: RwLock<SessionState>,
    // Single-slot lock making start/stop mutually exclusive; a second
    // start cannot race a first one into two native start calls.
    lifecycle: Mutex<()>,
}

impl TrackingController {
    #[must_use]
    pub fn new(bridge: Arc<dyn TrackingBridge>, identity: Arc<IdentityRegistry>) -> Self {
        Self {
            bridge,
            identity,
            state: RwLock::new(SessionState::Idle),
            lifecycle: Mutex::new(()),
        }
    }

    /// Current advisory state.
    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// Resolve the device identity and start the native tracker.
    ///
    /// `Error` state is re-enterable: a failed start may be retried.
    pub async fn start(&self, config: &TrackingConfig) -> Result<(), TrackingError> {
        let _slot = self.lifecycle.lock().await;
        *self.state.write().await = SessionState::Starting;

        let identity = match self.identity.identity(config.device_name.as_deref()).await {
            Ok(identity) => identity,
            Err(error) => {
                *self.state.write().await = SessionState::Error(error.to_string());
                return Err(error.into());
            }
        };

        let payload = BridgeStartConfig {
            endpoint: config.endpoint.clone(),
            auth_token: config.auth_token.clone(),
            device_uuid: identity.uuid,
            device_number: identity.number,
            device_name: identity.name,
            interval_seconds: config.interval_seconds,
        };

        match self.bridge.start_tracking(&payload).await {
            Ok(ack) if ack.success => {
                *self.state.write().await = SessionState::Running;
                info!("tracking session started");
                Ok(())
            }
            Ok(ack) => {
                warn!(message = %ack.message, "native start rejected");
                *self.state.write().await = SessionState::Error(ack.message.clone());
                Err(TrackingError::StartRejected(ack.message))
            }
            Err(error) => {
                warn!(%error, "native start call failed");
                *self.state.write().await = SessionState::Error(error.to_string());
                Err(error.into())
            }
        }
    }

    /// Stop the native tracker. Best effort: the session returns to `Idle`
    /// whatever the native layer reports, so a later start is never
    /// blocked by a failed stop.
    pub async fn stop(&self) -> Result<(), TrackingError> {
        let _slot = self.lifecycle.lock().await;
        *self.state.write().await = SessionState::Stopping;

        let result = self.bridge.stop_tracking().await;
        *self.state.write().await = SessionState::Idle;

        match result {
            Ok(ack) if ack.success => {
                info!("tracking session stopped");
                Ok(())
            }
            Ok(ack) => {
                warn!(message = %ack.message, "native stop reported failure");
                Err(TrackingError::StopRejected(ack.message))
            }
            Err(error) => {
                warn!(%error, "native stop call failed");
                Err(error.into())
            }
        }
    }

    /// Whether the background tracker is running right now. Always
    /// re-queries the bridge: the service may have kept running after the
    /// hosting process was killed and restarted.
    pub async fn is_active(&self) -> bool {
        match self.bridge.is_tracking().await {
            Ok(running) => running,
            Err(error) => {
                debug!(%error, "is_tracking query failed, reporting inactive");
                false
            }
        }
    }

    /// The bridge's cached last position, if any.
    pub async fn last_known_position(&self) -> Option<LocationSample> {
        match self.bridge.last_position().await {
            Ok(position) => position,
            Err(error) => {
                debug!(%error, "last_position query failed");
                None
            }
        }
    }

    /// Subscribe to the continuous event stream. Each raw payload is
    /// normalized and decoded; unparsable payloads are logged, dropped,
    /// and surfaced to the subscriber as [`TrackingEvent::Error`].
    ///
    /// Watches are independent of one another and of start/stop. The
    /// returned handle cancels only its own subscription; dropping the
    /// handle without cancelling leaves the watch running.
    pub fn watch_position(&self, on_event: WatchCallback) -> WatchHandle {
        let mut receiver = self.bridge.raw_events();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(raw) => {
                        if flag.load(Ordering::SeqCst) {
                            break;
                        }
                        match decode_event(&raw) {
                            Ok(event) => on_event(event),
                            Err(error) => {
                                warn!(%error, "dropping malformed tracking payload");
                                on_event(TrackingEvent::Error {
                                    message: error.to_string(),
                                });
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "position watch lagging, events skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        WatchHandle { cancelled, task }
    }
}

/// Cancellation handle for a position watch.
pub struct WatchHandle {
    cancelled: Arc<AtomicBool>,
    task: tokio::task::JoinHandle<()>,
}

impl WatchHandle {
    /// Stop delivery to this watch. Safe to call repeatedly; calls after
    /// the first are no-ops.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.task.abort();
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

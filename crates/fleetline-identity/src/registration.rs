//! HTTP client for the fleet registration service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_REGISTRY_BASE_URL: &str = "https://fleet.fleetline.app";
pub const ENV_REGISTRY_BASE_URL: &str = "FLEETLINE_REGISTRY_BASE_URL";

/// A hang during registration must not block app startup, so every request
/// carries an explicit timeout and a bounded number of attempts.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_REQUEST_ATTEMPTS: usize = 2;

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("registry_base_url_missing")]
    BaseUrlMissing,
    #[error("registry_base_url_invalid")]
    InvalidBaseUrl,
    #[error("registry_request_failed:{message}")]
    Request { message: String },
    #[error("registry_http_{status}:{body}")]
    Http { status: StatusCode, body: String },
    #[error("registry_json_decode_failed:{message}")]
    Decode { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRegisterRequest {
    pub device_uuid: String,
    pub device_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRegisterResponse {
    pub device_number: i32,
}

/// Seam over the remote registration call so the registry can be exercised
/// without a network.
#[async_trait]
pub trait RegistrationApi: Send + Sync {
    async fn register(
        &self,
        request: &DeviceRegisterRequest,
    ) -> Result<i32, RegistrationError>;
}

#[derive(Debug, Clone)]
pub struct RegistrationClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub request_attempts: usize,
}

impl RegistrationClientConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            request_attempts: DEFAULT_REQUEST_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegistrationClient {
    base_url: String,
    timeout: Duration,
    request_attempts: usize,
    http: reqwest::Client,
}

impl RegistrationClient {
    pub fn new(config: RegistrationClientConfig) -> Result<Self, RegistrationError> {
        let base_url = normalize_base_url(&config.base_url)?;
        Ok(Self {
            base_url,
            timeout: Duration::from_millis(config.timeout_ms),
            request_attempts: config.request_attempts.max(1),
            http: reqwest::Client::new(),
        })
    }

    /// Build a client from the environment, falling back to the production
    /// registry. Returns the resolved base URL source for diagnostics.
    pub fn from_env() -> Result<(Self, &'static str), RegistrationError> {
        let (base_url, source) = resolve_registry_base_url()?;
        let client = Self::new(RegistrationClientConfig::new(base_url))?;
        Ok((client, source))
    }

    #[must_use]
    pub fn register_path() -> &'static str {
        "/api/v1/devices/register"
    }

    #[must_use]
    pub fn endpoint(&self, path: &str) -> Option<String> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with('/') {
            Some(format!("{}{}", self.base_url, trimmed))
        } else {
            Some(format!("{}/{}", self.base_url, trimmed))
        }
    }

    async fn post_json<Req, Res>(&self, path: &str, payload: &Req) -> Result<Res, RegistrationError>
    where
        Req: Serialize + ?Sized,
        Res: for<'de> serde::Deserialize<'de>,
    {
        let url = self
            .endpoint(path)
            .ok_or(RegistrationError::InvalidBaseUrl)?;
        let mut last_error: Option<String> = None;

        for attempt in 0..self.request_attempts {
            let request = self
                .http
                .post(url.as_str())
                .timeout(self.timeout)
                .json(payload);

            match request.send().await {
                Ok(response) => return decode_json_response(response).await,
                Err(error) => {
                    last_error = Some(error.to_string());
                    if attempt + 1 >= self.request_attempts {
                        break;
                    }
                }
            }
        }

        Err(RegistrationError::Request {
            message: last_error.unwrap_or_else(|| "unknown".to_string()),
        })
    }
}

#[async_trait]
impl RegistrationApi for RegistrationClient {
    async fn register(
        &self,
        request: &DeviceRegisterRequest,
    ) -> Result<i32, RegistrationError> {
        let response: DeviceRegisterResponse =
            self.post_json(Self::register_path(), request).await?;
        Ok(response.device_number)
    }
}

/// Resolve the registry base URL from the environment, reporting which
/// source won so startup logs can explain surprising routing.
pub fn resolve_registry_base_url() -> Result<(String, &'static str), RegistrationError> {
    if let Some(base_url) = env_non_empty(ENV_REGISTRY_BASE_URL) {
        return normalize_base_url(&base_url).map(|normalized| (normalized, ENV_REGISTRY_BASE_URL));
    }
    normalize_base_url(DEFAULT_REGISTRY_BASE_URL).map(|normalized| (normalized, "default"))
}

fn normalize_base_url(raw: &str) -> Result<String, RegistrationError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(RegistrationError::BaseUrlMissing);
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(RegistrationError::InvalidBaseUrl);
    }
    let Some((_, remainder)) = trimmed.split_once("://") else {
        return Err(RegistrationError::InvalidBaseUrl);
    };
    if remainder.trim().is_empty() || remainder.starts_with('/') {
        return Err(RegistrationError::InvalidBaseUrl);
    }
    Ok(trimmed.to_string())
}

async fn decode_json_response<T>(response: reqwest::Response) -> Result<T, RegistrationError>
where
    T: for<'de> serde::Deserialize<'de>,
{
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|error| RegistrationError::Request {
            message: error.to_string(),
        })?;

    if !status.is_success() {
        let body = String::from_utf8_lossy(&bytes).trim().to_string();
        let body = if body.is_empty() {
            "<empty>".to_string()
        } else {
            body
        };
        return Err(RegistrationError::Http { status, body });
    }

    serde_json::from_slice::<T>(&bytes).map_err(|error| RegistrationError::Decode {
        message: error.to_string(),
    })
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, OnceLock};

    use super::*;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn with_env<T>(value: Option<&str>, test: impl FnOnce() -> T) -> T {
        let lock = ENV_LOCK.get_or_init(|| Mutex::new(()));
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let previous = std::env::var(ENV_REGISTRY_BASE_URL).ok();
        if let Some(value) = value {
            unsafe { std::env::set_var(ENV_REGISTRY_BASE_URL, value) };
        } else {
            unsafe { std::env::remove_var(ENV_REGISTRY_BASE_URL) };
        }

        let result = test();

        if let Some(value) = previous {
            unsafe { std::env::set_var(ENV_REGISTRY_BASE_URL, value) };
        } else {
            unsafe { std::env::remove_var(ENV_REGISTRY_BASE_URL) };
        }

        result
    }

    #[test]
    fn endpoint_builder_normalizes_paths() {
        let client = RegistrationClient::new(RegistrationClientConfig::new(
            "https://fleet.example.com/",
        ))
        .expect("registration client");

        assert_eq!(
            client.endpoint("/api/v1/devices/register"),
            Some("https://fleet.example.com/api/v1/devices/register".to_string())
        );
        assert_eq!(
            client.endpoint("api/v1/devices/register"),
            Some("https://fleet.example.com/api/v1/devices/register".to_string())
        );
        assert_eq!(client.endpoint(""), None);
    }

    #[test]
    fn base_url_must_carry_http_scheme_and_host() {
        assert!(matches!(
            RegistrationClient::new(RegistrationClientConfig::new("   ")),
            Err(RegistrationError::BaseUrlMissing)
        ));
        assert!(matches!(
            RegistrationClient::new(RegistrationClientConfig::new("fleet.example.com")),
            Err(RegistrationError::InvalidBaseUrl)
        ));
        assert!(matches!(
            RegistrationClient::new(RegistrationClientConfig::new("https:///register")),
            Err(RegistrationError::InvalidBaseUrl)
        ));
    }

    #[test]
    fn registry_base_url_defaults_to_production() {
        with_env(None, || {
            let (resolved, source) = resolve_registry_base_url().expect("resolved");
            assert_eq!(resolved, DEFAULT_REGISTRY_BASE_URL);
            assert_eq!(source, "default");
        });
    }

    #[test]
    fn registry_base_url_respects_env_override() {
        with_env(Some("https://staging.fleetline.app/"), || {
            let (resolved, source) = resolve_registry_base_url().expect("resolved");
            assert_eq!(resolved, "https://staging.fleetline.app");
            assert_eq!(source, ENV_REGISTRY_BASE_URL);
        });
    }

    #[test]
    fn register_request_serializes_null_name() {
        let request = DeviceRegisterRequest {
            device_uuid: "uuid-1".to_string(),
            device_name: None,
        };
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({ "device_uuid": "uuid-1", "device_name": null })
        );
    }
}

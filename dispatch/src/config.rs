use crate::devices::DeviceRecord;
use http::header::HeaderName;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Endpoint path must start with '/': {0}")]
    InvalidEndpointPath(String),

    #[error("max_store_sessions must be greater than 0")]
    NoStoreSessions,

    #[error("max_store_sessions cannot exceed {max}: {0}", max = MAX_STORE_SESSIONS)]
    TooManyStoreSessions(usize),

    #[error("Device store timeout must be greater than 0")]
    InvalidStoreTimeout,

    #[error("Push timeout must be greater than 0")]
    InvalidPushTimeout,

    #[error("Empty identity header name")]
    EmptyIdentityHeader,

    #[error("Invalid identity header name: {0}")]
    InvalidIdentityHeader(String),
}

/// Upper bound for `max_store_sessions`.
pub const MAX_STORE_SESSIONS: usize = 4096;

/// Dispatch service configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Main listener for incoming requests
    pub listener: Listener,
    /// Admin listener for health and readiness probes
    pub admin_listener: Listener,
    /// Path the send endpoint is served on
    #[serde(default = "default_endpoint_path")]
    pub endpoint_path: String,
    pub identity: IdentityConfig,
    pub device_store: DeviceStoreConfig,
    /// Upper bound on concurrently checked out device store sessions
    #[serde(default = "default_max_store_sessions")]
    pub max_store_sessions: usize,
    pub push: PushConfig,
}

impl Config {
    /// Validates the dispatch configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if !self.endpoint_path.starts_with('/') {
            return Err(ValidationError::InvalidEndpointPath(
                self.endpoint_path.clone(),
            ));
        }

        if self.max_store_sessions == 0 {
            return Err(ValidationError::NoStoreSessions);
        }
        if self.max_store_sessions > MAX_STORE_SESSIONS {
            return Err(ValidationError::TooManyStoreSessions(
                self.max_store_sessions,
            ));
        }

        if let DeviceStoreConfig::Http { timeout_secs: 0, .. } = self.device_store {
            return Err(ValidationError::InvalidStoreTimeout);
        }

        let header = self.identity.header.trim();
        if header.is_empty() {
            return Err(ValidationError::EmptyIdentityHeader);
        }
        if HeaderName::from_bytes(header.as_bytes()).is_err() {
            return Err(ValidationError::InvalidIdentityHeader(
                self.identity.header.clone(),
            ));
        }

        if self.push.timeout_secs == 0 {
            return Err(ValidationError::InvalidPushTimeout);
        }

        Ok(())
    }
}

fn default_endpoint_path() -> String {
    "/send".into()
}

fn default_max_store_sessions() -> usize {
    16
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct IdentityConfig {
    /// Header carrying the authenticated identity, set by the fronting auth proxy
    #[serde(default = "default_identity_header")]
    pub header: String,
    /// Login page of the identity provider. Unauthenticated legacy clients are
    /// redirected here with a `continue` parameter.
    pub login_url: Url,
}

fn default_identity_header() -> String {
    "x-authenticated-user".into()
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum DeviceStoreConfig {
    /// JSON file containing a list of device records, loaded at startup
    Filesystem { path: String },
    /// Device records listed inline in the config
    Static { devices: Vec<DeviceRecord> },
    /// Remote registration service queried per lookup
    Http {
        url: Url,
        #[serde(default = "default_store_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_store_timeout_secs() -> u64 {
    5
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PushConfig {
    /// Send endpoint of the push messaging service
    pub url: Url,
    pub auth_token: String,
    #[serde(default = "default_push_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_push_timeout_secs() -> u64 {
    10
}

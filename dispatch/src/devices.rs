//! Read-only access to device registrations.
//!
//! Registrations are owned by an external store. Lookups go through a
//! [`DevicePool`], which bounds the number of concurrent sessions and hands
//! out a [`DeviceSession`] per request. The session's permit is returned to
//! the pool when the session is dropped.
use crate::metrics_defs::DEVICE_STORE_SESSIONS;
use async_trait::async_trait;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use shared::gauge;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum DeviceStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("device store lookup timed out")]
    Timeout,

    #[error("unexpected status from device store: {0}")]
    UnexpectedStatus(StatusCode),

    #[error("more than one device registered for {0}")]
    DuplicateIdentity(String),

    #[error("device store session pool is closed")]
    PoolClosed,
}

/// Association between a user identity and a device's push registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub owner_identity: String,
    pub registration_id: String,
    #[serde(default)]
    pub debug: bool,
}

#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Exact-match lookup of the device registered for `identity`.
    async fn find_device(&self, identity: &str) -> Result<Option<DeviceRecord>, DeviceStoreError>;

    fn is_ready(&self) -> bool {
        true
    }
}

/// In-memory registrations, either listed in config or loaded from a JSON file.
pub struct StaticDeviceStore {
    devices: HashMap<String, DeviceRecord>,
}

impl StaticDeviceStore {
    pub fn new(records: Vec<DeviceRecord>) -> Result<Self, DeviceStoreError> {
        let mut devices = HashMap::with_capacity(records.len());
        for record in records {
            let identity = record.owner_identity.clone();
            if devices.insert(identity.clone(), record).is_some() {
                return Err(DeviceStoreError::DuplicateIdentity(identity));
            }
        }

        Ok(StaticDeviceStore { devices })
    }

    pub fn from_file(path: &Path) -> Result<Self, DeviceStoreError> {
        let file = File::open(path)?;
        let records: Vec<DeviceRecord> = serde_json::from_reader(BufReader::new(file))?;
        tracing::info!(
            path = %path.display(),
            devices = records.len(),
            "Loaded device registrations"
        );
        Self::new(records)
    }
}

#[async_trait]
impl DeviceStore for StaticDeviceStore {
    async fn find_device(&self, identity: &str) -> Result<Option<DeviceRecord>, DeviceStoreError> {
        Ok(self.devices.get(identity).cloned())
    }
}

/// Looks up registrations from a remote registration service.
///
/// `GET <url>?identity=<id>` returns the record as JSON, or 404 when the
/// identity has no device. Each lookup, body included, is bounded by
/// `timeout` since it holds a pool session while in flight.
pub struct HttpDeviceStore {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl HttpDeviceStore {
    pub fn new(url: Url, timeout: Duration) -> Self {
        HttpDeviceStore {
            client: reqwest::Client::new(),
            url,
            timeout,
        }
    }

    async fn lookup(&self, identity: &str) -> Result<Option<DeviceRecord>, DeviceStoreError> {
        let response = self
            .client
            .get(self.url.clone())
            .query(&[("identity", identity)])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let record = response.json::<DeviceRecord>().await?;
                // The key is exact-match; anything else is not this caller's device.
                if record.owner_identity == identity {
                    Ok(Some(record))
                } else {
                    Ok(None)
                }
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(DeviceStoreError::UnexpectedStatus(status)),
        }
    }
}

#[async_trait]
impl DeviceStore for HttpDeviceStore {
    async fn find_device(&self, identity: &str) -> Result<Option<DeviceRecord>, DeviceStoreError> {
        tokio::time::timeout(self.timeout, self.lookup(identity))
            .await
            .map_err(|_| DeviceStoreError::Timeout)?
    }
}

/// Process-wide pool of device store sessions.
#[derive(Clone)]
pub struct DevicePool {
    store: Arc<dyn DeviceStore>,
    permits: Arc<Semaphore>,
    max_sessions: usize,
}

impl DevicePool {
    pub fn new(store: Arc<dyn DeviceStore>, max_sessions: usize) -> Self {
        DevicePool {
            store,
            permits: Arc::new(Semaphore::new(max_sessions)),
            max_sessions,
        }
    }

    /// Waits for a free session.
    pub async fn acquire(&self) -> Result<DeviceSession, DeviceStoreError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DeviceStoreError::PoolClosed)?;
        gauge!(DEVICE_STORE_SESSIONS).increment(1.0);

        Ok(DeviceSession {
            store: self.store.clone(),
            _permit: permit,
        })
    }

    pub fn sessions_in_use(&self) -> usize {
        self.max_sessions - self.permits.available_permits()
    }

    pub fn is_ready(&self) -> bool {
        !self.permits.is_closed() && self.store.is_ready()
    }
}

/// A checked out session. Dropping it releases the session back to the pool.
pub struct DeviceSession {
    store: Arc<dyn DeviceStore>,
    _permit: OwnedSemaphorePermit,
}

impl DeviceSession {
    pub async fn find_device(
        &self,
        identity: &str,
    ) -> Result<Option<DeviceRecord>, DeviceStoreError> {
        self.store.find_device(identity).await
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        gauge!(DEVICE_STORE_SESSIONS).decrement(1.0);
    }
}

use crate::config::IdentityConfig;
use crate::devices::{DeviceRecord, DeviceStore, DeviceStoreError};
use crate::identity::HeaderIdentityProvider;
use crate::protocol::MARKER_HEADER;
use crate::push::{PushError, PushMessage, PushTransport};
use async_trait::async_trait;
use http::StatusCode;
use hyper::Request;
use hyper::body::Bytes;
use std::sync::Mutex;
use url::Url;

pub const TEST_IDENTITY_HEADER: &str = "x-authenticated-user";

pub fn test_identity_provider() -> HeaderIdentityProvider {
    HeaderIdentityProvider::new(&IdentityConfig {
        header: TEST_IDENTITY_HEADER.into(),
        login_url: Url::parse("https://accounts.example.com/login").unwrap(),
    })
    .unwrap()
}

/// GET `/send?<query>`, optionally with the marker header and an authenticated identity.
pub fn send_request(query: &str, with_marker: bool, identity: Option<&str>) -> Request<Bytes> {
    let mut builder = Request::builder().uri(format!("/send?{query}"));
    if with_marker {
        builder = builder.header(MARKER_HEADER, "1");
    }
    if let Some(identity) = identity {
        builder = builder.header(TEST_IDENTITY_HEADER, identity);
    }
    builder.body(Bytes::new()).unwrap()
}

/// Push transport that records every message it is asked to send.
pub struct RecordingTransport {
    succeed: bool,
    sent: Mutex<Vec<PushMessage>>,
}

impl RecordingTransport {
    pub fn succeeding() -> Self {
        RecordingTransport {
            succeed: true,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        RecordingTransport {
            succeed: false,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<PushMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushTransport for RecordingTransport {
    async fn send_no_retry(&self, message: &PushMessage) -> Result<(), PushError> {
        self.sent.lock().unwrap().push(message.clone());
        match self.succeed {
            true => Ok(()),
            false => Err(PushError::Rejected("QuotaExceeded".into())),
        }
    }
}

/// Device store whose lookups always fail.
pub struct FailingDeviceStore;

#[async_trait]
impl DeviceStore for FailingDeviceStore {
    async fn find_device(&self, _identity: &str) -> Result<Option<DeviceRecord>, DeviceStoreError> {
        Err(DeviceStoreError::UnexpectedStatus(
            StatusCode::SERVICE_UNAVAILABLE,
        ))
    }

    fn is_ready(&self) -> bool {
        false
    }
}

//! Push delivery to a registered device.
use crate::config::PushConfig;
use crate::devices::DeviceRecord;
use crate::protocol::LinkRequest;
use async_trait::async_trait;
use http::StatusCode;
use http::header::AUTHORIZATION;
use indexmap::IndexMap;
use std::time::Duration;
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum PushError {
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("push service returned status {0}")]
    UnexpectedStatus(StatusCode),

    #[error("push service rejected the message: {0}")]
    Rejected(String),

    #[error("push service timed out")]
    Timeout,
}

/// A single message addressed to one device.
#[derive(Clone, Debug, PartialEq)]
pub struct PushMessage {
    pub registration_id: String,
    pub collapse_key: String,
    pub data: IndexMap<String, String>,
}

impl PushMessage {
    pub fn for_link(device: &DeviceRecord, link: &LinkRequest) -> Self {
        let mut data = IndexMap::new();
        data.insert("url".to_string(), link.url.clone());
        data.insert("title".to_string(), link.title.clone());
        data.insert("sel".to_string(), link.selection.clone());
        if device.debug {
            data.insert("debug".to_string(), "1".to_string());
        }

        PushMessage {
            registration_id: device.registration_id.clone(),
            collapse_key: collapse_key(&link.url),
            data,
        }
    }
}

/// Collapse key for a link: 32-bit polynomial hash (`h = 31 * h + unit`) over
/// the UTF-16 code units of the URL, wrapping, printed as signed decimal.
///
/// Keys must stay stable across releases since the push service coalesces on them.
pub fn collapse_key(url: &str) -> String {
    url.encode_utf16()
        .fold(0i32, |hash, unit| {
            hash.wrapping_mul(31).wrapping_add(i32::from(unit))
        })
        .to_string()
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Makes exactly one delivery attempt.
    async fn send_no_retry(&self, message: &PushMessage) -> Result<(), PushError>;
}

/// Sends messages through a C2DM-style HTTP endpoint.
pub struct C2dmTransport {
    client: reqwest::Client,
    url: Url,
    auth_token: String,
    timeout: Duration,
}

impl C2dmTransport {
    pub fn new(config: &PushConfig) -> Self {
        C2dmTransport {
            client: reqwest::Client::new(),
            url: config.url.clone(),
            auth_token: config.auth_token.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn form_fields(message: &PushMessage) -> Vec<(String, &str)> {
        let mut fields = vec![
            ("registration_id".to_string(), message.registration_id.as_str()),
            ("collapse_key".to_string(), message.collapse_key.as_str()),
        ];
        for (key, value) in &message.data {
            fields.push((format!("data.{key}"), value.as_str()));
        }
        fields
    }
}

#[async_trait]
impl PushTransport for C2dmTransport {
    async fn send_no_retry(&self, message: &PushMessage) -> Result<(), PushError> {
        let exchange = async {
            let response = self
                .client
                .post(self.url.clone())
                .header(AUTHORIZATION, format!("GoogleLogin auth={}", self.auth_token))
                .form(&Self::form_fields(message))
                .send()
                .await?;

            let status = response.status();
            if status != StatusCode::OK {
                return Err(PushError::UnexpectedStatus(status));
            }

            Ok(response.text().await?)
        };

        // Covers the response body as well as the headers
        let body = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| PushError::Timeout)??;

        let line = body.lines().next().unwrap_or("").trim();
        if let Some(code) = line.strip_prefix("Error=") {
            return Err(PushError::Rejected(code.to_string()));
        }
        if !line.starts_with("id=") {
            return Err(PushError::Rejected(line.to_string()));
        }

        tracing::debug!(message_id = &line[3..], "Push service accepted message");
        Ok(())
    }
}

use crate::config::ValidationError;
use crate::devices::DeviceStoreError;
use crate::identity::InvalidHeaderName;
use thiserror::Error;

/// Errors that can occur while running the dispatch service
///
/// Failures while handling a send request are turned into responses by the
/// handler; only startup and connection level failures surface here.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Failed to read request body: {0}")]
    RequestBodyError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),

    #[error("Identity provider error: {0}")]
    Identity(#[from] InvalidHeaderName),

    #[error("Device store error: {0}")]
    DeviceStore(#[from] DeviceStoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

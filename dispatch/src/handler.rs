use crate::devices::{DevicePool, DeviceRecord, DeviceStoreError};
use crate::identity::{Identity, IdentityProvider};
use crate::params::InboundRequest;
use crate::protocol::{
    DispatchResult, LinkRequest, MARKER_HEADER, Outcome, ProtocolVersion, ValidationFailure,
};
use crate::push::{PushMessage, PushTransport};
use hyper::Request;
use hyper::body::Bytes;
use hyper::Response;
use std::sync::Arc;

/// Validates a send request, resolves the caller and their device, and makes
/// a single push delivery attempt.
pub struct LinkDispatchHandler {
    identity: Arc<dyn IdentityProvider>,
    devices: DevicePool,
    push: Arc<dyn PushTransport>,
}

impl LinkDispatchHandler {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        devices: DevicePool,
        push: Arc<dyn PushTransport>,
    ) -> Self {
        LinkDispatchHandler {
            identity,
            devices,
            push,
        }
    }

    pub async fn handle(&self, request: Request<Bytes>) -> Response<Bytes> {
        let inbound = InboundRequest::from_request(request);
        self.dispatch(&inbound).await.into_response()
    }

    pub async fn dispatch(&self, request: &InboundRequest) -> Outcome {
        let link = match validate(request) {
            Ok(link) => link,
            Err(failure) => {
                return Outcome::new(
                    ProtocolVersion::Legacy,
                    DispatchResult::ValidationError(failure),
                );
            }
        };

        let result = match self.identity.current_identity(&request.headers) {
            Some(identity) => self.send_to_device(&link, &identity).await,
            None => DispatchResult::AuthenticationRequired {
                login_url: self.identity.login_url(&follow_on_url(&request.path, &link)),
            },
        };

        Outcome::new(link.version, result)
    }

    async fn send_to_device(&self, link: &LinkRequest, identity: &Identity) -> DispatchResult {
        let device = match self.find_device(identity).await {
            Ok(Some(device)) => device,
            Ok(None) => {
                tracing::warn!(identity = identity.as_str(), "Device not registered");
                return DispatchResult::DeviceNotRegistered;
            }
            Err(err) => {
                tracing::error!(identity = identity.as_str(), error = %err, "Device lookup failed");
                return DispatchResult::DeliveryFailure;
            }
        };

        let message = PushMessage::for_link(&device, link);
        match self.push.send_no_retry(&message).await {
            Ok(()) => {
                tracing::info!(collapse_key = %message.collapse_key, "Link sent to phone");
                DispatchResult::Sent
            }
            Err(err) => {
                tracing::warn!(error = %err, "Unable to send link to phone");
                DispatchResult::DeliveryFailure
            }
        }
    }

    async fn find_device(
        &self,
        identity: &Identity,
    ) -> Result<Option<DeviceRecord>, DeviceStoreError> {
        let session = self.devices.acquire().await?;
        // The session goes back to the pool when it drops at the end of this scope
        session.find_device(identity.as_str()).await
    }
}

fn validate(request: &InboundRequest) -> Result<LinkRequest, ValidationFailure> {
    if !request.headers.contains_key(MARKER_HEADER) {
        tracing::warn!("Missing X-Extension header");
        return Err(ValidationFailure::MissingMarkerHeader);
    }

    let version = ProtocolVersion::from_param(request.param("ver"));
    tracing::info!(version = ?version, "Extension version");

    let selection = request.param("sel").unwrap_or_default().to_string();

    match (request.param("url"), request.param("title")) {
        (Some(url), Some(title)) => Ok(LinkRequest {
            url: url.to_string(),
            title: title.to_string(),
            selection,
            version,
        }),
        _ => Err(ValidationFailure::MissingUrlOrTitle),
    }
}

/// This endpoint again, with the link re-encoded so that it is resubmitted
/// once the user has logged in.
fn follow_on_url(path: &str, link: &LinkRequest) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("title", &link.title)
        .append_pair("url", &link.url)
        .append_pair("sel", &link.selection)
        .finish();
    format!("{path}?{query}")
}

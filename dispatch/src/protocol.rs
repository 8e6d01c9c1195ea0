//! Response vocabulary of the send endpoint.
//!
//! Older extensions understand fewer status lines than current ones. The
//! version negotiated from the `ver` parameter decides how an outcome is
//! rendered; every version-dependent response shape lives in
//! [`Outcome::into_response`].
use http::header::{CONTENT_TYPE, HeaderValue, LOCATION};
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use shared::http::make_text_response;

/// Header whose presence marks a request from a supported extension.
pub const MARKER_HEADER: &str = "x-extension";

pub const OK_STATUS: &str = "OK";
pub const LOGIN_REQUIRED_STATUS: &str = "LOGIN_REQUIRED";
pub const DEVICE_NOT_REGISTERED_STATUS: &str = "DEVICE_NOT_REGISTERED";
pub const ERROR_STATUS: &str = "ERROR";

/// Protocol spoken by the extension, negotiated from the `ver` parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProtocolVersion {
    /// `ver` absent or 1. Login is a redirect; a missing device is an error.
    Legacy,
    /// `ver=2`: understands `LOGIN_REQUIRED`.
    LoginStatus,
    /// `ver>=3`: also understands `DEVICE_NOT_REGISTERED`.
    DeviceStatus,
}

impl ProtocolVersion {
    pub fn from_number(version: i64) -> Self {
        match version {
            i64::MIN..=1 => ProtocolVersion::Legacy,
            2 => ProtocolVersion::LoginStatus,
            _ => ProtocolVersion::DeviceStatus,
        }
    }

    /// Parses the raw `ver` parameter. Values that are not integers are
    /// treated as the legacy protocol.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw {
            None => ProtocolVersion::Legacy,
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(number) => Self::from_number(number),
                Err(_) => {
                    tracing::warn!(ver = raw, "Unparseable protocol version, assuming legacy");
                    ProtocolVersion::Legacy
                }
            },
        }
    }

    fn reports_login_required(self) -> bool {
        self >= ProtocolVersion::LoginStatus
    }

    fn reports_device_not_registered(self) -> bool {
        self >= ProtocolVersion::DeviceStatus
    }
}

/// A validated request to send a link.
#[derive(Clone, Debug, PartialEq)]
pub struct LinkRequest {
    pub url: String,
    pub title: String,
    pub selection: String,
    pub version: ProtocolVersion,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationFailure {
    MissingMarkerHeader,
    MissingUrlOrTitle,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DispatchResult {
    Sent,
    DeviceNotRegistered,
    AuthenticationRequired { login_url: String },
    ValidationError(ValidationFailure),
    DeliveryFailure,
}

impl DispatchResult {
    /// Tag value used for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchResult::Sent => "sent",
            DispatchResult::DeviceNotRegistered => "device_not_registered",
            DispatchResult::AuthenticationRequired { .. } => "authentication_required",
            DispatchResult::ValidationError(_) => "validation_error",
            DispatchResult::DeliveryFailure => "delivery_failure",
        }
    }
}

/// What the handler decided, along with the protocol it must be rendered in.
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome {
    pub version: ProtocolVersion,
    pub result: DispatchResult,
}

impl Outcome {
    pub fn new(version: ProtocolVersion, result: DispatchResult) -> Self {
        Outcome { version, result }
    }

    /// Status line and HTTP status for this outcome. Redirects have no status line.
    pub fn status(&self) -> (Option<String>, StatusCode) {
        match &self.result {
            DispatchResult::ValidationError(ValidationFailure::MissingMarkerHeader) => (
                Some(format!("{ERROR_STATUS} - Please upgrade your extension")),
                StatusCode::BAD_REQUEST,
            ),
            DispatchResult::ValidationError(ValidationFailure::MissingUrlOrTitle) => (
                Some(format!("{ERROR_STATUS} (Must specify url and title parameters)")),
                StatusCode::BAD_REQUEST,
            ),
            DispatchResult::AuthenticationRequired { .. } => {
                match self.version.reports_login_required() {
                    true => (Some(LOGIN_REQUIRED_STATUS.into()), StatusCode::OK),
                    false => (None, StatusCode::FOUND),
                }
            }
            DispatchResult::DeviceNotRegistered => {
                match self.version.reports_device_not_registered() {
                    true => (Some(DEVICE_NOT_REGISTERED_STATUS.into()), StatusCode::OK),
                    false => (
                        Some(format!("{ERROR_STATUS} (Device not registered)")),
                        StatusCode::BAD_REQUEST,
                    ),
                }
            }
            DispatchResult::Sent => (Some(OK_STATUS.into()), StatusCode::OK),
            DispatchResult::DeliveryFailure => (
                Some(format!("{ERROR_STATUS} (Unable to send link)")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        }
    }

    pub fn into_response(self) -> Response<Bytes> {
        match self.status() {
            (Some(line), status) => make_text_response(status, format!("{line}\n")),
            (None, status) => {
                let mut response = Response::new(Bytes::new());
                *response.status_mut() = status;
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
                if let DispatchResult::AuthenticationRequired { login_url } = &self.result
                    && let Ok(location) = HeaderValue::from_str(login_url)
                {
                    response.headers_mut().insert(LOCATION, location);
                }
                response
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(version: ProtocolVersion, result: DispatchResult) -> (StatusCode, String) {
        let response = Outcome::new(version, result).into_response();
        let body = String::from_utf8(response.body().to_vec()).unwrap();
        (response.status(), body)
    }

    #[test]
    fn test_version_from_param() {
        assert_eq!(ProtocolVersion::from_param(None), ProtocolVersion::Legacy);
        assert_eq!(ProtocolVersion::from_param(Some("1")), ProtocolVersion::Legacy);
        assert_eq!(ProtocolVersion::from_param(Some("0")), ProtocolVersion::Legacy);
        assert_eq!(ProtocolVersion::from_param(Some("-4")), ProtocolVersion::Legacy);
        assert_eq!(
            ProtocolVersion::from_param(Some("2")),
            ProtocolVersion::LoginStatus
        );
        assert_eq!(
            ProtocolVersion::from_param(Some("3")),
            ProtocolVersion::DeviceStatus
        );
        // No upper bound
        assert_eq!(
            ProtocolVersion::from_param(Some("42")),
            ProtocolVersion::DeviceStatus
        );
        assert_eq!(ProtocolVersion::from_param(Some("abc")), ProtocolVersion::Legacy);
        assert_eq!(ProtocolVersion::from_param(Some("")), ProtocolVersion::Legacy);
    }

    #[test]
    fn test_validation_responses() {
        for version in [
            ProtocolVersion::Legacy,
            ProtocolVersion::LoginStatus,
            ProtocolVersion::DeviceStatus,
        ] {
            assert_eq!(
                render(
                    version,
                    DispatchResult::ValidationError(ValidationFailure::MissingMarkerHeader)
                ),
                (
                    StatusCode::BAD_REQUEST,
                    "ERROR - Please upgrade your extension\n".to_string()
                )
            );
            assert_eq!(
                render(
                    version,
                    DispatchResult::ValidationError(ValidationFailure::MissingUrlOrTitle)
                ),
                (
                    StatusCode::BAD_REQUEST,
                    "ERROR (Must specify url and title parameters)\n".to_string()
                )
            );
        }
    }

    #[test]
    fn test_login_required_responses() {
        let result = DispatchResult::AuthenticationRequired {
            login_url: "https://accounts.example.com/login?continue=%2Fsend".into(),
        };

        assert_eq!(
            render(ProtocolVersion::LoginStatus, result.clone()),
            (StatusCode::OK, "LOGIN_REQUIRED\n".to_string())
        );
        assert_eq!(
            render(ProtocolVersion::DeviceStatus, result.clone()),
            (StatusCode::OK, "LOGIN_REQUIRED\n".to_string())
        );

        let response = Outcome::new(ProtocolVersion::Legacy, result).into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert!(response.body().is_empty());
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            "https://accounts.example.com/login?continue=%2Fsend"
        );
    }

    #[test]
    fn test_device_not_registered_responses() {
        assert_eq!(
            render(ProtocolVersion::DeviceStatus, DispatchResult::DeviceNotRegistered),
            (StatusCode::OK, "DEVICE_NOT_REGISTERED\n".to_string())
        );
        assert_eq!(
            render(ProtocolVersion::LoginStatus, DispatchResult::DeviceNotRegistered),
            (
                StatusCode::BAD_REQUEST,
                "ERROR (Device not registered)\n".to_string()
            )
        );
        assert_eq!(
            render(ProtocolVersion::Legacy, DispatchResult::DeviceNotRegistered),
            (
                StatusCode::BAD_REQUEST,
                "ERROR (Device not registered)\n".to_string()
            )
        );
    }

    #[test]
    fn test_delivery_responses() {
        assert_eq!(
            render(ProtocolVersion::Legacy, DispatchResult::Sent),
            (StatusCode::OK, "OK\n".to_string())
        );
        assert_eq!(
            render(ProtocolVersion::DeviceStatus, DispatchResult::DeliveryFailure),
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "ERROR (Unable to send link)\n".to_string()
            )
        );
    }

    #[test]
    fn test_content_type() {
        let response = Outcome::new(ProtocolVersion::Legacy, DispatchResult::Sent).into_response();
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "text/plain");
    }
}

use crate::config::IdentityConfig;
use http::HeaderMap;
use http::header::HeaderName;
use url::Url;

/// An authenticated caller. Also the key under which their device is registered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity(String);

impl Identity {
    pub fn new(identity: impl Into<String>) -> Self {
        Identity(identity.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub trait IdentityProvider: Send + Sync {
    /// The authenticated caller of this request, if any.
    fn current_identity(&self, headers: &HeaderMap) -> Option<Identity>;

    /// Login page that sends the user back to `continue_to` afterwards.
    fn login_url(&self, continue_to: &str) -> String;
}

/// Trusts an identity header injected by the authenticating proxy in front
/// of this service. The proxy must strip the header from client requests.
pub struct HeaderIdentityProvider {
    header: HeaderName,
    login_url: Url,
}

#[derive(thiserror::Error, Debug)]
#[error("invalid identity header name: {0}")]
pub struct InvalidHeaderName(String);

impl HeaderIdentityProvider {
    pub fn new(config: &IdentityConfig) -> Result<Self, InvalidHeaderName> {
        let header = HeaderName::from_bytes(config.header.trim().as_bytes())
            .map_err(|_| InvalidHeaderName(config.header.clone()))?;

        Ok(HeaderIdentityProvider {
            header,
            login_url: config.login_url.clone(),
        })
    }
}

impl IdentityProvider for HeaderIdentityProvider {
    fn current_identity(&self, headers: &HeaderMap) -> Option<Identity> {
        let raw = headers.get(&self.header)?;
        let value = match std::str::from_utf8(raw.as_bytes()) {
            Ok(value) => value.trim(),
            Err(_) => {
                tracing::warn!(header = %self.header, "Identity header is not valid UTF-8");
                return None;
            }
        };
        if value.is_empty() {
            return None;
        }
        Some(Identity::new(value))
    }

    fn login_url(&self, continue_to: &str) -> String {
        let mut url = self.login_url.clone();
        url.query_pairs_mut().append_pair("continue", continue_to);
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn provider() -> HeaderIdentityProvider {
        HeaderIdentityProvider::new(&IdentityConfig {
            header: "X-Authenticated-User".into(),
            login_url: Url::parse("https://accounts.example.com/login?service=linkpush").unwrap(),
        })
        .unwrap()
    }

    #[test]
    fn test_current_identity() {
        let provider = provider();

        let mut headers = HeaderMap::new();
        assert_eq!(provider.current_identity(&headers), None);

        headers.insert("x-authenticated-user", HeaderValue::from_static(""));
        assert_eq!(provider.current_identity(&headers), None);

        headers.insert(
            "x-authenticated-user",
            HeaderValue::from_static("alice@example.com"),
        );
        assert_eq!(
            provider.current_identity(&headers),
            Some(Identity::new("alice@example.com"))
        );
    }

    #[test]
    fn test_non_ascii_identity() {
        let provider = provider();

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-authenticated-user",
            HeaderValue::from_bytes("zoë@example.com".as_bytes()).unwrap(),
        );
        assert_eq!(
            provider.current_identity(&headers),
            Some(Identity::new("zoë@example.com"))
        );

        headers.insert(
            "x-authenticated-user",
            HeaderValue::from_bytes(b"\xffalice@example.com").unwrap(),
        );
        assert_eq!(provider.current_identity(&headers), None);
    }

    #[test]
    fn test_login_url() {
        let login_url = provider().login_url("/send?title=a+b&url=http%3A%2F%2Fx%2F&sel=");
        let parsed = Url::parse(&login_url).unwrap();
        assert_eq!(parsed.host_str(), Some("accounts.example.com"));

        let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("service".to_string(), "linkpush".to_string()),
                (
                    "continue".to_string(),
                    "/send?title=a+b&url=http%3A%2F%2Fx%2F&sel=".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_invalid_header_name() {
        let result = HeaderIdentityProvider::new(&IdentityConfig {
            header: "bad header".into(),
            login_url: Url::parse("https://accounts.example.com/login").unwrap(),
        });
        assert!(result.is_err());
    }
}

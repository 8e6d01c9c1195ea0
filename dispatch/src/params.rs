use http::header::CONTENT_TYPE;
use http::{HeaderMap, Method};
use hyper::Request;
use hyper::body::Bytes;
use std::collections::HashMap;

/// A send request as the handler sees it: the path it arrived on, its
/// headers, and its parameters merged from the query string and form body.
#[derive(Debug)]
pub struct InboundRequest {
    pub path: String,
    pub headers: HeaderMap,
    params: HashMap<String, String>,
}

impl InboundRequest {
    pub fn from_request(request: Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        let mut params = HashMap::new();

        // The first occurrence of a name wins, query string before body
        if let Some(query) = parts.uri.query() {
            extend_first_wins(&mut params, query.as_bytes());
        }
        if parts.method == Method::POST && is_form(&parts.headers) {
            extend_first_wins(&mut params, &body);
        }

        InboundRequest {
            path: parts.uri.path().to_string(),
            headers: parts.headers,
            params,
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

fn extend_first_wins(params: &mut HashMap<String, String>, input: &[u8]) {
    for (name, value) in url::form_urlencoded::parse(input).into_owned() {
        params.entry(name).or_insert(value);
    }
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            mime.trim()
                .eq_ignore_ascii_case("application/x-www-form-urlencoded")
        })
        .unwrap_or(false)
}

use crate::errors::DispatchError;
use crate::handler::LinkDispatchHandler;
use crate::metrics_defs::{LINKS_DISPATCHED, REQUEST_DURATION};
use crate::params::InboundRequest;
use http_body_util::BodyExt;
use http_body_util::combinators::BoxBody;
use hyper::body::{Body, Bytes, Incoming};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use shared::http::{into_boxed_response, make_error_response};
use shared::{counter, histogram};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// Serves the send endpoint on the main listener.
pub struct DispatchService {
    handler: Arc<LinkDispatchHandler>,
    endpoint_path: Arc<str>,
}

impl DispatchService {
    pub fn new(handler: LinkDispatchHandler, endpoint_path: &str) -> Self {
        Self {
            handler: Arc::new(handler),
            endpoint_path: endpoint_path.into(),
        }
    }

    /// Routes a request whose body has already been collected.
    pub async fn respond(
        handler: &LinkDispatchHandler,
        endpoint_path: &str,
        request: Request<Bytes>,
    ) -> Response<Bytes> {
        if request.uri().path() != endpoint_path {
            return make_error_response(StatusCode::NOT_FOUND);
        }
        if *request.method() != Method::GET && *request.method() != Method::POST {
            return make_error_response(StatusCode::METHOD_NOT_ALLOWED);
        }

        let inbound = InboundRequest::from_request(request);
        let outcome = handler.dispatch(&inbound).await;
        counter!(LINKS_DISPATCHED, "result" => outcome.result.as_str()).increment(1);
        outcome.into_response()
    }
}

impl Service<Request<Incoming>> for DispatchService {
    type Response = Response<BoxBody<Bytes, DispatchError>>;
    type Error = DispatchError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let handler = self.handler.clone();
        let endpoint_path = self.endpoint_path.clone();

        Box::pin(async move {
            let start = Instant::now();
            let request = collect_request(req).await?;
            let response = Self::respond(&handler, &endpoint_path, request).await;

            histogram!(REQUEST_DURATION, "status" => response.status().as_str().to_owned())
                .record(start.elapsed().as_secs_f64());
            Ok(into_boxed_response(response))
        })
    }
}

async fn collect_request<B>(req: Request<B>) -> Result<Request<Bytes>, DispatchError>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let (parts, body) = req.into_parts();
    let bytes = body
        .collect()
        .await
        .map_err(|e| DispatchError::RequestBodyError(e.to_string()))?
        .to_bytes();
    Ok(Request::from_parts(parts, bytes))
}

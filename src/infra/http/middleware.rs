use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderValue, Method, Request, StatusCode, Uri},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request id, stored in request and response extensions and echoed in
/// the `x-request-id` header.
#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext {
        request_id: Uuid::new_v4().to_string(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

/// Logs every 4xx/5xx with whatever `ErrorReport` the handler attached.
/// Successful responses only show up at `debug`.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();
    let started = Instant::now();

    let mut response = next.run(request).await;
    let line = ResponseLine {
        status: response.status(),
        method,
        uri,
        request_id,
        elapsed_ms: started.elapsed().as_millis(),
        report: response.extensions_mut().remove::<ErrorReport>(),
    };
    line.emit();

    response
}

struct ResponseLine {
    status: StatusCode,
    method: Method,
    uri: Uri,
    request_id: String,
    elapsed_ms: u128,
    report: Option<ErrorReport>,
}

impl ResponseLine {
    fn emit(self) {
        let (source, chain) = match self.report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = chain.first().map(String::as_str).unwrap_or("no diagnostic available");
        let status = self.status.as_u16();
        let path = self.uri.path();

        if self.status.is_server_error() {
            error!(
                target = "quire::http::response",
                status,
                method = %self.method,
                path,
                elapsed_ms = self.elapsed_ms,
                source,
                detail,
                chain = ?chain,
                request_id = %self.request_id,
                "request failed"
            );
        } else if self.status.is_client_error() {
            warn!(
                target = "quire::http::response",
                status,
                method = %self.method,
                path,
                elapsed_ms = self.elapsed_ms,
                source,
                detail,
                request_id = %self.request_id,
                "request rejected"
            );
        } else {
            debug!(
                target = "quire::http::response",
                status,
                method = %self.method,
                path,
                elapsed_ms = self.elapsed_ms,
                request_id = %self.request_id,
                "request served"
            );
        }
    }
}

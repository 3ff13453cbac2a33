use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use metrics::histogram;
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;
use crate::infra::telemetry::HTTP_REQUEST_MS;

use super::principal::PRINCIPAL_ID_HEADER;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request correlation id, echoed back in `x-request-id`.
#[derive(Debug, Clone, Copy)]
pub struct RequestId(pub Uuid);

pub async fn assign_request_id(mut request: Request<Body>, next: Next) -> Response {
    let id = RequestId(Uuid::new_v4());
    request.extensions_mut().insert(id);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id.0.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Failed request as it is written to the log.
struct Failure {
    status: StatusCode,
    method: String,
    route: String,
    request_id: Option<Uuid>,
    principal: Option<String>,
    elapsed_ms: u64,
    report: Option<ErrorReport>,
}

impl Failure {
    fn emit(&self) {
        let (source, chain) = match &self.report {
            Some(report) => (report.source, report.messages.as_slice()),
            None => ("unknown", &[][..]),
        };
        let detail = chain.first().map(String::as_str).unwrap_or("no diagnostic available");
        let request_id = self.request_id.map(|id| id.to_string()).unwrap_or_default();
        let principal = self.principal.as_deref().unwrap_or("anonymous");

        if self.status.is_server_error() {
            error!(
                target: "penmark::http::response",
                status = self.status.as_u16(),
                method = %self.method,
                route = %self.route,
                elapsed_ms = self.elapsed_ms,
                source,
                detail,
                chain = ?chain,
                request_id = %request_id,
                principal,
                "Request failed"
            );
        } else {
            warn!(
                target: "penmark::http::response",
                status = self.status.as_u16(),
                method = %self.method,
                route = %self.route,
                elapsed_ms = self.elapsed_ms,
                source,
                detail,
                request_id = %request_id,
                principal,
                "Request rejected"
            );
        }
    }
}

/// Records latency for every request and logs the error report attached to
/// 4xx/5xx responses.
pub async fn observe_responses(request: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let request_id = request.extensions().get::<RequestId>().map(|id| id.0);
    let principal = request
        .headers()
        .get(PRINCIPAL_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed = started.elapsed();

    histogram!(
        HTTP_REQUEST_MS,
        "method" => method.clone(),
        "route" => route.clone(),
        "status" => status_class(status)
    )
    .record(elapsed.as_secs_f64() * 1000.0);

    if status.is_client_error() || status.is_server_error() {
        Failure {
            status,
            method,
            route,
            request_id,
            principal,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            report: response.extensions_mut().remove::<ErrorReport>(),
        }
        .emit();
    }

    response
}

fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

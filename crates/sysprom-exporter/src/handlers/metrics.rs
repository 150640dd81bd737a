use std::{sync::Arc, time::Instant};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use crate::{metrics::registry::TEXT_CONTENT_TYPE, router::ExporterState};

pub const METRICS_PATH: &str = "/metrics";

/// Collects every registered collector and renders the text exposition.
///
/// Collection blocks for the CPU sampling window, so it runs on the blocking
/// pool rather than an async worker.
pub async fn prometheus_metrics(State(state): State<Arc<ExporterState>>) -> Response {
    let started_at = Instant::now();
    let registry = Arc::clone(&state.registry);

    let payload = match tokio::task::spawn_blocking(move || registry.render_prometheus()).await {
        Ok(payload) => payload,
        Err(err) => {
            error!(error = %err, "metrics collection task failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    debug!(
        elapsed_ms = started_at.elapsed().as_millis() as u64,
        bytes = payload.len(),
        "scrape complete"
    );

    let mut response = Response::new(Body::from(payload));
    *response.status_mut() = StatusCode::OK;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(TEXT_CONTENT_TYPE),
    );

    response
}

/// Feeds served requests into the traffic recorder. Scrapes are skipped so
/// that reading the metrics does not change them.
pub async fn track_requests(
    State(state): State<Arc<ExporterState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if path == METRICS_PATH {
        return next.run(request).await;
    }

    let started_at = Instant::now();
    let method = request.method().as_str().to_string();

    let response = next.run(request).await;
    state
        .recorder
        .record(&path, &method, started_at.elapsed());

    response
}

//! HTTP interface: session control, aircraft snapshots, the SSE event stream
//! and operational endpoints.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderName, StatusCode, header},
    response::{
        IntoResponse,
        sse::{Event, Sse},
    },
    routing::{get, post},
};
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::aircraft::OutboundEvent;
use crate::metrics::format_prometheus_metrics;
use crate::session::{FeedSession, StartOutcome};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<FeedSession>,
    /// Idle time after which a subscriber receives a keepalive event.
    pub keepalive: Duration,
}

/// Body of `POST /adsb/start`.
#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    /// `host:port` of the SBS feed; the configured default when absent.
    pub address: Option<String>,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/adsb/start", post(start_handler))
        .route("/adsb/stop", post(stop_handler))
        .route("/adsb/status", get(status_handler))
        .route("/adsb/aircraft", get(aircraft_handler))
        .route("/adsb/stream", get(stream_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Serve the HTTP interface on `port` until the future is dropped.
///
/// Returns an error if the server fails to bind to the port.
pub async fn serve(port: u16, state: AppState) -> Result<(), std::io::Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, router(state))
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))
}

/// Events for one subscriber, with keepalives filling idle periods.
///
/// Each call to `recv` waits at most `keepalive`; a timeout yields
/// [`OutboundEvent::Keepalive`]. The stream ends when the channel closes.
pub fn aircraft_events(
    rx: broadcast::Receiver<OutboundEvent>,
    keepalive: Duration,
) -> impl Stream<Item = OutboundEvent> + Send + 'static {
    stream::unfold(rx, move |mut rx| async move {
        loop {
            match timeout(keepalive, rx.recv()).await {
                Ok(Ok(event)) => return Some((event, rx)),
                Ok(Err(RecvError::Lagged(skipped))) => {
                    warn!("Subscriber lagged, skipped {} events", skipped);
                }
                Ok(Err(RecvError::Closed)) => return None,
                Err(_) => return Some((OutboundEvent::Keepalive, rx)),
            }
        }
    })
}

/// SSE stream of aircraft snapshots.
async fn stream_handler(State(state): State<AppState>) -> impl IntoResponse {
    let events = aircraft_events(state.session.subscribe(), state.keepalive)
        .map(|event| Event::default().json_data(&event));

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(events),
    )
}

async fn start_handler(State(state): State<AppState>, body: Bytes) -> Json<StartOutcome> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        StartRequest::default()
    } else {
        match serde_json::from_slice::<StartRequest>(&body) {
            Ok(request) => request,
            Err(e) => return Json(StartOutcome::error(format!("Invalid request body: {}", e))),
        }
    };

    let address = request
        .address
        .unwrap_or_else(|| state.session.default_address());
    Json(state.session.start(&address).await)
}

async fn stop_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.session.stop().await)
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.session.status())
}

/// Point-in-time list of every tracked aircraft.
async fn aircraft_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.session.registry().snapshot_all())
}

/// Health check endpoint.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Prometheus metrics endpoint.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let summary = state.session.stats().summary();
    let output = format_prometheus_metrics(&summary, state.session.registry().len());
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        output,
    )
}

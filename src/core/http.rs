//! HTTP endpoint server using Axum

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{debug, info, warn, Level};

use crate::metrics::Metrics;
use crate::services::telegram::Update;

pub const SERVICE_NAME: &str = "indicator-screener-bot";

#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<Metrics>,
    pub start_time: Arc<Instant>,
    /// Inbound updates for the sequential command loop.
    pub commands: mpsc::Sender<Update>,
}

impl AppState {
    pub fn new(metrics: Arc<Metrics>, commands: mpsc::Sender<Update>) -> Self {
        Self {
            metrics,
            start_time: Arc::new(Instant::now()),
            commands,
        }
    }

    /// Healthy while the command loop still consumes updates.
    pub fn is_healthy(&self) -> bool {
        !self.commands.is_closed()
    }
}

async fn root() -> &'static str {
    "Bot is online."
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let (code, status) = if state.is_healthy() {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    let uptime_seconds = state.start_time.elapsed().as_secs();
    (
        code,
        Json(json!({
            "status": status,
            "uptime_seconds": uptime_seconds,
            "service": SERVICE_NAME
        })),
    )
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Telegram webhook. Always acknowledges so Telegram does not redeliver
/// updates the bot cannot use; the command loop drops duplicates anyway.
async fn webhook(State(state): State<AppState>, body: String) -> &'static str {
    let update: Update = match serde_json::from_str(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!(error = %e, "Ignoring undecodable webhook payload");
            return "OK";
        }
    };

    debug!(update_id = update.update_id, "Received update {}", update.update_id);
    if let Err(e) = state.commands.send(update).await {
        warn!(error = %e, "Command loop is gone, dropping update");
    }
    "OK"
}

/// Middleware to track HTTP request metrics
async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    state.metrics.http_requests_in_flight.inc();
    let response = next.run(request).await;
    let status = response.status();
    let duration = start.elapsed();
    state.metrics.http_requests_in_flight.dec();

    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(duration.as_secs_f64());

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = duration.as_millis(),
            "HTTP request error"
        );
    }

    response
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/webhook", post(webhook))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn start_server(port: u16, state: AppState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!(port = port, "HTTP server listening on port {}", port);
    info!(
        "Metrics endpoint available at http://0.0.0.0:{}/metrics",
        port
    );
    axum::serve(listener, app).await?;

    Ok(())
}

//! Health server for Kubernetes probes and Prometheus metrics.
//!
//! Provides:
//! - `/healthz` - Liveness probe (always returns 200 if server is running)
//! - `/readyz` - Readiness probe (200 once the cache is synced and the startup resync is queued)
//! - `/metrics` - Prometheus metrics endpoint

use crate::controller::ControllerPhase;
use crate::error::ControllerError;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared metrics for the controller
pub struct Metrics {
    /// Service notifications received, by event ("add", "delete")
    pub notifications_total: IntCounterVec,
    /// Services skipped because they are cluster-local
    pub excluded_total: IntCounter,
    /// Export store calls, by operation and outcome
    pub store_operations_total: IntCounterVec,
    /// Items waiting in the event queue
    pub queue_depth: IntGauge,
    /// Failed attempts that were scheduled for another try
    pub queue_retries_total: IntCounter,
    /// Items abandoned after exhausting their retry budget
    pub queue_dropped_total: IntCounter,
    /// 1 while the ServiceExport type is available, 0 once the gate closes
    pub export_type_available: IntGauge,
    registry: Registry,
}

impl Metrics {
    /// Create a new metrics instance with registered metrics
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let notifications_total = IntCounterVec::new(
            Opts::new("serviceexport_notifications_total", "Service notifications received"),
            &["event"],
        )?;
        registry.register(Box::new(notifications_total.clone()))?;

        let excluded_total = IntCounter::new(
            "serviceexport_excluded_services_total",
            "Services skipped because they are cluster-local",
        )?;
        registry.register(Box::new(excluded_total.clone()))?;

        let store_operations_total = IntCounterVec::new(
            Opts::new("serviceexport_store_operations_total", "ServiceExport store calls by outcome"),
            &["operation", "result"],
        )?;
        registry.register(Box::new(store_operations_total.clone()))?;

        let queue_depth = IntGauge::new("serviceexport_queue_depth", "Items waiting in the event queue")?;
        registry.register(Box::new(queue_depth.clone()))?;

        let queue_retries_total = IntCounter::new(
            "serviceexport_queue_retries_total",
            "Failed work item attempts scheduled for retry",
        )?;
        registry.register(Box::new(queue_retries_total.clone()))?;

        let queue_dropped_total = IntCounter::new(
            "serviceexport_queue_dropped_total",
            "Work items abandoned after exhausting retries",
        )?;
        registry.register(Box::new(queue_dropped_total.clone()))?;

        let export_type_available = IntGauge::new(
            "serviceexport_type_available",
            "Whether the ServiceExport resource type is served by the API server",
        )?;
        export_type_available.set(1);
        registry.register(Box::new(export_type_available.clone()))?;

        Ok(Self {
            notifications_total,
            excluded_total,
            store_operations_total,
            queue_depth,
            queue_retries_total,
            queue_dropped_total,
            export_type_available,
            registry,
        })
    }

    /// Record a Service notification
    pub fn record_notification(&self, event: &str) {
        self.notifications_total.with_label_values(&[event]).inc();
    }

    /// Record the outcome of a store call
    pub fn record_store_operation(&self, operation: &str, result: &str) {
        self.store_operations_total
            .with_label_values(&[operation, result])
            .inc();
    }

    /// Encode metrics to Prometheus text format
    pub fn encode(&self) -> String {
        match TextEncoder::new().encode_to_string(&self.registry.gather()) {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to encode metrics: {}", e);
                "# Error encoding metrics".to_string()
            }
        }
    }
}

/// Shared state for the health server
pub struct HealthState {
    phase: watch::Sender<ControllerPhase>,
    /// Metrics registry
    pub metrics: Arc<Metrics>,
}

impl HealthState {
    /// Create a new health state (starts as Uninitialized, not ready)
    pub fn new(metrics: Arc<Metrics>) -> Self {
        let (phase, _) = watch::channel(ControllerPhase::Uninitialized);
        Self { phase, metrics }
    }

    /// Publish a controller phase transition
    pub fn set_phase(&self, phase: ControllerPhase) {
        self.phase.send_replace(phase);
    }

    /// Current controller phase
    pub fn phase(&self) -> ControllerPhase {
        *self.phase.borrow()
    }

    /// Subscribe to phase transitions
    pub fn subscribe(&self) -> watch::Receiver<ControllerPhase> {
        self.phase.subscribe()
    }

    /// Check if the controller is ready
    pub fn is_ready(&self) -> bool {
        self.phase() == ControllerPhase::Steady
    }
}

/// Liveness probe handler
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe handler
///
/// Returns 503 with the current phase until the controller reaches Steady.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    let phase = state.phase();
    if state.is_ready() {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, format!("not ready: {phase}")).into_response()
    }
}

/// Metrics handler
async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the health server router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Run the health server until `cancel` fires
pub async fn run_health_server(
    state: Arc<HealthState>,
    port: u16,
    cancel: CancellationToken,
) -> Result<(), ControllerError> {
    let app = create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!(port = port, "Starting health server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    Ok(())
}

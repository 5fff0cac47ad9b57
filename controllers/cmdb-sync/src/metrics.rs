//! Prometheus metrics and the probe endpoint.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `cmdb_sync_passes_total` | Counter | `cluster`, `outcome` |
//! | `cmdb_sync_mutations_total` | Counter | `cluster`, `kind`, `op` |
//! | `cmdb_sync_pass_duration_seconds` | Histogram | `cluster` |
//! | `cmdb_sync_pass_overruns_total` | Counter | `cluster` |

use crate::error::ControllerError;
use crate::reconciler::PassReport;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, Span};

const PASS_DURATION_BUCKETS: &[f64] = &[0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0];

impl From<prometheus::Error> for ControllerError {
    fn from(e: prometheus::Error) -> Self {
        ControllerError::Metrics(e.to_string())
    }
}

#[derive(Clone)]
pub struct SyncMetrics {
    registry: Registry,
    passes_total: CounterVec,
    mutations_total: CounterVec,
    pass_duration: HistogramVec,
    overruns_total: CounterVec,
}

impl std::fmt::Debug for SyncMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncMetrics").finish_non_exhaustive()
    }
}

impl SyncMetrics {
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new();

        let passes_total = CounterVec::new(
            Opts::new("cmdb_sync_passes_total", "Synchronization passes by outcome"),
            &["cluster", "outcome"],
        )?;
        registry.register(Box::new(passes_total.clone()))?;

        let mutations_total = CounterVec::new(
            Opts::new("cmdb_sync_mutations_total", "CMDB records written by kind and operation"),
            &["cluster", "kind", "op"],
        )?;
        registry.register(Box::new(mutations_total.clone()))?;

        let pass_duration = HistogramVec::new(
            HistogramOpts::new("cmdb_sync_pass_duration_seconds", "Wall time of one synchronization pass")
                .buckets(PASS_DURATION_BUCKETS.to_vec()),
            &["cluster"],
        )?;
        registry.register(Box::new(pass_duration.clone()))?;

        let overruns_total = CounterVec::new(
            Opts::new("cmdb_sync_pass_overruns_total", "Passes that ran longer than the sync interval"),
            &["cluster"],
        )?;
        registry.register(Box::new(overruns_total.clone()))?;

        Ok(Self {
            registry,
            passes_total,
            mutations_total,
            pass_duration,
            overruns_total,
        })
    }

    /// Record the counters of a finished pass
    pub fn observe_pass(&self, report: &PassReport, elapsed: Duration) {
        let outcome = if report.completed { "completed" } else { "aborted" };
        self.passes_total.with_label_values(&[report.cluster.as_str(), outcome]).inc();
        self.pass_duration
            .with_label_values(&[report.cluster.as_str()])
            .observe(elapsed.as_secs_f64());

        for (kind, counters) in &report.counters {
            let kind = kind.to_string();
            for (op, value) in [
                ("create", counters.created),
                ("update", counters.updated),
                ("delete", counters.deleted),
                ("failed", counters.failed),
            ] {
                if value > 0 {
                    self.mutations_total
                        .with_label_values(&[report.cluster.as_str(), kind.as_str(), op])
                        .inc_by(value as f64);
                }
            }
        }
    }

    /// A pass that finished after its next one was already due
    pub fn observe_overrun(&self, cluster: &str) {
        self.overruns_total.with_label_values(&[cluster]).inc();
    }

    pub fn encode_text(&self) -> Result<String, ControllerError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| ControllerError::Metrics(e.to_string()))
    }

    pub fn router(self) -> Router {
        Router::new()
            .route("/healthz", get(health_check))
            .route("/metrics", get(metrics_handler))
            .with_state(self)
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http().on_request(
                |req: &Request<Body>, _span: &Span| {
                    debug!(method = %req.method(), uri = %req.uri(), "Processing request");
                },
            )))
    }

    /// Serve `/metrics` and `/healthz` until the process exits
    pub async fn serve(self, listen: &str) -> Result<(), ControllerError> {
        let addr: SocketAddr = listen
            .parse()
            .map_err(|e| ControllerError::InvalidConfig(format!("metrics.listen {:?}: {}", listen, e)))?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Metrics endpoint listening on {}", addr);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

async fn health_check() -> &'static str {
    "ok"
}

async fn metrics_handler(State(metrics): State<SyncMetrics>) -> Response {
    match metrics.encode_text() {
        Ok(body) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

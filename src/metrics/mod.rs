use anyhow::Result;
use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use lazy_static::lazy_static;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};
use tokio::task::JoinHandle;
use tracing::info;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Chart traffic
    pub static ref CHARTS_PUSHED_TOTAL: IntCounter = IntCounter::new(
        "chartdock_charts_pushed_total",
        "Total number of chart archives accepted"
    ).unwrap();

    pub static ref CHARTS_DELETED_TOTAL: IntCounter = IntCounter::new(
        "chartdock_charts_deleted_total",
        "Total number of chart versions deleted"
    ).unwrap();

    pub static ref CHART_DOWNLOADS_TOTAL: IntCounter = IntCounter::new(
        "chartdock_chart_downloads_total",
        "Total number of chart archives served"
    ).unwrap();

    // Index maintenance
    pub static ref INDEX_REWRITES_TOTAL: IntCounter = IntCounter::new(
        "chartdock_index_rewrites_total",
        "Total number of committed index.yaml rewrites"
    ).unwrap();

    pub static ref INDEX_REWRITE_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "chartdock_index_rewrite_duration_seconds",
            "Time spent staging, rewriting and committing index.yaml"
        ).buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0])
    ).unwrap();
}

pub fn register_metrics() {
    REGISTRY
        .register(Box::new(CHARTS_PUSHED_TOTAL.clone()))
        .ok();
    REGISTRY
        .register(Box::new(CHARTS_DELETED_TOTAL.clone()))
        .ok();
    REGISTRY
        .register(Box::new(CHART_DOWNLOADS_TOTAL.clone()))
        .ok();
    REGISTRY
        .register(Box::new(INDEX_REWRITES_TOTAL.clone()))
        .ok();
    REGISTRY
        .register(Box::new(INDEX_REWRITE_DURATION.clone()))
        .ok();

    info!("Metrics registered");
}

pub async fn start_metrics_server(addr: String) -> Result<JoinHandle<()>> {
    register_metrics();

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_check));

    info!("Starting metrics server on {}", addr);

    let handle = tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind metrics server");

        axum::serve(listener, app)
            .await
            .expect("Metrics server failed");
    });

    Ok(handle)
}

async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        buffer,
    )
        .into_response()
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

// Common test utilities for integration tests
//
// Builders for in-memory chart archives and for driving the chart API
// router without a network listener

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chartdock::{ChartRepo, MemoryStore};
use flate2::Compression;
use flate2::write::GzEncoder;
use http_body_util::BodyExt;
use std::io::Write;
use std::sync::Arc;
use tower::ServiceExt;

pub const BASE_URL: &str = "http://charts.example.com/";

/// Build a `.tgz` archive containing `{dir}/Chart.yaml` with the given body.
pub fn build_chart_tgz(dir: &str, chart_yaml: &str) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_path(format!("{}/Chart.yaml", dir)).unwrap();
    header.set_size(chart_yaml.len() as u64);
    header.set_cksum();
    builder.append(&header, chart_yaml.as_bytes()).unwrap();
    let tar_data = builder.into_inner().unwrap();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar_data).unwrap();
    encoder.finish().unwrap()
}

/// Archive bytes for a small named chart.
pub fn chart_bytes(name: &str, version: &str) -> Vec<u8> {
    let manifest = format!(
        "name: {}\nversion: {}\ndescription: integration fixture for {}\n",
        name, version, name
    );
    build_chart_tgz(name, &manifest)
}

/// A router over a fresh in-memory store, anonymous access.
pub fn test_router() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let repo = Arc::new(ChartRepo::new(store.clone(), BASE_URL, None));
    (chartdock::http::router(repo, 10 * 1024 * 1024), store)
}

/// Drive one request through the router, returning status and body bytes.
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec();
    (status, body)
}

/// Push a chart through the API, asserting success.
pub async fn push_chart(router: &Router, name: &str, version: &str) {
    let request = Request::builder()
        .method("PUT")
        .uri("/")
        .body(Body::from(chart_bytes(name, version)))
        .unwrap();
    let (status, _) = send(router, request).await;
    assert_eq!(status, StatusCode::OK, "failed to push {}-{}", name, version);
}

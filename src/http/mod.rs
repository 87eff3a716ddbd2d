//! HTTP surface of the repository.
//!
//! Routes follow the Helm chart repository conventions: push at the root,
//! `index.yaml` and chart downloads by filename, deletes under `/charts/`.
//! A delete with an unrecognized path shape answers 400; every other
//! unrecognized request answers 405.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, Request, State},
    http::{Method, StatusCode, Uri, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, put},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::chart::ChartArchive;
use crate::config::BasicAuth;
use crate::error::RepoError;
use crate::index::rewrite::DeleteTarget;
use crate::metrics::{CHART_DOWNLOADS_TOTAL, CHARTS_DELETED_TOTAL, CHARTS_PUSHED_TOTAL};
use crate::repo::ChartRepo;

#[derive(Clone)]
struct AppState {
    repo: Arc<ChartRepo>,
}

/// Build the chart API router.
pub fn router(repo: Arc<ChartRepo>, max_upload_bytes: usize) -> Router {
    let state = AppState { repo };

    // Mutating routes sit behind basic auth when credentials are configured
    let mutating = Router::new()
        .route("/", put(push_chart).post(push_chart))
        .route("/charts/{name}", delete(delete_chart))
        .route("/charts/{name}/{version}", delete(delete_version))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .route("/index.yaml", get(fetch_index))
        .route("/{filename}", get(download_chart))
        .merge(mutating)
        .fallback(unmatched)
        .method_not_allowed_fallback(unmatched)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(
    repo: Arc<ChartRepo>,
    addr: String,
    max_upload_bytes: usize,
) -> anyhow::Result<JoinHandle<()>> {
    let app = router(repo, max_upload_bytes);
    info!("Starting chart repository server on {}", addr);

    let handle = tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind chart repository server");

        axum::serve(listener, app)
            .await
            .expect("Chart repository server failed");
    });

    Ok(handle)
}

#[derive(Debug, Deserialize)]
struct PushQuery {
    #[serde(rename = "updateIndex")]
    update_index: Option<bool>,
}

async fn push_chart(
    State(state): State<AppState>,
    Query(query): Query<PushQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, RepoError> {
    let archive = ChartArchive::parse(body.to_vec())?;
    let filename = archive.filename();
    let update_index = query.update_index.unwrap_or(true);

    state.repo.push(&archive, update_index).await?;
    CHARTS_PUSHED_TOTAL.inc();

    info!(
        "Accepted chart {} (index update: {})",
        filename, update_index
    );
    Ok(Json(json!({ "saved": filename })))
}

async fn fetch_index(State(state): State<AppState>) -> Result<Response, RepoError> {
    match state.repo.index_bytes().await? {
        Some(bytes) => Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/x-yaml")],
            bytes,
        )
            .into_response()),
        None => Err(RepoError::IndexMissing),
    }
}

async fn download_chart(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, RepoError> {
    if !filename.ends_with(".tgz") {
        return Err(RepoError::NotFound(filename));
    }
    match state.repo.store().get(&filename).await? {
        Some(bytes) => {
            CHART_DOWNLOADS_TOTAL.inc();
            Ok((
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/gzip")],
                bytes,
            )
                .into_response())
        },
        None => Err(RepoError::NotFound(filename)),
    }
}

async fn delete_chart(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, RepoError> {
    let removed = state.repo.delete(&[DeleteTarget::Chart(name)]).await?;
    CHARTS_DELETED_TOTAL.inc_by(removed.len() as u64);
    Ok(Json(json!({ "deleted": removed })))
}

async fn delete_version(
    State(state): State<AppState>,
    Path((name, version)): Path<(String, String)>,
) -> Result<impl IntoResponse, RepoError> {
    let removed = state
        .repo
        .delete(&[DeleteTarget::Version(name, version)])
        .await?;
    CHARTS_DELETED_TOTAL.inc_by(removed.len() as u64);
    Ok(Json(json!({ "deleted": removed })))
}

/// Requests matching no route: malformed delete paths answer 400, everything
/// else 405.
async fn unmatched(method: Method, uri: Uri) -> Response {
    if method == Method::DELETE {
        debug!("Malformed delete path: {}", uri.path());
        RepoError::BadRequest(format!("unrecognized delete path: {}", uri.path()))
            .into_response()
    } else {
        StatusCode::METHOD_NOT_ALLOWED.into_response()
    }
}

async fn require_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(auth) = state.repo.auth() else {
        return next.run(req).await;
    };
    if authorized(auth, req.headers()) {
        return next.run(req).await;
    }

    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"chartdock\"")],
        Json(json!({ "error": "authentication required" })),
    )
        .into_response()
}

fn authorized(auth: &BasicAuth, headers: &axum::http::HeaderMap) -> bool {
    let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    let Some(encoded) = value.strip_prefix("Basic ") else {
        return false;
    };
    let Ok(decoded) = BASE64.decode(encoded) else {
        return false;
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return false;
    };

    decoded == format!("{}:{}", auth.username, auth.password)
}

use axum::{Json, http::StatusCode, response::IntoResponse, response::Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors surfaced by the repository core.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The uploaded bytes are not a chart archive we can read
    #[error("malformed chart archive: {0}")]
    MalformedArchive(String),

    /// The chart version is already indexed with different content
    #[error("chart {name}-{version} is already present in the index")]
    AlreadyPresent { name: String, version: String },

    /// A delete or lookup requires index.yaml, which does not exist yet
    #[error("index.yaml does not exist in the repository")]
    IndexMissing,

    /// The requested chart or version is not in the index
    #[error("chart {0} not found")]
    NotFound(String),

    /// I/O failure from the blob store or staging area
    #[error("storage error: {0}")]
    Store(#[from] std::io::Error),

    /// The request itself is malformed (bad delete path, bad query)
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl RepoError {
    pub fn status(&self) -> StatusCode {
        match self {
            RepoError::MalformedArchive(_) | RepoError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RepoError::AlreadyPresent { .. } => StatusCode::CONFLICT,
            RepoError::IndexMissing | RepoError::NotFound(_) => StatusCode::NOT_FOUND,
            RepoError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RepoError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

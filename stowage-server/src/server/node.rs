use super::{
    ChecksumMismatchResponse, NodeHealthResponse, PutChunkResponse, error_response,
    response_error, shutdown_signal,
};
use crate::config::NodeServerConfig;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use std::sync::Arc;
use stowage_core::{CHECKSUM_HEADER, ChunkStore, Result, StowError};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub(crate) struct NodeState {
    pub(crate) node_id: String,
    pub(crate) chunk_store: Arc<ChunkStore>,
}

pub async fn run_node(config: NodeServerConfig) -> Result<()> {
    let data_dir = config.effective_data_dir()?;
    let chunk_store = Arc::new(ChunkStore::new(data_dir.clone())?);
    tracing::info!(
        "Node {} storing chunks under {}",
        config.node_id,
        data_dir.display()
    );

    let state = Arc::new(NodeState {
        node_id: config.node_id.clone(),
        chunk_store,
    });
    let app = node_router(state, config.max_body_bytes);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Stowage node {} listening on {}", config.node_id, config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub(crate) fn node_router(state: Arc<NodeState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/data/:id", get(get_chunk).put(put_chunk))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn put_chunk(
    State(state): State<Arc<NodeState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let expected = headers
        .get(CHECKSUM_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    match state.chunk_store.put_chunk(&id, body, expected).await {
        Ok(checksum) => (
            StatusCode::OK,
            Json(PutChunkResponse {
                success: true,
                checksum,
            }),
        )
            .into_response(),
        Err(StowError::ChecksumMismatch { expected, actual }) => {
            tracing::warn!(
                "Rejected chunk {} on node {}: expected={} actual={}",
                id,
                state.node_id,
                expected,
                actual
            );
            (
                StatusCode::BAD_REQUEST,
                Json(ChecksumMismatchResponse {
                    error: "Checksum mismatch".to_string(),
                    expected,
                    actual,
                }),
            )
                .into_response()
        }
        Err(error) => {
            tracing::error!("Failed to store chunk {}: {}", id, error);
            error_response(&error)
        }
    }
}

async fn get_chunk(State(state): State<Arc<NodeState>>, Path(id): Path<String>) -> Response {
    let payload = match state.chunk_store.get_chunk(&id).await {
        Ok(payload) => payload,
        Err(StowError::ChunkNotFound(_)) => {
            return response_error(StatusCode::NOT_FOUND, "Not found");
        }
        Err(error) => {
            tracing::error!("Failed to read chunk {}: {}", id, error);
            return error_response(&error);
        }
    };

    let mut response = (StatusCode::OK, payload.bytes).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    if let Ok(value) = HeaderValue::from_str(&payload.checksum) {
        headers.insert(CHECKSUM_HEADER, value);
    }
    response
}

async fn health(State(state): State<Arc<NodeState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(NodeHealthResponse {
            status: "ok",
            node_id: state.node_id.clone(),
        }),
    )
}

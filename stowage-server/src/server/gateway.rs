use super::{
    GatewayHealthResponse, ListKeysResponse, PutObjectResponse, VersionsResponse, error_response,
    shutdown_signal,
};
use crate::config::GatewayConfig;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use std::sync::Arc;
use stowage_core::{
    CHECKSUM_HEADER, DynStorageNode, Gateway, HttpStorageNode, MetadataStore, Metrics, NodeSet,
    Result, StowError,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub(crate) struct GatewayState {
    pub(crate) gateway: Gateway,
}

pub async fn run_gateway(config: GatewayConfig) -> Result<()> {
    let nodes = build_node_set(&config)?;
    let metadata = Arc::new(MetadataStore::open(config.metadata_path.clone()).await?);
    let (gateway, worker) = Gateway::new(nodes, metadata, &config.settings(), Metrics::new())?;

    let repair_handle = worker.spawn();
    tracing::info!(
        "Repair worker started, interval {} ms",
        config.repair.interval_ms
    );

    let app = gateway_router(Arc::new(GatewayState { gateway }), config.max_body_bytes);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Stowage gateway listening on {}", config.bind_addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|error| StowError::Http(error.to_string()));

    repair_handle.shutdown().await;
    served
}

fn build_node_set(config: &GatewayConfig) -> Result<NodeSet> {
    let timeout = config.replication.node_timeout();
    let mut nodes: Vec<DynStorageNode> = Vec::with_capacity(config.nodes.len());
    for endpoint in &config.nodes {
        let node = HttpStorageNode::new(endpoint.node_id.clone(), endpoint.url.clone(), timeout)?;
        tracing::info!("Storage node {} at {}", endpoint.node_id, node.base_url());
        nodes.push(Arc::new(node));
    }
    NodeSet::new(nodes)
}

pub(crate) fn gateway_router(state: Arc<GatewayState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/s3/:bucket", get(list_keys))
        .route("/s3/:bucket/:key", get(get_object).put(put_object))
        .route("/s3/:bucket/:key/versions", get(list_versions))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn put_object(
    State(state): State<Arc<GatewayState>>,
    Path((bucket, key)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    match state.gateway.put_object(&bucket, &key, body).await {
        Ok(result) => {
            tracing::info!(
                "Uploaded {}/{} version={} acknowledged={}",
                bucket,
                key,
                result.version.version_id,
                result.acknowledged
            );
            (
                StatusCode::OK,
                Json(PutObjectResponse {
                    message: "Uploaded".to_string(),
                    version_id: result.version.version_id,
                }),
            )
                .into_response()
        }
        Err(error) => {
            tracing::warn!("Upload failed for {}/{}: {}", bucket, key, error);
            error_response(&error)
        }
    }
}

async fn get_object(
    State(state): State<Arc<GatewayState>>,
    Path((bucket, key)): Path<(String, String)>,
) -> Response {
    let result = match state.gateway.get_object(&bucket, &key).await {
        Ok(result) => result,
        Err(error) => {
            if !matches!(error, StowError::ObjectNotFound(_)) {
                tracing::error!("Read failed for {}/{}: {}", bucket, key, error);
            }
            return error_response(&error);
        }
    };

    let mut response = (StatusCode::OK, result.body).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    if let Ok(value) = HeaderValue::from_str(&result.version.checksum) {
        headers.insert(CHECKSUM_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&result.version.version_id) {
        headers.insert("x-version-id", value);
    }
    response
}

async fn list_versions(
    State(state): State<Arc<GatewayState>>,
    Path((bucket, key)): Path<(String, String)>,
) -> Response {
    match state.gateway.list_versions(&bucket, &key).await {
        Ok(versions) => (
            StatusCode::OK,
            Json(VersionsResponse {
                bucket,
                key,
                versions,
            }),
        )
            .into_response(),
        Err(error) => error_response(&error),
    }
}

async fn list_keys(
    State(state): State<Arc<GatewayState>>,
    Path(bucket): Path<String>,
) -> Response {
    let keys = state.gateway.list_keys(&bucket).await;
    (StatusCode::OK, Json(ListKeysResponse { bucket, keys })).into_response()
}

async fn metrics(State(state): State<Arc<GatewayState>>) -> Response {
    let mut response = (StatusCode::OK, state.gateway.metrics().encode_text()).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}

async fn health(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let gateway = &state.gateway;
    (
        StatusCode::OK,
        Json(GatewayHealthResponse {
            status: "ok",
            nodes: gateway.node_ids(),
            write_quorum: gateway.write_quorum(),
            repair_backlog: gateway.repair_backlog(),
        }),
    )
}

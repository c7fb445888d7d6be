use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use stowage_core::StowError;

mod gateway;
mod node;
mod types;

pub use gateway::run_gateway;
pub use node::run_node;
pub(crate) use types::*;

pub(crate) fn response_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Single place where core errors become HTTP statuses.
pub(crate) fn error_status(error: &StowError) -> StatusCode {
    match error {
        StowError::QuorumNotMet { .. } => StatusCode::SERVICE_UNAVAILABLE,
        StowError::ObjectNotFound(_) | StowError::ChunkNotFound(_) => StatusCode::NOT_FOUND,
        StowError::InvalidRequest(_) | StowError::ChecksumMismatch { .. } => {
            StatusCode::BAD_REQUEST
        }
        StowError::DataUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn error_response(error: &StowError) -> Response {
    response_error(error_status(error), error.to_string())
}

pub(crate) async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", error);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let quorum = StowError::QuorumNotMet {
            required: 2,
            acknowledged: 1,
        };
        assert_eq!(error_status(&quorum), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            error_status(&StowError::ObjectNotFound("b/k".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            error_status(&StowError::DataUnavailable("b/k".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            error_status(&StowError::InvalidRequest("empty".to_string())),
            StatusCode::BAD_REQUEST
        );
    }
}

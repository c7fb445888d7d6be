use serde::Serialize;
use stowage_core::ObjectVersion;

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PutObjectResponse {
    pub(crate) message: String,
    pub(crate) version_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct VersionsResponse {
    pub(crate) bucket: String,
    pub(crate) key: String,
    pub(crate) versions: Vec<ObjectVersion>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ListKeysResponse {
    pub(crate) bucket: String,
    pub(crate) keys: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GatewayHealthResponse {
    pub(crate) status: &'static str,
    pub(crate) nodes: Vec<String>,
    pub(crate) write_quorum: usize,
    pub(crate) repair_backlog: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct NodeHealthResponse {
    pub(crate) status: &'static str,
    pub(crate) node_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PutChunkResponse {
    pub(crate) success: bool,
    pub(crate) checksum: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChecksumMismatchResponse {
    pub(crate) error: String,
    pub(crate) expected: String,
    pub(crate) actual: String,
}

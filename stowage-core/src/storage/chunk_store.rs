use crate::error::{Result, StowError};
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// A chunk read back from a store, with the checksum computed at read time.
#[derive(Debug, Clone)]
pub struct ChunkPayload {
    pub bytes: Bytes,
    pub checksum: String,
}

/// ChunkStore keeps opaque chunks as flat files: `chunks/{storage_id}`.
///
/// The store knows nothing about buckets, keys or versions. A write is a
/// full overwrite by identifier, so replaying the same write is harmless.
pub struct ChunkStore {
    base_path: PathBuf,
}

impl ChunkStore {
    pub fn new(base_path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(base_path.join("chunks"))?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Store a chunk, rejecting it if `expected_checksum` does not match.
    /// Returns the checksum computed over the received bytes.
    pub async fn put_chunk(
        &self,
        storage_id: &str,
        data: Bytes,
        expected_checksum: Option<&str>,
    ) -> Result<String> {
        let checksum = compute_checksum(&data);
        if let Some(expected) = expected_checksum {
            if expected != checksum {
                return Err(StowError::ChecksumMismatch {
                    expected: expected.to_string(),
                    actual: checksum,
                });
            }
        }

        let chunk_path = self.chunk_path(storage_id)?;

        // Write to temporary file first, then rename over any previous copy
        let temp_path = chunk_path.with_extension(format!("{}.tmp", ulid::Ulid::new()));
        if let Err(error) = write_then_rename(&temp_path, &chunk_path, &data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(error.into());
        }

        tracing::debug!("Stored chunk {} ({} bytes)", storage_id, data.len());
        Ok(checksum)
    }

    pub async fn get_chunk(&self, storage_id: &str) -> Result<ChunkPayload> {
        let chunk_path = self.chunk_path(storage_id)?;

        if !chunk_path.exists() {
            return Err(StowError::ChunkNotFound(storage_id.to_string()));
        }

        let data = fs::read(&chunk_path).await?;
        let checksum = compute_checksum(&data);
        Ok(ChunkPayload {
            bytes: Bytes::from(data),
            checksum,
        })
    }

    pub fn chunk_exists(&self, storage_id: &str) -> bool {
        self.chunk_path(storage_id)
            .map(|path| path.exists())
            .unwrap_or(false)
    }

    pub async fn delete_chunk(&self, storage_id: &str) -> Result<()> {
        let chunk_path = self.chunk_path(storage_id)?;
        if chunk_path.exists() {
            fs::remove_file(&chunk_path).await?;
        }
        Ok(())
    }

    fn chunk_path(&self, storage_id: &str) -> Result<PathBuf> {
        validate_storage_id(storage_id)?;
        Ok(self.base_path.join("chunks").join(storage_id))
    }
}

async fn write_then_rename(
    temp_path: &Path,
    final_path: &Path,
    data: &[u8],
) -> std::io::Result<()> {
    let mut file = fs::File::create(temp_path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(temp_path, final_path).await
}

fn validate_storage_id(storage_id: &str) -> Result<()> {
    if storage_id.is_empty()
        || storage_id == "."
        || storage_id == ".."
        || storage_id.contains(['/', '\\'])
    {
        return Err(StowError::InvalidRequest(format!(
            "invalid storage id: {:?}",
            storage_id
        )));
    }
    Ok(())
}

/// Compute the SHA256 checksum of data as lowercase hex
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

pub fn verify_checksum(data: &[u8], expected: &str) -> Result<()> {
    let actual = compute_checksum(data);
    if actual != expected {
        return Err(StowError::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

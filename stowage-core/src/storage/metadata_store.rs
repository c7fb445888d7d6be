use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

/// One committed write of a key. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectVersion {
    pub version_id: String,
    pub storage_id: String,
    pub size: u64,
    pub checksum: String,
    pub timestamp: DateTime<Utc>,
}

/// bucket -> key -> versions, newest first
pub type MetadataIndex = BTreeMap<String, BTreeMap<String, Vec<ObjectVersion>>>;

/// MetadataStore holds the version index in memory and rewrites it to a
/// single JSON file after every append.
pub struct MetadataStore {
    path: Option<PathBuf>,
    index: RwLock<MetadataIndex>,
}

impl MetadataStore {
    /// Open the store at `path`, loading the whole index if the file exists.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let index = if fs::try_exists(&path).await? {
            let raw = fs::read(&path).await?;
            let index: MetadataIndex = serde_json::from_slice(&raw)?;
            tracing::info!(
                "Metadata loaded from {:?}: {} buckets",
                path,
                index.len()
            );
            index
        } else {
            MetadataIndex::new()
        };

        Ok(Self {
            path: Some(path),
            index: RwLock::new(index),
        })
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            index: RwLock::new(MetadataIndex::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Prepend `version` to the key's history and persist the whole index.
    ///
    /// The write lock is held across persistence, so on-disk order always
    /// matches append order. A failed persist leaves the index unchanged.
    pub async fn append(&self, bucket: &str, key: &str, version: ObjectVersion) -> Result<()> {
        let mut index = self.index.write().await;

        index
            .entry(bucket.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default()
            .insert(0, version);

        if let Some(path) = self.path.as_deref() {
            if let Err(error) = persist_index(path, &index).await {
                tracing::error!(
                    "Metadata persist failed, rolling back append. bucket={} key={} error={}",
                    bucket,
                    key,
                    error
                );
                rollback_head(&mut index, bucket, key);
                return Err(error);
            }
        }

        Ok(())
    }

    pub async fn latest(&self, bucket: &str, key: &str) -> Option<ObjectVersion> {
        let index = self.index.read().await;
        index
            .get(bucket)
            .and_then(|keys| keys.get(key))
            .and_then(|versions| versions.first())
            .cloned()
    }

    pub async fn versions(&self, bucket: &str, key: &str) -> Vec<ObjectVersion> {
        let index = self.index.read().await;
        index
            .get(bucket)
            .and_then(|keys| keys.get(key))
            .cloned()
            .unwrap_or_default()
    }

    pub async fn list_keys(&self, bucket: &str) -> Vec<String> {
        let index = self.index.read().await;
        index
            .get(bucket)
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default()
    }
}

fn rollback_head(index: &mut MetadataIndex, bucket: &str, key: &str) {
    let Some(keys) = index.get_mut(bucket) else {
        return;
    };
    if let Some(versions) = keys.get_mut(key) {
        if !versions.is_empty() {
            versions.remove(0);
        }
        if versions.is_empty() {
            keys.remove(key);
        }
    }
    if keys.is_empty() {
        index.remove(bucket);
    }
}

async fn persist_index(path: &Path, index: &MetadataIndex) -> Result<()> {
    let payload = serde_json::to_vec(index)?;

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    // Replace-on-success: a crash mid-write never truncates the live file
    let temp_path = path.with_extension(format!("{}.tmp", ulid::Ulid::new()));
    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(&payload).await?;
    file.sync_all().await?;
    drop(file);

    if let Err(error) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(error.into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(id: &str) -> ObjectVersion {
        ObjectVersion {
            version_id: format!("v-{}", id),
            storage_id: format!("s-{}", id),
            size: 3,
            checksum: crate::compute_checksum(id.as_bytes()),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_latest_of_unknown_key_is_none() {
        let store = MetadataStore::in_memory();
        assert!(store.latest("photos", "cat.png").await.is_none());
        assert!(store.versions("photos", "cat.png").await.is_empty());
    }

    #[tokio::test]
    async fn test_append_prepends() {
        let store = MetadataStore::in_memory();
        store.append("photos", "cat.png", version("1")).await.unwrap();
        store.append("photos", "cat.png", version("2")).await.unwrap();

        let latest = store.latest("photos", "cat.png").await.unwrap();
        assert_eq!(latest.version_id, "v-2");

        let ids: Vec<String> = store
            .versions("photos", "cat.png")
            .await
            .into_iter()
            .map(|v| v.version_id)
            .collect();
        assert_eq!(ids, vec!["v-2", "v-1"]);
    }

    #[tokio::test]
    async fn test_persisted_index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");

        {
            let store = MetadataStore::open(&path).await.unwrap();
            store.append("docs", "a.txt", version("1")).await.unwrap();
            store.append("docs", "a.txt", version("2")).await.unwrap();
            store.append("docs", "b.txt", version("3")).await.unwrap();
        }

        let reopened = MetadataStore::open(&path).await.unwrap();
        assert_eq!(reopened.latest("docs", "a.txt").await.unwrap().version_id, "v-2");
        assert_eq!(reopened.versions("docs", "a.txt").await.len(), 2);
        assert_eq!(reopened.list_keys("docs").await, vec!["a.txt", "b.txt"]);

        // Only the index file remains; no stray temp files
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_persisted_layout_uses_camel_case_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");

        let store = MetadataStore::open(&path).await.unwrap();
        store.append("docs", "a.txt", version("1")).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        let record = &raw["docs"]["a.txt"][0];
        for field in ["versionId", "storageId", "size", "checksum", "timestamp"] {
            assert!(record.get(field).is_some(), "missing field {}", field);
        }
    }

    #[tokio::test]
    async fn test_failed_persist_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        // A directory in place of the index file makes the final rename fail
        let path = dir.path().join("metadata.json");
        std::fs::create_dir_all(path.join("occupied")).unwrap();

        let store = MetadataStore {
            path: Some(path),
            index: RwLock::new(MetadataIndex::new()),
        };

        assert!(store.append("docs", "a.txt", version("1")).await.is_err());
        assert!(store.latest("docs", "a.txt").await.is_none());
        assert!(store.list_keys("docs").await.is_empty());
    }
}

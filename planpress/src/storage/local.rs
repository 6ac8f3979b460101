//! Local filesystem object store - buckets are subdirectories under a root.
//! Useful for development and testing; signed URLs degrade to `file://` URLs.

use super::{ObjectInfo, ObjectStore, Result, StorageError, UploadOptions};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::fs;

pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Join bucket and key under the root, refusing absolute keys and parent
    /// references so a key can never escape the storage tree.
    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let relative = Path::new(bucket).join(key);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::Other(anyhow::anyhow!(
                "invalid object key {key:?} for bucket {bucket:?}"
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn upload(&self, bucket: &str, key: &str, content: Bytes, options: &UploadOptions) -> Result<()> {
        let path = self.object_path(bucket, key)?;

        if !options.upsert && fs::try_exists(&path).await? {
            return Err(StorageError::AlreadyExists);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &content).await?;

        Ok(())
    }

    async fn download(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let path = self.object_path(bucket, key)?;

        match fs::read(&path).await {
            Ok(content) => Ok(Bytes::from(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, bucket: &str) -> Result<Vec<ObjectInfo>> {
        let dir = self.root.join(bucket);

        // An empty bucket and a bucket that was never written to look the same.
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut objects = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            objects.push(ObjectInfo {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: Some(metadata.len()),
                updated_at: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }
        objects.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(objects)
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<()> {
        let path = self.object_path(bucket, key)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_signed_url(&self, bucket: &str, key: &str, _ttl: Duration) -> Result<String> {
        let path = self.object_path(bucket, key)?;

        // No signer locally; hand back a direct file URL for the dev UI.
        if !fs::try_exists(&path).await? {
            return Err(StorageError::NotFound);
        }
        Ok(format!("file://{}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().to_path_buf());
        (dir, store)
    }

    #[tokio::test]
    async fn upload_download_round_trip_is_byte_identical() {
        let (_dir, store) = store();
        let content = "\\documentclass{article} % ünïcode".as_bytes();

        store
            .upload("tex", "plan.tex", Bytes::from(content.to_vec()), &UploadOptions::default())
            .await
            .unwrap();

        let downloaded = store.download("tex", "plan.tex").await.unwrap();
        assert_eq!(downloaded.as_ref(), content);
    }

    #[tokio::test]
    async fn upsert_overwrites_and_leaves_single_object() {
        let (_dir, store) = store();
        let upsert = UploadOptions {
            upsert: true,
            ..Default::default()
        };

        store
            .upload("pdf", "plan.pdf", Bytes::from_static(b"old"), &upsert)
            .await
            .unwrap();
        store
            .upload("pdf", "plan.pdf", Bytes::from_static(b"new"), &upsert)
            .await
            .unwrap();

        let objects = store.list("pdf").await.unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].name, "plan.pdf");
        assert_eq!(store.download("pdf", "plan.pdf").await.unwrap().as_ref(), b"new");
    }

    #[tokio::test]
    async fn upload_without_upsert_refuses_existing_key() {
        let (_dir, store) = store();

        store
            .upload("tex", "plan.tex", Bytes::from_static(b"a"), &UploadOptions::default())
            .await
            .unwrap();
        let err = store
            .upload("tex", "plan.tex", Bytes::from_static(b"b"), &UploadOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::AlreadyExists));
    }

    #[tokio::test]
    async fn download_missing_object_is_not_found() {
        let (_dir, store) = store();
        let err = store.download("tex", "nope.tex").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn list_unwritten_bucket_is_empty() {
        let (_dir, store) = store();
        assert!(store.list("tex").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let (_dir, store) = store();

        store
            .upload("pdf", "plan.pdf", Bytes::from_static(b"x"), &UploadOptions::default())
            .await
            .unwrap();
        store.remove("pdf", "plan.pdf").await.unwrap();
        store.remove("pdf", "plan.pdf").await.unwrap();

        assert!(store.list("pdf").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn signed_url_points_at_stored_object() {
        let (_dir, store) = store();

        store
            .upload("pdf", "plan.pdf", Bytes::from_static(b"%PDF"), &UploadOptions::default())
            .await
            .unwrap();

        let url = store
            .create_signed_url("pdf", "plan.pdf", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("pdf/plan.pdf"));
    }

    #[tokio::test]
    async fn signed_url_for_missing_object_fails() {
        let (_dir, store) = store();
        let err = store
            .create_signed_url("pdf", "ghost.pdf", Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let (_dir, store) = store();
        let err = store.download("tex", "../escape.tex").await.unwrap_err();
        assert!(matches!(err, StorageError::Other(_)));
    }
}

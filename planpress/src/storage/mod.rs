//! Object storage abstraction for lesson plan sources and compiled PDFs.
//!
//! All persistence goes through the [`ObjectStore`] trait: upload, download,
//! list, remove, and signed-URL minting against named buckets. Two backends
//! exist:
//!
//! - [`SupabaseStore`]: talks to the Supabase storage REST API, authenticating
//!   with a service-account session that is re-established when it expires
//! - [`LocalStore`]: a directory tree on local disk (bucket = subdirectory),
//!   used for development and tests
//!
//! The backend is selected from configuration via [`create_object_store`].

pub mod local;
pub mod supabase;

pub use local::LocalStore;
pub use supabase::SupabaseStore;

use crate::config::StorageConfig;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum StorageError {
    #[error("object not found")]
    NotFound,

    #[error("object already exists")]
    AlreadyExists,

    #[error("storage authentication failed: {0}")]
    Auth(String),

    #[error("storage request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("storage service error (HTTP {status}): {message}")]
    Service { status: u16, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Options applied to an upload.
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Content-type recorded on the stored object
    pub content_type: Option<String>,
    /// Cache-control directive recorded on the stored object
    pub cache_control: Option<String>,
    /// Overwrite an existing object of the same key instead of failing
    pub upsert: bool,
}

/// Descriptor for one stored object, as returned by [`ObjectStore::list`].
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub name: String,
    pub size: Option<u64>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Bucket-based object storage operations.
///
/// `remove` is idempotent: removing a key that does not exist succeeds.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, bucket: &str, key: &str, content: Bytes, options: &UploadOptions) -> Result<()>;

    /// Fetch an object's bytes; [`StorageError::NotFound`] when the key is absent.
    async fn download(&self, bucket: &str, key: &str) -> Result<Bytes>;

    async fn list(&self, bucket: &str) -> Result<Vec<ObjectInfo>>;

    async fn remove(&self, bucket: &str, key: &str) -> Result<()>;

    /// Mint a time-limited URL granting read access to one object.
    async fn create_signed_url(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String>;
}

/// Create an object store backend based on configuration
pub async fn create_object_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    match config {
        StorageConfig::Supabase(settings) => {
            tracing::info!("Creating Supabase object store (project: {})", settings.url);
            let store = SupabaseStore::connect(settings).await?;
            Ok(Arc::new(store))
        }
        StorageConfig::Local { root } => {
            tracing::info!("Creating local object store (root: {:?})", root);
            tokio::fs::create_dir_all(root).await?;
            Ok(Arc::new(LocalStore::new(root.clone())))
        }
    }
}

//! Remote object store for archives.
//!
//! [`RemoteStore`] is the narrow capability set any object-store client has to
//! provide. [`ArchiveStore`] layers the archive semantics on top: bucket
//! provisioning, verified uploads, per-host and service-wide listings, and
//! downloads with progress markers.

#[cfg(test)]
pub(crate) mod memory;
pub mod s3;

use crate::archive::naming::{self, ArchiveEntry};
use crate::transfer::progress_stream::{ProgressCallback, ProgressStream};
use crate::utils::errors::{BackupError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

pub use s3::S3Store;

/// Body of a downloaded object
pub type ObjectStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// What the store reports for a key after writing it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// A regular stored object
    Object,
    /// A directory-like placeholder
    Prefix,
    /// Nothing is stored under the key
    Missing,
}

/// Handle returned by [`RemoteStore::put`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub kind: ObjectKind,
    pub size_bytes: u64,
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Bucket (or container) name
    fn bucket(&self) -> &str;

    async fn bucket_exists(&self) -> Result<bool>;

    async fn create_bucket(&self) -> Result<()>;

    /// Objects whose key starts with `prefix`, in whatever order the store uses
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ArchiveEntry>>;

    /// Store `body` under `key` and report what the store now holds there
    async fn put(&self, key: &str, body: tokio::fs::File) -> Result<StoredObject>;

    async fn get_stream(&self, key: &str) -> Result<ObjectStream>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Create the bucket if needed; fail unless it exists afterwards.
pub async fn ensure_bucket<S: RemoteStore + ?Sized>(store: &S) -> Result<()> {
    if store.bucket_exists().await? {
        return Ok(());
    }

    info!("Bucket {} not found, creating it", store.bucket());
    store.create_bucket().await?;

    if !store.bucket_exists().await? {
        return Err(BackupError::BucketProvisioningFailure(
            store.bucket().to_string(),
        ));
    }
    Ok(())
}

/// Accept only uploads the store confirms as regular objects.
pub fn verify_upload(stored: &StoredObject) -> Result<()> {
    match stored.kind {
        ObjectKind::Object => Ok(()),
        kind => Err(BackupError::UploadError {
            key: stored.key.clone(),
            kind,
        }),
    }
}

/// Archive operations against a provisioned bucket.
pub struct ArchiveStore<S> {
    store: S,
    base: String,
}

impl<S: RemoteStore> ArchiveStore<S> {
    /// Wrap `store`, making sure its bucket exists first.
    pub async fn connect(store: S, base: &str) -> Result<Self> {
        ensure_bucket(&store).await?;
        Ok(Self {
            store,
            base: base.to_string(),
        })
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    /// Upload the local archive at `path` under its file name.
    pub async fn upload(&self, path: &Path) -> Result<StoredObject> {
        let key = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| BackupError::Store(format!("no file name in {}", path.display())))?;

        info!("About to upload {}...", key);
        let file = tokio::fs::File::open(path).await?;
        let stored = self.store.put(&key, file).await?;
        verify_upload(&stored)?;
        info!("Uploaded {} ({} bytes)", stored.key, stored.size_bytes);

        Ok(stored)
    }

    /// Archives of `host`, sorted by key.
    pub async fn list_backups_for_host(&self, host: &str) -> Result<Vec<ArchiveEntry>> {
        self.list_sorted(&naming::host_prefix(&self.base, host)).await
    }

    /// Archives of every host of this service, sorted by key.
    pub async fn list_backups_for_all_hosts(&self) -> Result<Vec<ArchiveEntry>> {
        self.list_sorted(&naming::service_prefix(&self.base)).await
    }

    async fn list_sorted(&self, prefix: &str) -> Result<Vec<ArchiveEntry>> {
        let mut entries = self.store.list_by_prefix(prefix).await?;
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        debug!("Found {} objects with prefix {}", entries.len(), prefix);
        Ok(entries)
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.store.delete(key).await
    }

    /// Stream `key` into `dest_dir/<key>`, reporting progress every `marker_every` chunks.
    pub async fn download(
        &self,
        key: &str,
        dest_dir: &Path,
        marker_every: u64,
        progress: ProgressCallback,
    ) -> Result<PathBuf> {
        if key.contains('/') {
            return Err(BackupError::Store(format!("refusing to download nested key {key}")));
        }

        let body = self.store.get_stream(key).await?;
        let dest = dest_dir.join(key);
        let mut file = tokio::fs::File::create(&dest).await?;

        info!("Downloading {} to {}", key, dest.display());
        let mut stream = ProgressStream::new(body, marker_every, progress);
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;

        info!("Downloaded {} bytes", stream.bytes_transferred());
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryStore;
    use super::*;
    use crate::transfer::progress_stream::Progress;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn entry(key: &str, size_bytes: u64) -> ArchiveEntry {
        ArchiveEntry {
            key: key.to_string(),
            size_bytes,
        }
    }

    #[tokio::test]
    async fn test_ensure_bucket_creates_missing_bucket() {
        let store = MemoryStore::without_bucket();
        ensure_bucket(&store).await.unwrap();
        assert!(store.bucket_exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_bucket_fails_when_creation_has_no_effect() {
        let store = MemoryStore::without_bucket().refusing_bucket_creation();
        let result = ArchiveStore::connect(store, "jenkins").await;
        assert!(matches!(
            result,
            Err(BackupError::BucketProvisioningFailure(name)) if name == "test-bucket"
        ));
    }

    #[test]
    fn test_verify_upload() {
        let mut stored = StoredObject {
            key: "k".into(),
            kind: ObjectKind::Object,
            size_bytes: 3,
        };
        assert!(verify_upload(&stored).is_ok());

        stored.kind = ObjectKind::Prefix;
        assert!(matches!(
            verify_upload(&stored),
            Err(BackupError::UploadError { kind: ObjectKind::Prefix, .. })
        ));

        stored.kind = ObjectKind::Missing;
        assert!(verify_upload(&stored).is_err());
    }

    #[tokio::test]
    async fn test_upload_uses_file_name_as_key() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("jenkins_berman_20121107_1721.tar.bz2");
        std::fs::write(&path, b"archive").unwrap();

        let store = ArchiveStore::connect(MemoryStore::new(), "jenkins").await.unwrap();
        let stored = store.upload(&path).await.unwrap();

        assert_eq!(stored.key, "jenkins_berman_20121107_1721.tar.bz2");
        assert_eq!(stored.size_bytes, 7);
        assert!(store.inner().exists(&stored.key).await.unwrap());
    }

    #[tokio::test]
    async fn test_upload_of_unexpected_kind_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("jenkins_berman_20121107_1721.tar.bz2");
        std::fs::write(&path, b"archive").unwrap();

        let store = ArchiveStore::connect(MemoryStore::new().reporting(ObjectKind::Missing), "jenkins")
            .await
            .unwrap();
        let result = store.upload(&path).await;

        assert!(matches!(result, Err(BackupError::UploadError { .. })));
    }

    #[tokio::test]
    async fn test_listings_are_sorted_and_scoped() {
        let store = MemoryStore::new()
            .with_object("jenkins_perseo_20121107_0035.tar.bz2", 5)
            .with_object("jenkins_berman_20121107_1745.tar.bz2", 2)
            .with_object("jenkins_berman_20121107_1721.tar.bz2", 1)
            .with_object("unrelated/object", 9);
        let store = ArchiveStore::connect(store, "jenkins").await.unwrap();

        assert_eq!(
            store.list_backups_for_host("berman").await.unwrap(),
            vec![
                entry("jenkins_berman_20121107_1721.tar.bz2", 1),
                entry("jenkins_berman_20121107_1745.tar.bz2", 2),
            ]
        );
        assert_eq!(
            store.list_backups_for_all_hosts().await.unwrap(),
            vec![
                entry("jenkins_berman_20121107_1721.tar.bz2", 1),
                entry("jenkins_berman_20121107_1745.tar.bz2", 2),
                entry("jenkins_perseo_20121107_0035.tar.bz2", 5),
            ]
        );
    }

    #[tokio::test]
    async fn test_download_writes_file_and_reports_progress() {
        let temp = TempDir::new().unwrap();
        let store = MemoryStore::new()
            .with_chunk_size(2)
            .with_object_bytes("jenkins_berman_20121107_1721.tar.bz2", b"0123456789".to_vec());
        let store = ArchiveStore::connect(store, "jenkins").await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressCallback = Arc::new(move |p| sink.lock().unwrap().push(p));

        let dest = store
            .download("jenkins_berman_20121107_1721.tar.bz2", temp.path(), 2, callback)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"0123456789");
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2], Progress::Finished { chunks: 5, bytes: 10 });
    }

    #[tokio::test]
    async fn test_download_missing_key_fails() {
        let temp = TempDir::new().unwrap();
        let store = ArchiveStore::connect(MemoryStore::new(), "jenkins").await.unwrap();
        let callback: ProgressCallback = Arc::new(|_| {});

        let result = store.download("nope.tar.bz2", temp.path(), 10, callback).await;
        assert!(matches!(result, Err(BackupError::Store(_))));
        assert!(!temp.path().join("nope.tar.bz2").exists());
    }
}

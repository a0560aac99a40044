//! In-memory [`RemoteStore`] for tests.

use super::{ObjectKind, ObjectStream, RemoteStore, StoredObject};
use crate::archive::naming::ArchiveEntry;
use crate::utils::errors::{BackupError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tokio::io::AsyncReadExt;

pub struct MemoryStore {
    bucket_present: Mutex<bool>,
    creation_works: bool,
    put_kind: ObjectKind,
    chunk_size: usize,
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    deleted: Mutex<Vec<String>>,
    fail_delete: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            bucket_present: Mutex::new(true),
            creation_works: true,
            put_kind: ObjectKind::Object,
            chunk_size: 4096,
            objects: Mutex::new(BTreeMap::new()),
            deleted: Mutex::new(Vec::new()),
            fail_delete: None,
        }
    }

    pub fn without_bucket() -> Self {
        let store = Self::new();
        *store.bucket_present.lock().unwrap() = false;
        store
    }

    pub fn refusing_bucket_creation(mut self) -> Self {
        self.creation_works = false;
        self
    }

    /// Report `kind` for every successful put
    pub fn reporting(mut self, kind: ObjectKind) -> Self {
        self.put_kind = kind;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_object(self, key: &str, size: usize) -> Self {
        self.with_object_bytes(key, vec![0; size])
    }

    pub fn with_object_bytes(self, key: &str, data: Vec<u8>) -> Self {
        self.objects.lock().unwrap().insert(key.to_string(), data);
        self
    }

    /// Make deleting `key` fail
    pub fn failing_delete_of(mut self, key: &str) -> Self {
        self.fail_delete = Some(key.to_string());
        self
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn bucket(&self) -> &str {
        "test-bucket"
    }

    async fn bucket_exists(&self) -> Result<bool> {
        Ok(*self.bucket_present.lock().unwrap())
    }

    async fn create_bucket(&self) -> Result<()> {
        if self.creation_works {
            *self.bucket_present.lock().unwrap() = true;
        }
        Ok(())
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ArchiveEntry>> {
        // Reverse order: callers must not rely on store ordering
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, data)| ArchiveEntry {
                key: key.clone(),
                size_bytes: data.len() as u64,
            })
            .collect())
    }

    async fn put(&self, key: &str, mut body: tokio::fs::File) -> Result<StoredObject> {
        let mut data = Vec::new();
        body.read_to_end(&mut data).await?;
        let size_bytes = data.len() as u64;
        self.objects.lock().unwrap().insert(key.to_string(), data);

        Ok(StoredObject {
            key: key.to_string(),
            kind: self.put_kind,
            size_bytes,
        })
    }

    async fn get_stream(&self, key: &str) -> Result<ObjectStream> {
        let data = self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| BackupError::Store(format!("no such key: {key}")))?;

        let chunks: Vec<std::io::Result<Bytes>> = data
            .chunks(self.chunk_size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if self.fail_delete.as_deref() == Some(key) {
            return Err(BackupError::Store(format!("delete of {key} refused")));
        }
        self.objects.lock().unwrap().remove(key);
        self.deleted.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }
}

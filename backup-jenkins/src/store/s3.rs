use super::{ObjectKind, ObjectStream, RemoteStore, StoredObject};
use crate::archive::naming::ArchiveEntry;
use crate::config::AwsConfig;
use crate::utils::errors::{BackupError, Result};
use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use tokio_util::io::ReaderStream;
use tracing::debug;

/// S3 regions that reject an explicit location constraint
const DEFAULT_REGION: &str = "us-east-1";

pub struct S3Store {
    client: Client,
    bucket: String,
    region: String,
}

impl S3Store {
    pub async fn new(aws: &AwsConfig) -> Result<Self> {
        let credentials = Credentials::new(
            aws.access_key.clone(),
            aws.secret.clone(),
            None,
            None,
            "backup-jenkins-config",
        );
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(aws.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        Ok(Self {
            client: Client::new(&config),
            bucket: aws.bucket_name.clone(),
            region: aws.region.clone(),
        })
    }
}

fn store_error<E>(action: &str, key: &str, err: E) -> BackupError
where
    E: std::error::Error,
{
    BackupError::Store(format!("{action} {key}: {}", DisplayErrorContext(err)))
}

#[async_trait]
impl RemoteStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn bucket_exists(&self) -> Result<bool> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|s| s.is_not_found()) => Ok(false),
            Err(e) => Err(store_error("head bucket", &self.bucket, e)),
        }
    }

    async fn create_bucket(&self) -> Result<()> {
        let mut request = self.client.create_bucket().bucket(&self.bucket);
        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        request
            .send()
            .await
            .map_err(|e| store_error("create bucket", &self.bucket, e))?;
        Ok(())
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ArchiveEntry>> {
        let mut entries = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| store_error("list", prefix, e))?;
            for object in page.contents() {
                if let Some(key) = object.key() {
                    entries.push(ArchiveEntry {
                        key: key.to_string(),
                        size_bytes: object.size().unwrap_or(0).max(0) as u64,
                    });
                }
            }
        }

        Ok(entries)
    }

    async fn put(&self, key: &str, body: tokio::fs::File) -> Result<StoredObject> {
        let body = ByteStream::read_from()
            .file(body)
            .build()
            .await
            .map_err(|e| store_error("read", key, e))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| store_error("upload", key, e))?;

        // Ask the store what it now holds under the key
        let (kind, size_bytes) = match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(head) if key.ends_with('/') => (ObjectKind::Prefix, head.content_length().unwrap_or(0)),
            Ok(head) => (ObjectKind::Object, head.content_length().unwrap_or(0)),
            Err(e) if e.as_service_error().is_some_and(|s| s.is_not_found()) => {
                (ObjectKind::Missing, 0)
            }
            Err(e) => return Err(store_error("head", key, e)),
        };
        debug!("Stored {} as {:?}", key, kind);

        Ok(StoredObject {
            key: key.to_string(),
            kind,
            size_bytes: size_bytes.max(0) as u64,
        })
    }

    async fn get_stream(&self, key: &str) -> Result<ObjectStream> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| store_error("download", key, e))?;

        Ok(Box::pin(ReaderStream::new(output.body.into_async_read())))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| store_error("delete", key, e))?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|s| s.is_not_found()) => Ok(false),
            Err(e) => Err(store_error("head", key, e)),
        }
    }
}

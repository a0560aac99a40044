//! Backup executor - runs one backup end to end.
//!
//! Order of operations:
//! - Build the archive (see [`crate::archive`])
//! - Prune local archives of this host down to `backups_to_keep.local`
//! - Upload the new archive and verify the store accepted it
//! - Prune remote archives of this host down to `backups_to_keep.remote`
//!
//! Remote pruning only ever follows a verified upload.

use crate::archive::naming::{Archive, ArchiveEntry};
use crate::archive::{self, ArchiveBuilder, BuildOutcome};
use crate::config::Config;
use crate::retention;
use crate::store::{ArchiveStore, RemoteStore, StoredObject};
use crate::utils::errors::{BackupError, Result};
use chrono::NaiveDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// What a finished local phase produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalResult {
    Built { archive: Archive, pruned: usize },
    Interrupted,
}

/// What a finished remote phase produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResult {
    pub stored: StoredObject,
    pub pruned: usize,
}

pub struct BackupExecutor {
    config: Config,
    host: String,
    cancel: CancellationToken,
}

impl BackupExecutor {
    pub fn new(config: Config, host: String, cancel: CancellationToken) -> Self {
        Self {
            config,
            host,
            cancel,
        }
    }

    /// Build the archive for `timestamp` and prune old local archives.
    pub async fn build_local(&self, timestamp: NaiveDateTime) -> Result<LocalResult> {
        let mut builder = ArchiveBuilder::new(&self.config, &self.host, timestamp, self.cancel.clone());
        let archive = match builder.run().await? {
            BuildOutcome::Completed(archive) => archive,
            BuildOutcome::Interrupted => return Ok(LocalResult::Interrupted),
        };

        let pruned = self.prune_local().await?;
        Ok(LocalResult::Built { archive, pruned })
    }

    /// Delete local archives of this host beyond the local keep-count.
    pub async fn prune_local(&self) -> Result<usize> {
        let dir_base = &self.config.backup.dir_base;
        let keep = self.config.backup.backups_to_keep.local;
        if keep <= 0 {
            warn!("backups_to_keep.local is {}, the new archive is removed too", keep);
        }
        info!("Looking for old local files...");
        let entries: Vec<ArchiveEntry> =
            archive::list_local(dir_base, &self.config.backup.file_name_base, &self.host).await?;

        let removed = retention::prune(
            &entries,
            keep,
            |entry| {
                let path = dir_base.join(&entry.key);
                async move { tokio::fs::remove_file(path).await.map_err(BackupError::from) }
            },
        )
        .await?;
        info!("Removed {} local archives", removed);
        Ok(removed)
    }

    /// Upload `archive` and, once the store confirmed it, prune remote archives of this host.
    ///
    /// Fails with [`BackupError::SourceMissing`] if local pruning already
    /// removed the archive (a local keep-count of zero or less).
    pub async fn upload_and_prune<S: RemoteStore>(
        &self,
        store: &ArchiveStore<S>,
        archive: &Archive,
    ) -> Result<RemoteResult> {
        let path = self.config.backup.dir_base.join(&archive.key);
        if !tokio::fs::try_exists(&path).await? {
            return Err(BackupError::SourceMissing(path));
        }
        let stored = store.upload(&path).await?;

        info!("Looking for old remote files...");
        let entries = store.list_backups_for_host(&self.host).await?;
        let pruned = retention::prune(
            &entries,
            self.config.backup.backups_to_keep.remote,
            |entry| {
                let key = entry.key.clone();
                async move { store.delete(&key).await }
            },
        )
        .await?;
        info!("Removed {} remote archives", pruned);

        Ok(RemoteResult { stored, pruned })
    }
}

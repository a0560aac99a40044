//! Archive builder - stages Jenkins home files and compresses them.
//!
//! A build runs through:
//! - Conflict check on the staging directory (an advisory per-minute lock)
//! - Source collection
//! - Staging: copying sources under the staging directory
//! - Compression into `<staging>.tar.bz2`
//! - Removal of the staging directory
//!
//! Cancellation is observed before staging, before each staged file, before
//! compression and before each archived member. A cancelled build removes
//! both the staging directory and any partial archive and reports
//! [`BuildOutcome::Interrupted`] instead of an error.

pub mod compress;
pub mod naming;
pub mod sources;

use crate::config::Config;
use crate::utils::errors::{BackupError, Result};
use chrono::NaiveDateTime;
use naming::{Archive, ArchiveEntry, ARCHIVE_EXTENSION};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Where a build currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    Pending,
    Running,
    CleaningUp,
    Done,
}

/// Result of [`ArchiveBuilder::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The archive file exists and the staging directory is gone
    Completed(Archive),
    /// Cancellation was observed; staging directory and partial archive were removed
    Interrupted,
}

/// Staging directory for an archive: `<root>/<base>_<host>_<YYYYMMDD>_<HHMM>`.
pub fn staging_path(base: &str, host: &str, timestamp: NaiveDateTime, root: &Path) -> PathBuf {
    root.join(naming::stem(base, host, timestamp))
}

/// `<staging>.tar.bz2`
pub fn archive_path(staging_dir: &Path) -> PathBuf {
    let mut path = staging_dir.as_os_str().to_os_string();
    path.push(ARCHIVE_EXTENSION);
    PathBuf::from(path)
}

/// Called with the destination of every staged file
pub type StageHook = Arc<dyn Fn(&Path) + Send + Sync>;

/// Builds one archive of a Jenkins home for a fixed host and minute.
pub struct ArchiveBuilder {
    home: PathBuf,
    archive: Archive,
    staging_dir: PathBuf,
    verbose: bool,
    cancel: CancellationToken,
    phase: BuildPhase,
    on_staged: Option<StageHook>,
}

impl ArchiveBuilder {
    pub fn new(
        config: &Config,
        host: &str,
        timestamp: NaiveDateTime,
        cancel: CancellationToken,
    ) -> Self {
        let base = &config.backup.file_name_base;
        Self {
            home: config.jenkins.home.clone(),
            archive: Archive::new(base, host, timestamp),
            staging_dir: staging_path(base, host, timestamp, &config.backup.dir_base),
            verbose: config.verbose,
            cancel,
            phase: BuildPhase::Pending,
            on_staged: None,
        }
    }

    /// Observe staging progress, one call per copied file.
    pub fn on_staged(mut self, hook: StageHook) -> Self {
        self.on_staged = Some(hook);
        self
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    pub fn archive_path(&self) -> PathBuf {
        archive_path(&self.staging_dir)
    }

    pub fn phase(&self) -> BuildPhase {
        self.phase
    }

    /// Build the archive, or clean up if cancelled along the way.
    ///
    /// Fails with [`BackupError::StagingConflict`] before touching anything
    /// if the staging directory or the archive of this minute already exists.
    pub async fn run(&mut self) -> Result<BuildOutcome> {
        if tokio::fs::try_exists(&self.staging_dir).await? {
            return Err(BackupError::StagingConflict(self.staging_dir.clone()));
        }
        let archive_path = self.archive_path();
        if tokio::fs::try_exists(&archive_path).await? {
            return Err(BackupError::StagingConflict(archive_path));
        }

        self.phase = BuildPhase::Running;
        let result = self.finalize().await;

        let outcome = match result {
            Ok(archive) => Ok(BuildOutcome::Completed(archive)),
            Err(BackupError::Cancelled) => {
                self.phase = BuildPhase::CleaningUp;
                warn!("Backup interrupted, cleaning up");
                self.cleanup().await;
                Ok(BuildOutcome::Interrupted)
            }
            Err(e) => Err(e),
        };

        self.phase = BuildPhase::Done;
        outcome
    }

    /// Collect, stage, compress, then drop the staging directory.
    async fn finalize(&self) -> Result<Archive> {
        self.checkpoint()?;

        let home = self.home.clone();
        let sources =
            tokio::task::spawn_blocking(move || sources::collect_sources(&home)).await??;
        info!(
            "Collected {} files from {}",
            sources.len(),
            self.home.display()
        );

        tokio::fs::create_dir_all(&self.staging_dir).await?;
        let verbose = self.verbose;
        let hook = self.on_staged.clone();
        stage(&sources, &self.home, &self.staging_dir, &self.cancel, |dest| {
            if verbose {
                info!("cp {}", dest.display());
            }
            if let Some(hook) = &hook {
                hook(dest);
            }
        })
        .await?;

        self.checkpoint()?;
        let archive_path = compress(&self.staging_dir, self.verbose, &self.cancel).await?;

        info!("Removing {}", self.staging_dir.display());
        tokio::fs::remove_dir_all(&self.staging_dir).await?;

        let size = tokio::fs::metadata(&archive_path).await?.len();
        info!("Created {} ({} bytes)", archive_path.display(), size);

        Ok(self.archive.clone().with_size(size))
    }

    /// Best-effort removal of the staging directory and the archive file.
    pub async fn cleanup(&self) {
        info!("Removing {}", self.staging_dir.display());
        if let Err(e) = tokio::fs::remove_dir_all(&self.staging_dir).await {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", self.staging_dir.display(), e);
            }
        }

        let archive_path = self.archive_path();
        info!("Removing {}", archive_path.display());
        if let Err(e) = tokio::fs::remove_file(&archive_path).await {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", archive_path.display(), e);
            }
        }
    }

    fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(BackupError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Copy each source under `staging_dir`, keeping its path relative to `home`.
///
/// Every source must still be a regular file; a vanished one aborts staging
/// with [`BackupError::SourceMissing`]. `on_staged` sees each destination path.
pub async fn stage<F>(
    paths: &[PathBuf],
    home: &Path,
    staging_dir: &Path,
    cancel: &CancellationToken,
    mut on_staged: F,
) -> Result<usize>
where
    F: FnMut(&Path),
{
    for path in paths {
        if cancel.is_cancelled() {
            return Err(BackupError::Cancelled);
        }

        let is_file = tokio::fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(BackupError::SourceMissing(path.clone()));
        }

        let relative = path.strip_prefix(home).map_err(|_| {
            BackupError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("{} is outside {}", path.display(), home.display()),
            ))
        })?;
        let dest = staging_dir.join(relative);

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(path, &dest).await?;
        on_staged(&dest);
    }

    debug!("Staged {} files into {}", paths.len(), staging_dir.display());
    Ok(paths.len())
}

/// Compress `staging_dir` into `<staging_dir>.tar.bz2`.
pub async fn compress(
    staging_dir: &Path,
    verbose: bool,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    let output = archive_path(staging_dir);
    info!("Compressing {} into {}", staging_dir.display(), output.display());

    let source = staging_dir.to_path_buf();
    let target = output.clone();
    let cancel = cancel.clone();
    tokio::task::spawn_blocking(move || {
        compress::write_tar_bz2(&source, &target, verbose, &cancel)
    })
    .await??;

    if !tokio::fs::metadata(&output)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
    {
        return Err(BackupError::CompressionFailure(output));
    }

    Ok(output)
}

/// Local archives of `host`, sorted by key.
pub async fn list_local(dir_base: &Path, base: &str, host: &str) -> Result<Vec<ArchiveEntry>> {
    let prefix = naming::host_prefix(base, host);
    let mut entries = Vec::new();

    let mut dir = match tokio::fs::read_dir(dir_base).await {
        Ok(dir) => dir,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(entries),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = dir.next_entry().await? {
        let key = entry.file_name().to_string_lossy().into_owned();
        if !key.starts_with(&prefix) || !key.ends_with(ARCHIVE_EXTENSION) {
            continue;
        }
        let metadata = entry.metadata().await?;
        if metadata.is_file() {
            entries.push(ArchiveEntry {
                key,
                size_bytes: metadata.len(),
            });
        }
    }

    entries.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(entries)
}

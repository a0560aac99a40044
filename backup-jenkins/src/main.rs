//! backup-jenkins - main entry point
//!
//! Archives a Jenkins home, uploads the archive to S3 and prunes old copies.
//! Also lists and downloads stored archives.

use anyhow::Result;
use backup_jenkins::archive::{self, naming};
use backup_jenkins::catalog;
use backup_jenkins::config::{Config, DEFAULT_CONFIG_PATH};
use backup_jenkins::executor::{BackupExecutor, LocalResult};
use backup_jenkins::shutdown::ShutdownCoordinator;
use backup_jenkins::store::{ArchiveStore, S3Store};
use backup_jenkins::transfer::progress_stream::{hash_marks, DEFAULT_MARKER_EVERY};
use backup_jenkins::utils;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Download the archive with this key into the current directory
    #[arg(short, long, value_name = "KEY")]
    download: Option<String>,

    /// List remote archives of every host
    #[arg(short, long)]
    list: bool,

    /// List local archives of this host
    #[arg(short = 'o', long)]
    list_local: bool,

    /// Build the archive and prune locally, skip the upload
    #[arg(short = 'O', long)]
    only_local: bool,

    /// Log every staged file and archived member
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let mut config = Config::from_file(&config_path)?;
    config.verbose |= args.verbose;

    utils::logger::init(&config.log.level, config.verbose)?;

    if let Some(key) = args.download.as_deref() {
        return download(&config, key).await;
    }
    if args.list {
        return list_remote(&config).await;
    }
    if args.list_local {
        return list_local(&config).await;
    }

    backup(&config, args.only_local).await
}

async fn connect(config: &Config) -> Result<ArchiveStore<S3Store>> {
    let s3 = S3Store::new(&config.aws).await?;
    Ok(ArchiveStore::connect(s3, &config.backup.file_name_base).await?)
}

async fn download(config: &Config, key: &str) -> Result<()> {
    let store = connect(config).await?;
    let dest_dir = std::env::current_dir()?;
    let path = store
        .download(key, &dest_dir, DEFAULT_MARKER_EVERY, hash_marks())
        .await?;
    info!("Saved {}", path.display());
    Ok(())
}

async fn list_remote(config: &Config) -> Result<()> {
    let store = connect(config).await?;
    let entries = store.list_backups_for_all_hosts().await?;
    print!("{}", catalog::build_report(&entries, &config.backup.file_name_base)?);
    Ok(())
}

async fn list_local(config: &Config) -> Result<()> {
    let base = &config.backup.file_name_base;
    let entries = archive::list_local(&config.backup.dir_base, base, &naming::short_hostname()).await?;
    print!("{}", catalog::build_report(&entries, base)?);
    Ok(())
}

async fn backup(config: &Config, only_local: bool) -> Result<()> {
    let host = naming::short_hostname();
    info!(
        "Starting backup-jenkins v{} (host: {})",
        env!("CARGO_PKG_VERSION"),
        host
    );

    // Bucket problems should surface before spending time on the archive
    let store = if only_local {
        None
    } else {
        Some(connect(config).await?)
    };

    let shutdown = Arc::new(ShutdownCoordinator::new());
    let token = shutdown.token();
    let listener = {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move { shutdown.wait_for_signal().await })
    };

    let executor = BackupExecutor::new(config.clone(), host, token.clone());
    let result = executor.build_local(naming::current_timestamp()).await;

    let outcome = match result {
        Ok(LocalResult::Built { archive, pruned }) => {
            info!("Created {} ({} old local archives removed)", archive.key, pruned);
            match store {
                Some(store) => {
                    tokio::select! {
                        remote = executor.upload_and_prune(&store, &archive) => {
                            remote.map(|r| info!("Stored {} ({} old remote archives removed)", r.stored.key, r.pruned))
                        }
                        _ = token.cancelled() => {
                            warn!("Interrupted, {} stays local only", archive.key);
                            Ok(())
                        }
                    }
                }
                None => Ok(()),
            }
        }
        Ok(LocalResult::Interrupted) => {
            warn!("Backup interrupted, staging files removed");
            Ok(())
        }
        Err(e) => Err(e),
    };

    listener.abort();
    Ok(outcome?)
}

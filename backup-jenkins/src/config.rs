//! Configuration management for the backup tool.
//!
//! Loads configuration from a TOML file into typed sections.

use crate::retention::RetentionPolicy;
use crate::utils::errors::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file used when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log every staged file and archived member
    #[serde(default)]
    pub verbose: bool,

    pub jenkins: JenkinsConfig,
    pub backup: BackupConfig,
    pub aws: AwsConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JenkinsConfig {
    /// Jenkins home directory (the source of every archived file)
    pub home: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Directory holding staging directories and local archives
    pub dir_base: PathBuf,

    /// Base name shared by every archive of this service
    pub file_name_base: String,

    /// Number of archives kept locally and remotely
    pub backups_to_keep: RetentionPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    pub access_key: String,
    pub secret: String,
    pub bucket_name: String,

    #[serde(default = "default_region")]
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the archive naming and the object store cannot work with
    pub fn validate(&self) -> Result<()> {
        let base = &self.backup.file_name_base;
        if base.is_empty() {
            return Err(BackupError::Config("backup.file_name_base is empty".into()));
        }
        if base.contains('/') {
            return Err(BackupError::Config(format!(
                "backup.file_name_base must not contain '/': {base}"
            )));
        }
        if self.aws.bucket_name.is_empty() {
            return Err(BackupError::Config("aws.bucket_name is empty".into()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            verbose: false,
            jenkins: JenkinsConfig {
                home: PathBuf::from("/var/lib/jenkins"),
            },
            backup: BackupConfig {
                dir_base: PathBuf::from("/var/backups/jenkins"),
                file_name_base: "jenkins".to_string(),
                backups_to_keep: RetentionPolicy {
                    local: 2,
                    remote: 5,
                },
            },
            aws: AwsConfig {
                access_key: String::new(),
                secret: String::new(),
                bucket_name: "jenkins-backups".to_string(),
                region: default_region(),
            },
            log: LogConfig::default(),
        }
    }
}

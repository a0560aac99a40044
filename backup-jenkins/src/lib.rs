//! Jenkins backup library
//!
//! Builds point-in-time tar.bz2 archives of a Jenkins home, keeps a bounded
//! number of them locally and in an S3 bucket, and reports what is stored.

pub mod archive;
pub mod catalog;
pub mod config;
pub mod executor;
pub mod fs;
pub mod retention;
pub mod shutdown;
pub mod store;
pub mod transfer;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::{BackupError, Result};

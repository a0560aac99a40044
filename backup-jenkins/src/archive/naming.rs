//! Archive naming: `<base>_<host>_<YYYYMMDD>_<HHMM>.tar.bz2`.
//!
//! The date and time components are zero-padded, so sorting keys as strings
//! sorts archives of the same base and host chronologically. Retention and
//! the catalog both depend on that.
//!
//! Hostnames containing `_` cannot be decoded unambiguously and are not
//! supported.

use crate::utils::errors::{BackupError, Result};
use chrono::{Local, NaiveDateTime, Timelike};

pub const ARCHIVE_EXTENSION: &str = ".tar.bz2";

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M";

/// One backup unit, identified by its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub base: String,
    pub host: String,
    pub timestamp: NaiveDateTime,
    pub key: String,
    pub size_bytes: u64,
}

impl Archive {
    pub fn new(base: &str, host: &str, timestamp: NaiveDateTime) -> Self {
        Self {
            base: base.to_string(),
            host: host.to_string(),
            timestamp,
            key: encode(base, host, timestamp),
            size_bytes: 0,
        }
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = size_bytes;
        self
    }
}

/// An archive as seen in a listing: key plus size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub key: String,
    pub size_bytes: u64,
}

impl AsRef<str> for ArchiveEntry {
    fn as_ref(&self) -> &str {
        &self.key
    }
}

/// `<base>_<host>_<YYYYMMDD>_<HHMM>`, the key without its extension.
pub fn stem(base: &str, host: &str, timestamp: NaiveDateTime) -> String {
    format!("{}_{}_{}", base, host, timestamp.format(TIMESTAMP_FORMAT))
}

pub fn encode(base: &str, host: &str, timestamp: NaiveDateTime) -> String {
    format!("{}{}", stem(base, host, timestamp), ARCHIVE_EXTENSION)
}

/// Prefix shared by every archive of `host`.
pub fn host_prefix(base: &str, host: &str) -> String {
    format!("{base}_{host}_")
}

/// Prefix shared by every archive of the service, whatever the host.
pub fn service_prefix(base: &str) -> String {
    format!("{base}_")
}

/// Recover `(host, timestamp)` from an archive key.
pub fn decode(key: &str, base: &str) -> Result<(String, NaiveDateTime)> {
    let malformed = || BackupError::MalformedKey(key.to_string());

    let rest = key
        .strip_prefix(&service_prefix(base))
        .and_then(|rest| rest.strip_suffix(ARCHIVE_EXTENSION))
        .ok_or_else(malformed)?;

    let parts: Vec<&str> = rest.split('_').collect();
    let [host, date, time] = parts.as_slice() else {
        return Err(malformed());
    };
    if host.is_empty() || date.len() != 8 || time.len() != 4 {
        return Err(malformed());
    }

    let timestamp = NaiveDateTime::parse_from_str(&format!("{date}_{time}"), TIMESTAMP_FORMAT)
        .map_err(|_| malformed())?;

    Ok((host.to_string(), timestamp))
}

/// Local wall-clock time truncated to the minute.
pub fn current_timestamp() -> NaiveDateTime {
    truncate_to_minute(Local::now().naive_local())
}

pub fn truncate_to_minute(timestamp: NaiveDateTime) -> NaiveDateTime {
    timestamp
        .date()
        .and_hms_opt(timestamp.hour(), timestamp.minute(), 0)
        .unwrap_or(timestamp)
}

/// Short hostname (up to the first `.`), like `hostname -s`.
pub fn short_hostname() -> String {
    let full = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string());

    match full.split('.').next() {
        Some(short) if !short.is_empty() => short.to_string(),
        _ => full,
    }
}

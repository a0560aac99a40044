//! Human-readable, host-grouped report of archives.
//!
//! ```text
//! Berman:
//!   - 2012/11/07 17:21 key: jenkins_berman_20121107_1721.tar.bz2 (84.65 MB)
//!
//! ```
//!
//! Hosts are sorted by name; entries keep their input order, so callers pass
//! listings already sorted by key.

use crate::archive::naming::{self, ArchiveEntry};
use crate::utils::errors::Result;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fmt;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub timestamp: NaiveDateTime,
    pub key: String,
    pub size_mb: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    hosts: BTreeMap<String, Vec<CatalogEntry>>,
}

impl Catalog {
    /// Group `entries` by host. Any key that does not decode fails the whole report.
    pub fn build(entries: &[ArchiveEntry], base: &str) -> Result<Self> {
        let mut hosts: BTreeMap<String, Vec<CatalogEntry>> = BTreeMap::new();

        for entry in entries {
            let (host, timestamp) = naming::decode(&entry.key, base)?;
            hosts.entry(host).or_default().push(CatalogEntry {
                timestamp,
                key: entry.key.clone(),
                size_mb: entry.size_bytes as f64 / BYTES_PER_MB,
            });
        }

        Ok(Self { hosts })
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.hosts.keys().map(String::as_str)
    }

    pub fn entries(&self, host: &str) -> &[CatalogEntry] {
        self.hosts.get(host).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

impl fmt::Display for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (host, entries) in &self.hosts {
            writeln!(f, "{}:", capitalize(host))?;
            for entry in entries {
                writeln!(
                    f,
                    "  - {} key: {} ({:.2} MB)",
                    entry.timestamp.format("%Y/%m/%d %H:%M"),
                    entry.key,
                    entry.size_mb
                )?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Render the report for `entries` in one step.
pub fn build_report(entries: &[ArchiveEntry], base: &str) -> Result<String> {
    Ok(Catalog::build(entries, base)?.to_string())
}

/// Upper-case first character, lower-case the rest.
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

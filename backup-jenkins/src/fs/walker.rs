//! Directory traversal for source collection and archiving.
//!
//! Replaces `find`-style lookups with a bounded-depth walk filtered by exact
//! file name, and lists directory trees for the tar writer.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Options for directory walking
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Follow symbolic links
    pub follow_links: bool,

    /// Maximum depth (None = unlimited); the root itself is depth 0
    pub max_depth: Option<usize>,

    /// Keep only files with one of these exact names (empty = keep all)
    pub file_names: Vec<String>,
}

impl WalkOptions {
    /// Files named exactly one of `names`, at most `max_depth` levels down
    pub fn named(names: &[&str], max_depth: usize) -> Self {
        Self {
            follow_links: false,
            max_depth: Some(max_depth),
            file_names: names.iter().map(|n| n.to_string()).collect(),
        }
    }
}

/// Information about a file discovered during walking
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Full path to the file
    pub path: PathBuf,

    /// Relative path from the root
    pub relative_path: PathBuf,

    /// File size in bytes
    pub size: u64,

    /// File depth from root
    pub depth: usize,
}

impl FileInfo {
    fn from_entry(entry: &DirEntry, root: &Path) -> Result<Self, walkdir::Error> {
        let metadata = entry.metadata()?;
        let path = entry.path().to_path_buf();
        let relative_path = path.strip_prefix(root).unwrap_or(&path).to_path_buf();

        Ok(Self {
            path,
            relative_path,
            size: metadata.len(),
            depth: entry.depth(),
        })
    }
}

/// Walk a directory tree and collect its regular files, sorted by path.
///
/// A missing root yields no files rather than an error.
pub fn walk_directory(root: &Path, options: &WalkOptions) -> Result<Vec<FileInfo>, walkdir::Error> {
    let mut files = Vec::new();

    if !root.is_dir() {
        return Ok(files);
    }

    let mut walker = WalkDir::new(root)
        .follow_links(options.follow_links)
        .sort_by_file_name();

    if let Some(max_depth) = options.max_depth {
        walker = walker.max_depth(max_depth);
    }

    for entry in walker {
        let entry = entry?;

        // Symlinks to files are kept only when following links
        if !entry.file_type().is_file() {
            continue;
        }

        if !matches_name(&entry, &options.file_names) {
            continue;
        }

        files.push(FileInfo::from_entry(&entry, root)?);
    }

    Ok(files)
}

fn matches_name(entry: &DirEntry, names: &[String]) -> bool {
    if names.is_empty() {
        return true;
    }
    let file_name = entry.file_name().to_string_lossy();
    names.iter().any(|name| *name == file_name)
}

//! Selection of the Jenkins home files that go into an archive.
//!
//! The selection is fixed: the top-level config, installed plugin archives,
//! `userContent/` files, and every `config.xml` or `nextBuildNumber` at most
//! three levels below the home (jobs, users, nodes, views). Missing
//! directories contribute nothing.

use crate::fs::walker::{walk_directory, WalkOptions};
use crate::utils::errors::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.xml";

pub const PLUGIN_DIR: &str = "plugins";
pub const PLUGIN_TYPES: [&str; 2] = ["jpi", "hpi"];
/// Enabled, pinned and disabled variants of a plugin archive
pub const PLUGIN_STATES: [&str; 3] = ["", ".pinned", ".disabled"];

pub const USER_CONTENT_DIR: &str = "userContent";

pub const METADATA_FILES: [&str; 2] = ["config.xml", "nextBuildNumber"];
/// Counted from the home: `jobs/<job>/config.xml` is depth 3
pub const METADATA_MAX_DEPTH: usize = 3;

/// Absolute paths of every file to back up under `home`.
pub fn collect_sources(home: &Path) -> Result<Vec<PathBuf>> {
    let mut sources = Vec::new();

    let config = home.join(CONFIG_FILE);
    if config.is_file() {
        sources.push(config);
    }

    sources.extend(plugin_files(home)?);
    sources.extend(list_files(&home.join(USER_CONTENT_DIR))?);
    sources.extend(metadata_files(home)?);

    let mut seen = HashSet::new();
    sources.retain(|path| seen.insert(path.clone()));

    Ok(sources)
}

fn plugin_files(home: &Path) -> Result<Vec<PathBuf>> {
    let installed = list_files(&home.join(PLUGIN_DIR))?;
    let mut files = Vec::new();

    for plugin_type in PLUGIN_TYPES {
        for state in PLUGIN_STATES {
            let suffix = format!(".{plugin_type}{state}");
            files.extend(
                installed
                    .iter()
                    .filter(|path| has_suffix(path, &suffix))
                    .cloned(),
            );
        }
    }

    Ok(files)
}

fn metadata_files(home: &Path) -> Result<Vec<PathBuf>> {
    let options = WalkOptions::named(&METADATA_FILES, METADATA_MAX_DEPTH);
    let found = walk_directory(home, &options)?;
    Ok(found.into_iter().map(|f| f.path).collect())
}

/// Regular files directly inside `dir`, sorted; nothing if `dir` is absent.
fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    Ok(files)
}

fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().ends_with(suffix))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, rel.as_bytes()).unwrap();
    }

    fn relative(home: &Path, files: Vec<PathBuf>) -> Vec<String> {
        files
            .into_iter()
            .map(|p| p.strip_prefix(home).unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_empty_home_collects_nothing() {
        let home = TempDir::new().unwrap();
        assert!(collect_sources(home.path()).unwrap().is_empty());
    }

    #[test]
    fn test_collects_every_selection() {
        let home = TempDir::new().unwrap();
        let root = home.path();

        touch(root, "config.xml");
        touch(root, "secret.key");
        touch(root, "plugins/git.jpi");
        touch(root, "plugins/ant.jpi.pinned");
        touch(root, "plugins/old.jpi.disabled");
        touch(root, "plugins/legacy.hpi");
        touch(root, "plugins/git/META-INF/MANIFEST.MF");
        touch(root, "plugins/notes.txt");
        touch(root, "userContent/readme.txt");
        touch(root, "userContent/nested/skipped.txt");
        touch(root, "jobs/build/config.xml");
        touch(root, "jobs/build/nextBuildNumber");
        touch(root, "jobs/build/builds/1/log");
        touch(root, "jobs/folder/jobs/inner/config.xml");
        touch(root, "users/admin/config.xml");

        let sources = relative(root, collect_sources(root).unwrap());

        assert_eq!(
            sources,
            vec![
                "config.xml",
                "plugins/git.jpi",
                "plugins/ant.jpi.pinned",
                "plugins/old.jpi.disabled",
                "plugins/legacy.hpi",
                "userContent/readme.txt",
                "jobs/build/config.xml",
                "jobs/build/nextBuildNumber",
                "users/admin/config.xml",
            ]
        );
    }

    #[test]
    fn test_metadata_depth_counts_from_home() {
        let home = TempDir::new().unwrap();
        let root = home.path();

        touch(root, "jobs/a/config.xml");
        touch(root, "jobs/a/workspace/config.xml");
        touch(root, "nodes/agent1/config.xml");
        touch(root, "views/all/config.xml");

        let sources = relative(root, collect_sources(root).unwrap());

        assert_eq!(
            sources,
            vec![
                "jobs/a/config.xml",
                "nodes/agent1/config.xml",
                "views/all/config.xml",
            ]
        );
    }

    #[test]
    fn test_paths_are_absolute_under_home() {
        let home = TempDir::new().unwrap();
        touch(home.path(), "jobs/a/config.xml");

        let sources = collect_sources(home.path()).unwrap();
        assert_eq!(sources.len(), 1);
        assert!(sources[0].starts_with(home.path()));
        assert!(sources[0].is_absolute());
    }
}

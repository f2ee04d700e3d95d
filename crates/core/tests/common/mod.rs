//! Shared test helpers for core integration tests.

#![allow(dead_code)]

use moai_core::config::{bundled_template_root, InstallationConfig};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Config against the bundled templates with backups disabled
pub fn quiet_config(project: &Path, name: &str) -> InstallationConfig {
    let mut config = InstallationConfig::new(project, name);
    config.backup_enabled = false;
    config.template_path = Some(bundled_template_root());
    config
}

/// Every file below `root`, relative to it
pub fn file_set(root: &Path) -> BTreeSet<PathBuf> {
    let mut files = BTreeSet::new();
    collect(root, root, &mut files);
    files
}

fn collect(root: &Path, dir: &Path, files: &mut BTreeSet<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect(root, &path, files);
        } else if let Ok(relative) = path.strip_prefix(root) {
            files.insert(relative.to_path_buf());
        }
    }
}

/// Directories in `project` whose name marks them as backups
pub fn backup_dirs(project: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(project) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().starts_with(".moai-backup-"))
                .unwrap_or(false)
        })
        .collect();
    dirs.sort();
    dirs
}

/// Write `content` to `root/relative`, creating parents
pub fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

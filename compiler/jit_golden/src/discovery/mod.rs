//! Fixture discovery.
//!
//! Convention: every file whose name ends in `_test.txt` is a fixture.
//! Files ending in `_static_test.txt` lower their source in static mode.

use std::fs;
use std::path::{Path, PathBuf};

/// File-name suffix shared by all fixtures.
pub const FIXTURE_SUFFIX: &str = "_test.txt";

fn is_fixture(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(FIXTURE_SUFFIX) && !name.starts_with('.'))
}

/// All fixtures under `root`, sorted by path.
pub fn discover_fixtures(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    discover_recursive(root, &mut files);
    files.sort();
    files
}

fn discover_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        tracing::warn!(dir = %dir.display(), "cannot read fixture directory");
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        if path.is_dir() {
            if name != "target" {
                discover_recursive(&path, files);
            }
        } else if is_fixture(&path) {
            files.push(path);
        }
    }
}

/// Fixtures named by `path`: the file itself, or everything under a directory.
pub fn discover_fixtures_in(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        if is_fixture(path) {
            vec![path.to_path_buf()]
        } else {
            vec![]
        }
    } else if path.is_dir() {
        discover_fixtures(path)
    } else {
        vec![]
    }
}

//! On-disk tree snapshots.
//!
//! Snapshots list every entry below a directory as a relative,
//! slash-separated path. Directories end with `/`.

use std::path::Path;

use quarry_vfs::sidecar::is_hidden_name;
use walkdir::WalkDir;

/// Every entry below `root`, sidecar records included, sorted.
///
/// # Panics
///
/// Panics if the tree cannot be walked.
#[must_use]
pub fn tree_snapshot(root: &Path) -> Vec<String> {
    snapshot(root, true)
}

/// Entries below `root` with `.vfs` and `.git` subtrees left out.
///
/// # Panics
///
/// Panics if the tree cannot be walked.
#[must_use]
pub fn visible_snapshot(root: &Path) -> Vec<String> {
    snapshot(root, false)
}

fn snapshot(root: &Path, include_hidden: bool) -> Vec<String> {
    let mut entries: Vec<String> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| include_hidden || !is_hidden_name(&e.file_name().to_string_lossy()))
        .map(|e| {
            let e = e.expect("Failed to walk test tree");
            let rel = e
                .path()
                .strip_prefix(root)
                .expect("Entry outside walked root")
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            if e.file_type().is_dir() {
                format!("{rel}/")
            } else {
                rel
            }
        })
        .collect();
    entries.sort();
    entries
}

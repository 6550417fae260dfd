//! CLI subcommands.

pub(crate) mod archive;
pub(crate) mod info;
pub(crate) mod locks;
pub(crate) mod props;
pub(crate) mod tree;

use anyhow::{Context, Result};
use quarry_vfs::{MountPoint, VfsPath, VirtualFile};

/// Resolve a logical path to an existing item.
pub(crate) fn resolve(mount: &MountPoint, path: &str) -> Result<VirtualFile> {
    let vpath = VfsPath::parse(path).with_context(|| format!("invalid path '{path}'"))?;
    mount
        .get_by_path(&vpath)
        .with_context(|| format!("cannot resolve '{vpath}'"))
}

/// Split a logical path into its existing parent folder and final name.
pub(crate) fn parent_and_name(mount: &MountPoint, path: &str) -> Result<(VirtualFile, String)> {
    let vpath = VfsPath::parse(path).with_context(|| format!("invalid path '{path}'"))?;
    let parent = vpath
        .parent()
        .with_context(|| format!("'{vpath}' has no parent"))?;
    let parent = mount
        .get_by_path(&parent)
        .with_context(|| format!("cannot resolve parent of '{vpath}'"))?;
    Ok((parent, vpath.name().to_owned()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn mount(dir: &tempfile::TempDir) -> MountPoint {
        MountPoint::builder("cli", dir.path()).build().unwrap()
    }

    #[test]
    fn test_parent_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let m = mount(&dir);
        std::fs::create_dir(dir.path().join("docs")).unwrap();

        let (parent, name) = parent_and_name(&m, "/docs/new.txt").unwrap();
        assert_eq!(parent.path().to_string(), "/docs");
        assert_eq!(name, "new.txt");

        assert!(parent_and_name(&m, "/").is_err());
        assert!(parent_and_name(&m, "/missing/new.txt").is_err());
    }
}

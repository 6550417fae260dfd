//! Identifier and checksum commands.

use std::io::Write;

use anyhow::{Context, Result};
use quarry_vfs::MountPoint;

use super::resolve;

/// Print the identifier of a path, or with `resolve_id` the path of an
/// identifier.
pub(crate) fn id(mount: &MountPoint, value: &str, resolve_id: bool, out: &mut impl Write) -> Result<()> {
    if resolve_id {
        let item = mount
            .get_by_id(value)
            .with_context(|| format!("cannot resolve id '{value}'"))?;
        writeln!(out, "{}", item.path())?;
    } else {
        let item = resolve(mount, value)?;
        writeln!(out, "{}", item.id())?;
    }
    Ok(())
}

/// Print `md5  relative/path` for every file below a folder.
pub(crate) fn md5(mount: &MountPoint, folder: &str, out: &mut impl Write) -> Result<()> {
    let item = resolve(mount, folder)?;
    let mut sums = mount
        .count_md5_sums(&item)
        .with_context(|| format!("cannot hash '{}'", item.path()))?;
    sums.sort_by(|a, b| a.1.cmp(&b.1));
    for (digest, path) in sums {
        writeln!(out, "{digest}  {path}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::mount;

    #[test]
    fn test_id_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let m = mount(&dir);
        std::fs::write(dir.path().join("f.txt"), "x").unwrap();

        let mut out = Vec::new();
        id(&m, "/f.txt", false, &mut out).unwrap();
        let encoded = String::from_utf8(out).unwrap().trim().to_owned();

        let mut out = Vec::new();
        id(&m, &encoded, true, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().trim(), "/f.txt");
    }

    #[test]
    fn test_md5_lists_files() {
        let dir = tempfile::tempdir().unwrap();
        let m = mount(&dir);
        std::fs::create_dir(dir.path().join("d")).unwrap();
        std::fs::write(dir.path().join("d/h.txt"), "hello").unwrap();

        let mut out = Vec::new();
        md5(&m, "/d", &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("5d41402abc4b2a76b9719d911017c592"));
        assert!(text.contains("h.txt"));
    }
}

//! Tree commands: ls, mkdir, put, cat, rm, mv, cp.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use quarry_vfs::{MountPoint, VfsPath};

use super::{parent_and_name, resolve};
use crate::theme::Theme;

/// List a folder, or describe a single file.
pub(crate) fn ls(mount: &MountPoint, path: &str, long: bool, out: &mut impl Write) -> Result<()> {
    let item = resolve(mount, path)?;
    let entries = if item.is_folder() {
        mount.children(&item)?
    } else {
        vec![item]
    };

    if long {
        writeln!(
            out,
            "{:>10} {:>17} {:>6} {}",
            "SIZE".dimmed(),
            "MODIFIED".dimmed(),
            "LOCK".dimmed(),
            "NAME".dimmed()
        )?;
        writeln!(out, "{}", Theme::separator())?;
    }
    for entry in &entries {
        let name = if entry.is_folder() {
            Theme::folder(entry.name())
        } else {
            entry.name().to_owned()
        };
        if long {
            let modified = mount
                .last_modified(entry)?
                .format("%Y-%m-%d %H:%M")
                .to_string();
            let locked = if mount.is_locked(entry)? { "yes" } else { "" };
            writeln!(
                out,
                "{:>10} {:>17} {:>6} {name}",
                mount.length(entry)?,
                modified,
                locked
            )?;
        } else {
            writeln!(out, "{name}")?;
        }
    }
    Ok(())
}

/// Create a folder, possibly several levels deep.
pub(crate) fn mkdir(mount: &MountPoint, path: &str) -> Result<()> {
    let vpath = VfsPath::parse(path).with_context(|| format!("invalid path '{path}'"))?;
    let root = mount.root()?;
    let relative = vpath.elements().join("/");
    let created = mount
        .create_folder(&root, &relative)
        .with_context(|| format!("cannot create '{vpath}'"))?;
    println!("{}", Theme::success(&format!("Created {}", created.path())));
    Ok(())
}

/// Upload `source` (or stdin) to `path`, creating or replacing the file.
pub(crate) fn put(
    mount: &MountPoint,
    path: &str,
    source: Option<&Path>,
    token: Option<&str>,
) -> Result<()> {
    let input: Box<dyn Read> = match source {
        Some(p) => Box::new(File::open(p).with_context(|| format!("cannot open {}", p.display()))?),
        None => Box::new(io::stdin().lock()),
    };
    let (parent, name) = parent_and_name(mount, path)?;
    match mount.child(&parent, &name)? {
        Some(existing) => {
            mount
                .update_content(&existing, input, token)
                .with_context(|| format!("cannot update '{}'", existing.path()))?;
            println!("{}", Theme::success(&format!("Updated {}", existing.path())));
        },
        None => {
            let created = mount
                .create_file(&parent, &name, input)
                .with_context(|| format!("cannot create '{path}'"))?;
            println!("{}", Theme::success(&format!("Created {}", created.path())));
        },
    }
    Ok(())
}

/// Stream a file's content.
pub(crate) fn cat(mount: &MountPoint, path: &str, out: &mut impl Write) -> Result<()> {
    let item = resolve(mount, path)?;
    let mut content = mount
        .content(&item)
        .with_context(|| format!("cannot read '{}'", item.path()))?;
    io::copy(&mut content, out)?;
    out.flush()?;
    Ok(())
}

/// Delete a file or folder.
pub(crate) fn rm(mount: &MountPoint, path: &str, token: Option<&str>) -> Result<()> {
    let item = resolve(mount, path)?;
    mount
        .delete(&item, token)
        .with_context(|| format!("cannot delete '{}'", item.path()))?;
    println!("{}", Theme::success(&format!("Deleted {}", item.path())));
    Ok(())
}

/// Options shared by `mv` and `cp`.
pub(crate) struct Transfer<'a> {
    pub(crate) source: &'a str,
    pub(crate) dest_folder: &'a str,
    pub(crate) name: Option<&'a str>,
    pub(crate) overwrite: bool,
}

/// Move an item into another folder, or rename it in place when the
/// destination is its current parent.
pub(crate) fn mv(mount: &MountPoint, t: &Transfer<'_>, token: Option<&str>) -> Result<()> {
    let source = resolve(mount, t.source)?;
    let dest = resolve(mount, t.dest_folder)?;
    let moved = if source.path().parent().as_ref() == Some(dest.path()) {
        mount.rename(&source, t.name, None, token)
    } else {
        mount.move_to(&source, &dest, t.name, t.overwrite, token)
    }
    .with_context(|| format!("cannot move '{}'", source.path()))?;
    println!(
        "{}",
        Theme::success(&format!("Moved {} to {}", source.path(), moved.path()))
    );
    Ok(())
}

/// Copy an item into a folder.
pub(crate) fn cp(mount: &MountPoint, t: &Transfer<'_>) -> Result<()> {
    let source = resolve(mount, t.source)?;
    let dest = resolve(mount, t.dest_folder)?;
    let copied = mount
        .copy(&source, &dest, t.name, t.overwrite)
        .with_context(|| format!("cannot copy '{}'", source.path()))?;
    println!(
        "{}",
        Theme::success(&format!("Copied {} to {}", source.path(), copied.path()))
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::mount;

    #[test]
    fn test_put_cat_and_update() {
        let dir = tempfile::tempdir().unwrap();
        let m = mount(&dir);
        let src = dir.path().join("upload.bin");
        std::fs::write(&src, "first").unwrap();

        mkdir(&m, "/a/b").unwrap();
        put(&m, "/a/b/f.txt", Some(&src), None).unwrap();
        std::fs::write(&src, "second").unwrap();
        put(&m, "/a/b/f.txt", Some(&src), None).unwrap();

        let mut out = Vec::new();
        cat(&m, "/a/b/f.txt", &mut out).unwrap();
        assert_eq!(out, b"second");
    }

    #[test]
    fn test_ls_lists_children() {
        let dir = tempfile::tempdir().unwrap();
        let m = mount(&dir);
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("z.txt"), "z").unwrap();

        colored::control::set_override(false);
        let mut out = Vec::new();
        ls(&m, "/", false, &mut out).unwrap();
        let listing = String::from_utf8(out).unwrap();
        assert!(listing.contains("sub/"));
        assert!(listing.contains("z.txt"));
        assert!(!listing.contains(".vfs"));
    }

    #[test]
    fn test_mv_renames_in_place_and_moves() {
        let dir = tempfile::tempdir().unwrap();
        let m = mount(&dir);
        std::fs::create_dir(dir.path().join("dst")).unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();

        let rename = Transfer {
            source: "/a.txt",
            dest_folder: "/",
            name: Some("b.txt"),
            overwrite: false,
        };
        mv(&m, &rename, None).unwrap();
        assert!(dir.path().join("b.txt").is_file());

        let relocate = Transfer {
            source: "/b.txt",
            dest_folder: "/dst",
            name: None,
            overwrite: false,
        };
        mv(&m, &relocate, None).unwrap();
        assert!(dir.path().join("dst/b.txt").is_file());

        let copy = Transfer {
            source: "/dst/b.txt",
            dest_folder: "/",
            name: None,
            overwrite: false,
        };
        cp(&m, &copy).unwrap();
        assert!(dir.path().join("b.txt").is_file());

        rm(&m, "/dst", None).unwrap();
        assert!(!dir.path().join("dst").exists());
    }
}

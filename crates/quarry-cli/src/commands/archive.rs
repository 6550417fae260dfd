//! Zip export and import.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use quarry_vfs::MountPoint;

use super::resolve;
use crate::theme::Theme;

/// Export a folder as a zip archive. Without `output` the archive is
/// written next to the current directory under its suggested name.
pub(crate) fn zip(mount: &MountPoint, folder: &str, output: Option<&Path>) -> Result<PathBuf> {
    let item = resolve(mount, folder)?;
    let mut stream = mount
        .zip(&item, |_| true)
        .with_context(|| format!("cannot export '{}'", item.path()))?;
    let target = output.map_or_else(|| PathBuf::from(stream.name()), Path::to_path_buf);
    let absolute = std::env::current_dir()?.join(&target);
    if absolute.starts_with(mount.root_dir()) {
        bail!("refusing to write the archive inside the mounted tree");
    }
    let mut file =
        File::create(&target).with_context(|| format!("cannot create {}", target.display()))?;
    let written = io::copy(&mut stream, &mut file)?;
    println!(
        "{}",
        Theme::success(&format!("Wrote {} ({written} bytes)", target.display()))
    );
    Ok(target)
}

/// Import an archive into a folder.
pub(crate) fn unzip(
    mount: &MountPoint,
    folder: &str,
    archive: &Path,
    overwrite: bool,
    strip: usize,
) -> Result<()> {
    let item = resolve(mount, folder)?;
    let input =
        File::open(archive).with_context(|| format!("cannot open {}", archive.display()))?;
    mount
        .unzip(&item, input, overwrite, strip)
        .with_context(|| format!("cannot import into '{}'", item.path()))?;
    println!(
        "{}",
        Theme::success(&format!("Imported {} into {}", archive.display(), item.path()))
    );
    Ok(())
}

//! Advisory lock commands.

use std::time::Duration;

use anyhow::{Context, Result};
use quarry_vfs::MountPoint;

use super::resolve;
use crate::theme::Theme;

/// Lock a file and print its token. A zero timeout never expires.
pub(crate) fn lock(mount: &MountPoint, path: &str, timeout_secs: u64) -> Result<String> {
    let item = resolve(mount, path)?;
    let token = mount
        .lock(&item, Duration::from_secs(timeout_secs))
        .with_context(|| format!("cannot lock '{}'", item.path()))?;
    println!("{}", Theme::success(&format!("Locked {}", item.path())));
    println!("{}", Theme::token(&token));
    Ok(token)
}

/// Release a lock with its token.
pub(crate) fn unlock(mount: &MountPoint, path: &str, token: &str) -> Result<()> {
    let item = resolve(mount, path)?;
    mount
        .unlock(&item, token)
        .with_context(|| format!("cannot unlock '{}'", item.path()))?;
    println!("{}", Theme::success(&format!("Unlocked {}", item.path())));
    Ok(())
}

//! Property and access-list commands.

use std::io::Write;

use anyhow::{Context, Result};
use colored::Colorize;
use quarry_vfs::MountPoint;

use super::resolve;
use crate::theme::Theme;

/// Print properties and the access list of an item.
pub(crate) fn props(mount: &MountPoint, path: &str, json: bool, out: &mut impl Write) -> Result<()> {
    let item = resolve(mount, path)?;
    let properties = mount.properties(&item)?;
    let acl = mount.acl(&item)?;

    if json {
        let acl: serde_json::Map<String, serde_json::Value> = acl
            .entries()
            .into_iter()
            .map(|(principal, perms)| {
                let perms = perms
                    .iter()
                    .map(|p| serde_json::Value::from(p.as_str()))
                    .collect();
                (principal.to_string(), serde_json::Value::Array(perms))
            })
            .collect();
        let doc = serde_json::json!({
            "path": item.path().to_string(),
            "id": item.id(),
            "media_type": mount.media_type(&item)?,
            "properties": &*properties,
            "acl": acl,
        });
        serde_json::to_writer_pretty(&mut *out, &doc)?;
        writeln!(out)?;
        return Ok(());
    }

    writeln!(out, "{}", Theme::header(&item.path().to_string()))?;
    writeln!(out, "{} {}", "media type:".dimmed(), mount.media_type(&item)?)?;
    writeln!(out, "{}", Theme::separator())?;
    if properties.is_empty() {
        writeln!(out, "{}", Theme::dimmed("no properties"))?;
    }
    for (name, values) in properties.iter() {
        writeln!(out, "{name} = {}", values.join(", "))?;
    }
    writeln!(out, "{}", Theme::separator())?;
    for (principal, perms) in acl.entries() {
        let perms: Vec<&str> = perms.iter().map(|p| p.as_str()).collect();
        writeln!(out, "{principal}: {}", perms.join(", "))?;
    }
    Ok(())
}

/// Set or clear (when `value` is `None`) a single property.
pub(crate) fn setprop(
    mount: &MountPoint,
    path: &str,
    name: &str,
    value: Option<&str>,
    token: Option<&str>,
) -> Result<()> {
    let item = resolve(mount, path)?;
    mount
        .set_property(&item, name, value, token)
        .with_context(|| format!("cannot update properties of '{}'", item.path()))?;
    let verb = if value.is_some() { "Set" } else { "Cleared" };
    println!("{}", Theme::success(&format!("{verb} {name} on {}", item.path())));
    Ok(())
}

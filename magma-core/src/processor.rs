//! Filesystem steps applied to downloaded or local mods.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::fs_linker::{self, LinkOutcome};
use crate::mods::Mod;

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_str().map(|s| s.starts_with('.')).unwrap_or(false)
}

/// Renames every file and directory below `root` to lowercase, deepest entries first.
/// Dot-prefixed entries and everything under them are left alone. A no-op on Windows,
/// where the server does not care about case.
pub fn lowercase_tree(root: &Path) -> Result<usize> {
    if cfg!(windows) || !root.is_dir() {
        return Ok(0);
    }
    let entries = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("scan {}", root.display()))?;

    let mut renamed = 0;
    // reversed pre-order renames children before their parent
    for entry in entries.into_iter().rev() {
        let Some(name) = entry.file_name().to_str() else { continue };
        let lower = name.to_lowercase();
        if lower == name {
            continue;
        }
        let target = entry.path().with_file_name(&lower);
        fs::rename(entry.path(), &target)
            .with_context(|| format!("rename {} -> {}", entry.path().display(), target.display()))?;
        renamed += 1;
    }
    debug!("lowercased {renamed} entries under {}", root.display());
    Ok(renamed)
}

/// All `.bikey` files below `dir`.
pub fn find_keys(dir: &Path) -> Vec<PathBuf> {
    let mut keys: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|x| x.to_str())
                .map(|x| x.eq_ignore_ascii_case("bikey"))
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect();
    keys.sort();
    keys
}

pub fn keys_dir(server_path: &Path) -> PathBuf {
    server_path.join("keys")
}

/// Deletes the key files recorded for the mod and forgets them.
pub fn remove_keys(m: &mut Mod) -> Result<()> {
    for key in m.keys.drain(..) {
        if key.exists() {
            fs::remove_file(&key).with_context(|| format!("remove key {}", key.display()))?;
        }
    }
    Ok(())
}

/// Replaces the mod's recorded keys with the `.bikey` files found in its content.
pub fn install_keys(m: &mut Mod, server_path: &Path) -> Result<usize> {
    remove_keys(m)?;
    let content = m.content_dir(server_path);
    let found = find_keys(&content);
    if found.is_empty() {
        warn!("no .bikey files found for {} in {}", m.name, content.display());
        return Ok(0);
    }

    let dest_dir = keys_dir(server_path);
    fs::create_dir_all(&dest_dir).with_context(|| format!("create {}", dest_dir.display()))?;
    for key in found {
        let Some(file_name) = key.file_name() else { continue };
        let dest = dest_dir.join(file_name);
        fs::copy(&key, &dest).with_context(|| format!("copy {} -> {}", key.display(), dest.display()))?;
        m.keys.push(dest);
    }
    info!("installed {} key(s) for {}", m.keys.len(), m.name);
    Ok(m.keys.len())
}

/// Links a Workshop mod into the server's mod directories. `None` when the mod is not linked.
pub fn link_mod(m: &Mod, server_path: &Path) -> Result<Option<LinkOutcome>> {
    let Some(link) = m.link_path(server_path) else { return Ok(None) };
    let content = m.content_dir(server_path);
    let outcome = fs_linker::link_dir(&content, &link)?;
    if outcome != LinkOutcome::Unchanged {
        info!("linked {} -> {}", link.display(), content.display());
    }
    Ok(Some(outcome))
}

/// Removes the mod's link if it has one. Local mod directories are never touched.
pub fn unlink_mod(m: &Mod, server_path: &Path) -> Result<bool> {
    match m.link_path(server_path) {
        Some(link) => fs_linker::remove_link(&link),
        None => Ok(false),
    }
}

/// Deletes the downloaded Workshop content.
pub fn remove_content(m: &Mod, server_path: &Path) -> Result<()> {
    if m.is_local {
        return Ok(());
    }
    let dir = m.content_dir(server_path);
    if dir.exists() {
        info!("removing {}", dir.display());
        fs_linker::remove_dir(&dir)?;
    }
    Ok(())
}

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Created,
    Replaced,
    Unchanged,
}

/// True for symbolic links and, on Windows, directory junctions.
pub fn is_link(path: &Path) -> bool {
    let Ok(meta) = fs::symlink_metadata(path) else { return false };
    if meta.file_type().is_symlink() {
        return true;
    }
    #[cfg(windows)]
    {
        if junction::exists(path).unwrap_or(false) {
            return true;
        }
    }
    false
}

pub fn link_target(path: &Path) -> Option<PathBuf> {
    #[cfg(windows)]
    {
        if let Ok(target) = junction::get_target(path) {
            return Some(target);
        }
    }
    fs::read_link(path).ok()
}

/// Points `dst` at the directory `src`.
/// An existing link to `src` is left untouched; a link elsewhere is replaced.
/// Windows falls back from a symlink to a junction, then to a copy.
pub fn link_dir(src: &Path, dst: &Path) -> Result<LinkOutcome> {
    let mut outcome = LinkOutcome::Created;
    if is_link(dst) {
        if link_target(dst).as_deref() == Some(src) {
            return Ok(LinkOutcome::Unchanged);
        }
        remove_link(dst)?;
        outcome = LinkOutcome::Replaced;
    } else if fs::symlink_metadata(dst).is_ok() {
        bail!("{} already exists and is not a link", dst.display());
    }

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create parent for {}", dst.display()))?;
    }

    #[cfg(windows)]
    {
        if std::os::windows::fs::symlink_dir(src, dst).is_err() {
            if let Err(e) = junction::create(src, dst) {
                tracing::warn!("junction {} failed: {e}; copying instead", dst.display());
                copy_dir(src, dst)?;
            }
        }
    }

    #[cfg(not(windows))]
    {
        std::os::unix::fs::symlink(src, dst)
            .with_context(|| format!("symlink {} -> {}", dst.display(), src.display()))?;
    }

    Ok(outcome)
}

/// Removes `path` only if it is a link. Returns whether anything was removed.
pub fn remove_link(path: &Path) -> Result<bool> {
    if !is_link(path) {
        return Ok(false);
    }
    #[cfg(windows)]
    {
        if junction::exists(path).unwrap_or(false) {
            junction::delete(path).with_context(|| format!("remove junction {}", path.display()))?;
            fs::remove_dir(path).ok();
            return Ok(true);
        }
        fs::remove_dir(path)
            .or_else(|_| fs::remove_file(path))
            .with_context(|| format!("remove link {}", path.display()))?;
    }
    #[cfg(not(windows))]
    {
        fs::remove_file(path).with_context(|| format!("remove link {}", path.display()))?;
    }
    Ok(true)
}

pub fn copy_dir(src: &Path, dst: &Path) -> Result<u64> {
    use fs_extra::dir::{copy, CopyOptions};
    let mut opts = CopyOptions::new();
    opts.copy_inside = true;
    opts.overwrite = true;
    fs::create_dir_all(dst).ok();
    copy(src, dst, &opts).with_context(|| format!("copy dir {} -> {}", src.display(), dst.display()))
}

/// Deletes a real directory tree; a missing directory is fine.
pub fn remove_dir(path: &Path) -> Result<()> {
    fs_extra::dir::remove(path).with_context(|| format!("remove {}", path.display()))
}

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::mods::{Mod, ModKind};

const MODS_KEY: &str = "mods=";
const SERVERMODS_KEY: &str = "servermods=";

fn directive(key: &str, dir: &str, mods: &[&Mod]) -> String {
    let mut line = format!("{key}\"");
    for m in mods {
        line.push_str(&format!("{dir}/{}\\;", m.link_name()));
    }
    line.push('"');
    line
}

/// `mods="mods/@a\;mods/@b\;"` for the active required mods, in config order.
pub fn mods_line(mods: &[Mod]) -> String {
    let active: Vec<&Mod> = mods.iter().filter(|m| m.is_active && m.kind == ModKind::Required).collect();
    directive(MODS_KEY, ModKind::Required.local_dir(), &active)
}

/// `servermods="servermods/@c\;"` for the active server-only mods.
pub fn servermods_line(mods: &[Mod]) -> String {
    let active: Vec<&Mod> = mods.iter().filter(|m| m.is_active && m.kind == ModKind::ServerOnly).collect();
    directive(SERVERMODS_KEY, ModKind::ServerOnly.local_dir(), &active)
}

/// Rewrites the `mods=` and `servermods=` directives of a LinuxGSM config.
/// Blank and commented lines stay as they are; missing directives are appended.
pub fn patch_config(text: &str, mods_line: &str, servermods_line: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut saw_mods = false;
    let mut saw_servermods = false;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.starts_with('#') {
            lines.push(line.to_string());
        } else if line.starts_with(MODS_KEY) {
            saw_mods = true;
            lines.push(mods_line.to_string());
        } else if line.starts_with(SERVERMODS_KEY) {
            saw_servermods = true;
            lines.push(servermods_line.to_string());
        } else {
            lines.push(line.to_string());
        }
    }
    if !saw_mods {
        lines.push(mods_line.to_string());
    }
    if !saw_servermods {
        lines.push(servermods_line.to_string());
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Patches the LinuxGSM config at `path` for the given mods. Unchanged files are not rewritten.
pub fn update_config_file(path: &Path, mods: &[Mod]) -> Result<bool> {
    let text = fs::read_to_string(path).with_context(|| format!("read LinuxGSM config {}", path.display()))?;
    let patched = patch_config(&text, &mods_line(mods), &servermods_line(mods));
    if patched == text {
        return Ok(false);
    }
    fs::write(path, patched).with_context(|| format!("write LinuxGSM config {}", path.display()))?;
    info!("updated LinuxGSM config {}", path.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_mods() -> Vec<Mod> {
        let mut inactive = Mod::workshop(3, 3, "Disabled One", ModKind::Required);
        inactive.is_active = false;
        vec![
            Mod::workshop(1, 1, "CBA_A3", ModKind::Required),
            Mod::workshop(2, 2, "Advanced Urban Rappelling", ModKind::ServerOnly),
            inactive,
            Mod::workshop(4, 4, "JSRS", ModKind::ClientOnly),
            Mod::workshop(5, 5, "ace", ModKind::Required),
        ]
    }

    #[test]
    fn builds_directive_lines() {
        let mods = sample_mods();
        assert_eq!(mods_line(&mods), r#"mods="mods/@cba_a_3\;mods/@ace\;""#);
        assert_eq!(servermods_line(&mods), r#"servermods="servermods/@advanced_urban_rappelling\;""#);
        assert_eq!(mods_line(&[]), r#"mods="""#);
    }

    #[test]
    fn replaces_directives_and_keeps_comments() {
        let text = "# mods=\"commented\"\nip=\"0.0.0.0\"\n\nmods=\"old\"\nservermods=\"\"\n";
        let out = patch_config(text, "mods=\"new\"", "servermods=\"srv\"");
        assert_eq!(out, "# mods=\"commented\"\nip=\"0.0.0.0\"\n\nmods=\"new\"\nservermods=\"srv\"\n");
    }

    #[test]
    fn appends_missing_directives() {
        let out = patch_config("ip=\"0.0.0.0\"", "mods=\"a\"", "servermods=\"b\"");
        assert_eq!(out, "ip=\"0.0.0.0\"\nmods=\"a\"\nservermods=\"b\"\n");
    }

    #[test]
    fn patching_is_idempotent() {
        let text = "#servermods=\"x\"\r\nfn=\"arma3server\"\r\nmods=\"old\"\r\n";
        let once = patch_config(text, "mods=\"a\"", "servermods=\"b\"");
        let twice = patch_config(&once, "mods=\"a\"", "servermods=\"b\"");
        assert_eq!(once, twice);
        assert!(once.starts_with("#servermods=\"x\"\n"));
    }

    #[test]
    fn unchanged_file_is_not_rewritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("arma3server.cfg");
        fs::write(&path, "ip=\"0.0.0.0\"\n").unwrap();
        let mods = sample_mods();
        assert!(update_config_file(&path, &mods).unwrap());
        assert!(!update_config_file(&path, &mods).unwrap());
        assert!(fs::read_to_string(&path).unwrap().contains("mods=\"mods/@cba_a_3\\;mods/@ace\\;\""));
    }
}

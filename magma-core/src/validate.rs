use std::fs;
use std::path::{Path, PathBuf};

use crate::servers::ARMA3;

/// A SteamCMD executable: a file named `steamcmd`, `steamcmd.sh` or `steamcmd.exe`.
pub fn is_steamcmd(path: &Path) -> bool {
    path.is_file() && path.file_stem().and_then(|s| s.to_str()) == Some("steamcmd")
}

/// A directory holding the dedicated server executable.
pub fn is_server_dir(path: &Path) -> bool {
    if !path.is_dir() {
        return false;
    }
    let Ok(entries) = fs::read_dir(path) else { return false };
    entries.flatten().any(|entry| {
        entry.file_type().map(|t| t.is_file()).unwrap_or(false)
            && entry.file_name().to_string_lossy().starts_with(ARMA3.executable_name)
    })
}

/// LinuxGSM instance configs are plain files.
pub fn is_linuxgsm_config(path: &Path) -> bool {
    path.is_file()
}

pub fn steamcmd_hint() -> &'static str {
    "Provide a path to the SteamCMD executable (a file named steamcmd)."
}

pub fn server_hint() -> &'static str {
    "Provide the directory containing the arma3server executable."
}

pub fn linuxgsm_hint() -> &'static str {
    "Provide the path to your LinuxGSM instance config (e.g. lgsm/config-lgsm/arma3server/arma3server.cfg)."
}

/// Expands `~` and environment variables on Unix, then makes the path absolute.
pub fn expand_path(input: &str) -> PathBuf {
    let input = input.trim();
    #[cfg(unix)]
    let expanded = shellexpand::full(input)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| input.to_string());
    #[cfg(not(unix))]
    let expanded = input.to_string();

    let path = PathBuf::from(expanded);
    if path.is_absolute() {
        return path;
    }
    std::env::current_dir().map(|cwd| cwd.join(&path)).unwrap_or(path)
}

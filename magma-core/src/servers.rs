use std::path::{Path, PathBuf};

/// A dedicated server Magma knows how to manage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportedServer {
    pub name: &'static str,
    /// Prefix of the server executable inside the install directory.
    pub executable_name: &'static str,
    /// App id the Workshop items belong to.
    pub game_app_id: u32,
    /// App id of the dedicated server itself.
    pub server_app_id: u32,
}

pub const ARMA3: SupportedServer = SupportedServer {
    name: "Arma 3",
    executable_name: "arma3server",
    game_app_id: 107410,
    server_app_id: 233780,
};

/// `<server>/steamapps/workshop/content/<app id>/<item id>`
pub fn workshop_content_dir(server_path: &Path, steam_id: u64) -> PathBuf {
    server_path
        .join("steamapps")
        .join("workshop")
        .join("content")
        .join(ARMA3.game_app_id.to_string())
        .join(steam_id.to_string())
}

fn steamcmd_names() -> &'static [&'static str] {
    if cfg!(windows) {
        &["steamcmd.exe"]
    } else {
        &["steamcmd", "steamcmd.sh"]
    }
}

/// Best-effort lookup of a SteamCMD executable, used to pre-fill prompts.
pub fn detect_steamcmd() -> Option<PathBuf> {
    for name in steamcmd_names() {
        if let Ok(p) = which::which(name) {
            return Some(p);
        }
    }

    let mut roots: Vec<PathBuf> = Vec::new();
    #[cfg(unix)]
    {
        if let Ok(home) = std::env::var("HOME") {
            let home = PathBuf::from(home);
            roots.push(home.join("steamcmd"));
            roots.push(home.join(".steam").join("steamcmd"));
            roots.push(home.join(".local/share/Steam/steamcmd"));
        }
        roots.push(PathBuf::from("/usr/games"));
        roots.push(PathBuf::from("/opt/steamcmd"));
    }
    #[cfg(windows)]
    {
        roots.push(PathBuf::from("C:/steamcmd"));
        if let Ok(pf86) = std::env::var("ProgramFiles(x86)") {
            roots.push(PathBuf::from(pf86).join("steamcmd"));
        }
    }

    for root in roots {
        for name in steamcmd_names() {
            let candidate = root.join(name);
            if candidate.is_file() { return Some(candidate); }
        }
    }
    None
}

/// LinuxGSM keeps the game files in `~/serverfiles`; fall back to the working directory.
pub fn detect_server_dir() -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    #[cfg(unix)]
    {
        if let Ok(home) = std::env::var("HOME") {
            candidates.push(PathBuf::from(home).join("serverfiles"));
        }
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd);
    }
    candidates
        .into_iter()
        .find(|dir| crate::validate::is_server_dir(dir))
}

use heck::ToSnakeCase;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::servers::workshop_content_dir;

/// Who needs a mod loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ModKind {
    /// Required by the server and every client.
    #[default]
    Required,
    /// Only clients load it; the server just needs its keys.
    ClientOnly,
    /// Only the server loads it.
    ServerOnly,
}

impl ModKind {
    /// Server directory a Workshop mod is linked into. Client-only mods are never linked.
    pub fn link_dir(self) -> Option<&'static str> {
        match self {
            ModKind::Required => Some("mods"),
            ModKind::ServerOnly => Some("servermods"),
            ModKind::ClientOnly => None,
        }
    }

    /// Server directory a local mod lives in.
    pub fn local_dir(self) -> &'static str {
        match self {
            ModKind::Required => "mods",
            ModKind::ServerOnly => "servermods",
            ModKind::ClientOnly => "clientmods",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ModKind::Required => "Required",
            ModKind::ClientOnly => "Client-side",
            ModKind::ServerOnly => "Server-side",
        }
    }
}

impl fmt::Display for ModKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mod {
    /// Local sequence number, stable across Workshop id changes.
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steam_id: Option<u64>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ModKind,
    pub is_active: bool,
    pub is_local: bool,
    /// Remote `time_updated` of the installed copy (epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub keys: Vec<PathBuf>,
}

impl Mod {
    pub fn workshop(id: u32, steam_id: u64, name: impl Into<String>, kind: ModKind) -> Self {
        Self {
            id,
            steam_id: Some(steam_id),
            name: name.into(),
            kind,
            is_active: true,
            is_local: false,
            updated_at: None,
            keys: Vec::new(),
        }
    }

    pub fn local(id: u32, name: impl Into<String>, kind: ModKind) -> Self {
        Self {
            id,
            steam_id: None,
            name: name.into(),
            kind,
            is_active: true,
            is_local: true,
            updated_at: None,
            keys: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let reason = match (self.is_local, self.steam_id) {
            (true, Some(_)) => "a local mod cannot have a Workshop id",
            (false, None) => "a Workshop mod requires a Workshop id",
            _ => return Ok(()),
        };
        Err(ConfigError::InvalidMod { id: self.id, name: self.name.clone(), reason })
    }

    pub fn is_installed(&self) -> bool {
        self.updated_at.is_some()
    }

    /// `@my_awesome_mod`
    pub fn link_name(&self) -> String {
        link_name(&self.name)
    }

    /// Where the server expects the mod, if it is linked at all.
    pub fn link_path(&self, server_path: &Path) -> Option<PathBuf> {
        if self.is_local { return None; }
        self.kind.link_dir().map(|dir| server_path.join(dir).join(self.link_name()))
    }

    /// Directory holding the actual mod files.
    pub fn content_dir(&self, server_path: &Path) -> PathBuf {
        match self.steam_id {
            Some(steam_id) if !self.is_local => workshop_content_dir(server_path, steam_id),
            _ => server_path.join(self.kind.local_dir()).join(format!("@{}", self.name)),
        }
    }
}

/// `1st`, `22nd`, `103rd`, `4th`: kept as one word.
fn is_ordinal(word: &str) -> bool {
    let digits = word.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    let (head, suffix) = word.split_at(digits.len());
    if !head.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    match (head.chars().last(), suffix) {
        (Some('1'), "st") | (Some('2'), "nd") | (Some('3'), "rd") => true,
        (Some(d), "th") => !matches!(d, '1' | '2' | '3'),
        _ => false,
    }
}

/// Snake case with letters and digits in separate words, so `CBA_A3` becomes `cba_a_3`.
pub fn link_name(name: &str) -> String {
    let snake = name.to_snake_case();
    let mut words: Vec<String> = Vec::new();
    for word in snake.split('_').filter(|w| !w.is_empty()) {
        if is_ordinal(word) {
            words.push(word.to_string());
            continue;
        }
        let mut current = String::new();
        for c in word.chars() {
            let boundary = current.chars().last().is_some_and(|p| p.is_ascii_digit() != c.is_ascii_digit());
            if boundary {
                words.push(std::mem::take(&mut current));
            }
            current.push(c);
        }
        words.push(current);
    }
    format!("@{}", words.join("_"))
}

/// Steam credentials with the password held as an encrypted envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_path_for_required_mod() {
        let m = Mod::workshop(1, 555, "My Mod", ModKind::Required);
        assert_eq!(m.link_path(Path::new("/srv")), Some(PathBuf::from("/srv/mods/@my_mod")));
    }

    #[test]
    fn server_only_mods_link_into_servermods() {
        let m = Mod::workshop(2, 556, "Advanced Urban Rappelling", ModKind::ServerOnly);
        assert_eq!(
            m.link_path(Path::new("/srv")),
            Some(PathBuf::from("/srv/servermods/@advanced_urban_rappelling"))
        );
    }

    #[test]
    fn client_and_local_mods_are_not_linked() {
        let client = Mod::workshop(3, 557, "JSRS", ModKind::ClientOnly);
        assert_eq!(client.link_path(Path::new("/srv")), None);

        let local = Mod::local(4, "my_local", ModKind::Required);
        assert_eq!(local.link_path(Path::new("/srv")), None);
        assert_eq!(local.content_dir(Path::new("/srv")), PathBuf::from("/srv/mods/@my_local"));
    }

    #[test]
    fn link_names_split_letters_from_digits() {
        assert_eq!(link_name("CBA_A3"), "@cba_a_3");
        assert_eq!(link_name("ACE3 Medical"), "@ace_3_medical");
        assert_eq!(link_name("RHSUSAF 0.5.6"), "@rhsusaf_0_5_6");
        assert_eq!(link_name("3rd Infantry Div"), "@3rd_infantry_div");
        assert_eq!(link_name("Task Force Arrowhead Radio (BETA!!!)"), "@task_force_arrowhead_radio_beta");

        let m = Mod::workshop(7, 450814997, "CBA_A3", ModKind::Required);
        assert_eq!(m.link_path(Path::new("/srv")), Some(PathBuf::from("/srv/mods/@cba_a_3")));
    }

    #[test]
    fn validate_rejects_broken_invariant() {
        let mut m = Mod::local(5, "x", ModKind::Required);
        m.steam_id = Some(1);
        assert!(matches!(m.validate(), Err(ConfigError::InvalidMod { id: 5, .. })));

        let mut w = Mod::workshop(6, 2, "y", ModKind::Required);
        w.steam_id = None;
        assert!(w.validate().is_err());
    }

    #[test]
    fn serializes_with_original_field_names() {
        let m = Mod::workshop(1, 555, "CBA", ModKind::ClientOnly);
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["steamId"], 555);
        assert_eq!(json["type"], "clientOnly");
        assert_eq!(json["isActive"], true);
        assert!(json.get("updatedAt").is_none());
    }
}

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::mods::{Credentials, Mod};

pub const CONFIG_FILE: &str = "magma.json";
pub const CURRENT_VERSION: u32 = 4;

/// What `update` and `cron` do when a Workshop item no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum MissingItemPolicy {
    /// Fail the whole batch.
    #[default]
    Abort,
    /// Leave the item out and keep going.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MagmaConfig {
    pub version: u32,
    #[serde(default)]
    pub last_id: u32,
    #[serde(default)]
    pub mods: Vec<Mod>,
    pub server_path: PathBuf,
    pub steam_cmd_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux_gsm: Option<PathBuf>,
    /// `None` means SteamCMD logs in anonymously.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    /// Workshop ids whose update has been announced but not installed yet.
    #[serde(default)]
    pub cron_messages: Vec<u64>,
    #[serde(default)]
    pub on_missing_item: MissingItemPolicy,
}

impl MagmaConfig {
    pub fn new(server_path: PathBuf, steam_cmd_path: PathBuf) -> Self {
        Self {
            version: CURRENT_VERSION,
            last_id: 0,
            mods: Vec::new(),
            server_path,
            steam_cmd_path,
            linux_gsm: None,
            credentials: None,
            webhook_url: None,
            cron_messages: Vec::new(),
            on_missing_item: MissingItemPolicy::default(),
        }
    }

    /// Allocates the next local mod id.
    pub fn next_mod_id(&mut self) -> u32 {
        let highest = self.mods.iter().map(|m| m.id).max().unwrap_or(0);
        self.last_id = self.last_id.max(highest) + 1;
        self.last_id
    }

    pub fn find_mod(&self, id: u32) -> Option<&Mod> {
        self.mods.iter().find(|m| m.id == id)
    }

    pub fn find_mod_mut(&mut self, id: u32) -> Option<&mut Mod> {
        self.mods.iter_mut().find(|m| m.id == id)
    }

    pub fn find_by_steam_id(&self, steam_id: u64) -> Option<&Mod> {
        self.mods.iter().find(|m| m.steam_id == Some(steam_id))
    }

    /// Writes the given mods back over their stored copies, matched by id.
    pub fn merge_mods(&mut self, updated: &[Mod]) {
        for m in updated {
            if let Some(slot) = self.find_mod_mut(m.id) {
                *slot = m.clone();
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for m in &self.mods {
            m.validate()?;
            if !seen.insert(m.id) {
                return Err(ConfigError::InvalidMod { id: m.id, name: m.name.clone(), reason: "duplicate id" });
            }
        }
        Ok(())
    }
}

/// Whole-file access to `magma.json`.
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// The store in the current working directory.
    pub fn new() -> anyhow::Result<Self> {
        let cwd = std::env::current_dir()?;
        Ok(Self::in_dir(&cwd))
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self { path: dir.join(CONFIG_FILE) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Loads and checks the config. Fails on a missing file or any other schema version.
    pub fn load(&self) -> Result<MagmaConfig, ConfigError> {
        let value = self.load_raw()?;
        let found = value.get("version").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
        if found != CURRENT_VERSION {
            return Err(ConfigError::OutdatedConfigurationFile { found, expected: CURRENT_VERSION });
        }
        let config: MagmaConfig = serde_json::from_value(value)
            .map_err(|source| ConfigError::Json { path: self.path.clone(), source })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file without any schema checks, for `upgrade`.
    pub fn load_raw(&self) -> Result<serde_json::Value, ConfigError> {
        if !self.exists() {
            return Err(ConfigError::NotInitialized);
        }
        let text = fs::read_to_string(&self.path)
            .map_err(|source| ConfigError::Io { path: self.path.clone(), source })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json { path: self.path.clone(), source })
    }

    pub fn save(&self, config: &MagmaConfig) -> Result<(), ConfigError> {
        let value = serde_json::to_value(config)
            .map_err(|source| ConfigError::Json { path: self.path.clone(), source })?;
        self.save_raw(&value)
    }

    /// Replaces the file atomically: write a sibling temp file, then rename over the original.
    pub fn save_raw(&self, value: &serde_json::Value) -> Result<(), ConfigError> {
        let mut text = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut text, formatter);
        value
            .serialize(&mut ser)
            .map_err(|source| ConfigError::Json { path: self.path.clone(), source })?;
        text.push(b'\n');

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &text).map_err(|source| ConfigError::Io { path: tmp.clone(), source })?;
        fs::rename(&tmp, &self.path).map_err(|source| ConfigError::Io { path: self.path.clone(), source })?;
        Ok(())
    }
}

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::config::{ConfigStore, MagmaConfig};
use crate::mods::{link_name, Mod, ModKind};
use crate::steam_api::WorkshopApi;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddReport {
    pub added: Vec<Mod>,
    /// Workshop ids that were already configured.
    pub existing: Vec<u64>,
}

/// Registers Workshop items under their Workshop titles. Nothing is downloaded; every id
/// must resolve or nothing is added.
pub async fn add_workshop<A: WorkshopApi>(
    api: &A,
    config: &mut MagmaConfig,
    store: &ConfigStore,
    steam_ids: &[u64],
    kind: ModKind,
) -> Result<AddReport> {
    let mut report = AddReport::default();
    let mut fresh: Vec<u64> = Vec::new();
    for &id in steam_ids {
        if config.find_by_steam_id(id).is_some() || fresh.contains(&id) {
            report.existing.push(id);
        } else {
            fresh.push(id);
        }
    }
    if fresh.is_empty() {
        return Ok(report);
    }

    let files = api.published_files(&fresh).await.context("look up Workshop items")?;
    for file in files {
        let id = config.next_mod_id();
        let m = Mod::workshop(id, file.publishedfileid, file.title.trim(), kind);
        info!("added {} ({}) as mod {}", m.name, file.publishedfileid, id);
        config.mods.push(m.clone());
        report.added.push(m);
    }
    store.save(config)?;
    Ok(report)
}

/// Registers a mod that already lives in `<server>/<dir>/@<name>`.
pub fn add_local(config: &mut MagmaConfig, store: &ConfigStore, name: &str, kind: ModKind) -> Result<Mod> {
    let name = name.trim();
    if name.is_empty() {
        bail!("a local mod needs a name");
    }
    let dir_name = link_name(name);
    let dir = config.server_path.join(kind.local_dir()).join(&dir_name);
    if !dir.is_dir() {
        bail!("{} does not exist. Place the mod files there before adding it.", dir.display());
    }

    let stored_name = dir_name.trim_start_matches('@').to_string();
    if config.mods.iter().any(|m| m.is_local && m.name == stored_name && m.kind == kind) {
        bail!("local mod {stored_name} is already configured");
    }

    let id = config.next_mod_id();
    let m = Mod::local(id, stored_name, kind);
    config.mods.push(m.clone());
    store.save(config)?;
    info!("added local mod {} as mod {}", m.name, id);
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::testing::FakeApi;
    use std::fs;
    use tempfile::TempDir;

    fn setup(dir: &TempDir) -> (ConfigStore, MagmaConfig) {
        let store = ConfigStore::in_dir(dir.path());
        let config = MagmaConfig::new(dir.path().join("server"), dir.path().join("steamcmd"));
        store.save(&config).unwrap();
        (store, config)
    }

    #[tokio::test]
    async fn adds_new_items_and_skips_known_ones() {
        let dir = TempDir::new().unwrap();
        let (store, mut config) = setup(&dir);
        let api = FakeApi { items: vec![(555, 1), (556, 2)] };

        let report = add_workshop(&api, &mut config, &store, &[555, 556, 555], ModKind::ServerOnly).await.unwrap();
        assert_eq!(report.added.len(), 2);
        assert_eq!(report.existing, vec![555]);
        assert_eq!(report.added[0].name, "Item 555");
        assert_eq!(report.added[1].id, 2);

        let report = add_workshop(&api, &mut config, &store, &[556], ModKind::Required).await.unwrap();
        assert!(report.added.is_empty());
        assert_eq!(store.load().unwrap().mods.len(), 2);
    }

    #[tokio::test]
    async fn unknown_item_adds_nothing() {
        let dir = TempDir::new().unwrap();
        let (store, mut config) = setup(&dir);
        let api = FakeApi { items: vec![(555, 1)] };
        assert!(add_workshop(&api, &mut config, &store, &[555, 404], ModKind::Required).await.is_err());
        assert!(config.mods.is_empty());
    }

    #[test]
    fn local_mod_requires_its_directory() {
        let dir = TempDir::new().unwrap();
        let (store, mut config) = setup(&dir);
        assert!(add_local(&mut config, &store, "My Local", ModKind::Required).is_err());

        fs::create_dir_all(config.server_path.join("mods/@my_local")).unwrap();
        let m = add_local(&mut config, &store, "My Local", ModKind::Required).unwrap();
        assert_eq!(m.name, "my_local");
        assert!(m.is_local && m.steam_id.is_none());
        assert_eq!(m.content_dir(&config.server_path), config.server_path.join("mods/@my_local"));
        assert!(add_local(&mut config, &store, "my_local", ModKind::Required).is_err());
    }
}

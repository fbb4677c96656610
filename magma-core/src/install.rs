use anyhow::{Context, Result};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

use crate::config::{ConfigStore, MagmaConfig};
use crate::linuxgsm;
use crate::mods::Mod;
use crate::processor;
use crate::progress::{Progress, ProgressSink};
use crate::steam_api::WorkshopApi;
use crate::steamcmd::WorkshopDownloader;

pub(crate) fn now_epoch() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub installed: Vec<String>,
}

/// Runs mod operations against a server: metadata lookups, downloads and the filesystem
/// steps that make a mod visible to the server.
pub struct ModManager<A, D> {
    pub(crate) api: A,
    pub(crate) downloader: D,
    pub(crate) progress: ProgressSink,
}

impl<A: WorkshopApi, D: WorkshopDownloader> ModManager<A, D> {
    pub fn new(api: A, downloader: D, progress: ProgressSink) -> Self {
        Self { api, downloader, progress }
    }

    /// Lowercases, links and re-keys a downloaded Workshop mod.
    pub(crate) fn prepare_workshop_mod(&self, m: &mut Mod, server: &Path) -> Result<()> {
        self.progress.emit(Progress::Lowercasing { name: m.name.clone() });
        processor::lowercase_tree(&m.content_dir(server))?;
        if m.is_active {
            self.progress.emit(Progress::Linking { name: m.name.clone() });
            processor::link_mod(m, server)?;
            self.progress.emit(Progress::UpdatingKeys { name: m.name.clone() });
            processor::install_keys(m, server)?;
        }
        self.progress.emit(Progress::ItemReady { name: m.name.clone() });
        Ok(())
    }

    /// Installs Workshop mods that were never downloaded (every Workshop mod with `force`)
    /// and registers local mods that were never installed.
    pub async fn install(&mut self, config: &mut MagmaConfig, store: &ConfigStore, force: bool) -> Result<InstallReport> {
        let server = config.server_path.clone();
        let mut workshop: Vec<Mod> = config
            .mods
            .iter()
            .filter(|m| !m.is_local && (force || !m.is_installed()))
            .cloned()
            .collect();
        let mut local: Vec<Mod> = config.mods.iter().filter(|m| m.is_local && !m.is_installed()).cloned().collect();

        if workshop.is_empty() && local.is_empty() {
            info!("nothing to install");
            return Ok(InstallReport::default());
        }

        let ids: Vec<u64> = workshop.iter().filter_map(|m| m.steam_id).collect();
        if !ids.is_empty() {
            let details = self.api.published_files(&ids).await.context("fetch Workshop metadata")?;
            for (m, file) in workshop.iter_mut().zip(&details) {
                m.updated_at = Some(file.time_updated);
            }

            info!("downloading {} Workshop item(s)", ids.len());
            self.downloader.download(&server, &ids).await.context("download Workshop items")?;

            for m in workshop.iter_mut() {
                self.prepare_workshop_mod(m, &server)?;
            }
        }

        for m in local.iter_mut() {
            m.updated_at = Some(now_epoch());
            if m.is_active {
                self.progress.emit(Progress::UpdatingKeys { name: m.name.clone() });
                processor::install_keys(m, &server)?;
            }
            self.progress.emit(Progress::ItemReady { name: m.name.clone() });
        }

        let mut report = InstallReport::default();
        report.installed.extend(workshop.iter().chain(&local).map(|m| m.name.clone()));

        config.merge_mods(&workshop);
        config.merge_mods(&local);
        store.save(config)?;
        sync_linuxgsm(config)?;

        self.progress.emit(Progress::AllReady);
        Ok(report)
    }
}

/// Rewrites the LinuxGSM config when one is configured. Windows servers do not use LinuxGSM.
pub fn sync_linuxgsm(config: &MagmaConfig) -> Result<()> {
    if cfg!(windows) {
        return Ok(());
    }
    if let Some(path) = &config.linux_gsm {
        linuxgsm::update_config_file(path, &config.mods)?;
    }
    Ok(())
}

fn select<'a>(config: &'a mut MagmaConfig, id: u32) -> Option<&'a mut Mod> {
    let found = config.find_mod_mut(id);
    if found.is_none() {
        warn!("no mod with id {id}; skipping");
    }
    found
}

/// Restores keys and links for inactive mods. Returns the names of the activated mods.
pub fn activate(config: &mut MagmaConfig, store: &ConfigStore, ids: &[u32]) -> Result<Vec<String>> {
    let server = config.server_path.clone();
    let mut changed = Vec::new();
    for &id in ids {
        let Some(m) = select(config, id) else { continue };
        if m.is_active {
            info!("{} is already active", m.name);
            continue;
        }
        m.is_active = true;
        if m.is_installed() {
            processor::install_keys(m, &server)?;
            processor::link_mod(m, &server)?;
        }
        changed.push(m.name.clone());
    }
    if !changed.is_empty() {
        store.save(config)?;
        sync_linuxgsm(config)?;
    }
    Ok(changed)
}

/// Removes keys and links of active mods without deleting their files.
pub fn deactivate(config: &mut MagmaConfig, store: &ConfigStore, ids: &[u32]) -> Result<Vec<String>> {
    let server = config.server_path.clone();
    let mut changed = Vec::new();
    for &id in ids {
        let Some(m) = select(config, id) else { continue };
        if !m.is_active {
            info!("{} is already inactive", m.name);
            continue;
        }
        processor::remove_keys(m)?;
        processor::unlink_mod(m, &server)?;
        m.is_active = false;
        changed.push(m.name.clone());
    }
    if !changed.is_empty() {
        store.save(config)?;
        sync_linuxgsm(config)?;
    }
    Ok(changed)
}

/// Deletes keys, links and downloaded content, then forgets the mods.
pub fn remove(config: &mut MagmaConfig, store: &ConfigStore, ids: &[u32]) -> Result<Vec<String>> {
    let server = config.server_path.clone();
    let mut removed = Vec::new();
    for &id in ids {
        let Some(m) = select(config, id) else { continue };
        processor::remove_keys(m)?;
        processor::unlink_mod(m, &server)?;
        processor::remove_content(m, &server)?;
        removed.push(m.name.clone());
        config.mods.retain(|m| m.id != id);
    }
    if !removed.is_empty() {
        store.save(config)?;
        sync_linuxgsm(config)?;
    }
    Ok(removed)
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::mods::ModKind;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        server: std::path::PathBuf,
        store: ConfigStore,
        config: MagmaConfig,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let server = dir.path().join("server");
        fs::create_dir_all(&server).unwrap();
        fs::write(server.join("arma3server"), b"").unwrap();
        let store = ConfigStore::in_dir(dir.path());
        let mut config = MagmaConfig::new(server.clone(), dir.path().join("steamcmd"));
        let id = config.next_mod_id();
        config.mods.push(Mod::workshop(id, 555, "My Mod", ModKind::Required));
        let id = config.next_mod_id();
        config.mods.push(Mod::workshop(id, 556, "Server Tools", ModKind::ServerOnly));
        let id = config.next_mod_id();
        config.mods.push(Mod::workshop(id, 557, "Client Sounds", ModKind::ClientOnly));
        store.save(&config).unwrap();
        Fixture { _dir: dir, server, store, config }
    }

    fn manager(downloader: FakeDownloader) -> ModManager<FakeApi, FakeDownloader> {
        let api = FakeApi { items: vec![(555, 100), (556, 200), (557, 300)] };
        ModManager::new(api, downloader, ProgressSink::discard())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn install_links_keys_and_records_timestamps() {
        let mut fx = fixture();
        let downloader = FakeDownloader::default();
        let mut mgr = manager(downloader.clone());

        let report = mgr.install(&mut fx.config, &fx.store, false).await.unwrap();
        assert_eq!(report.installed.len(), 3);
        assert_eq!(downloader.calls(), vec![vec![555, 556, 557]]);

        let link = fx.server.join("mods/@my_mod");
        assert_eq!(fs::read_link(&link).unwrap(), fx.server.join("steamapps/workshop/content/107410/555"));
        assert!(fx.server.join("servermods/@server_tools").exists());
        assert!(!fx.server.join("mods/@client_sounds").exists());
        assert!(link.join("addons/mod_555.pbo").is_file());

        let saved = fx.store.load().unwrap();
        assert_eq!(saved.find_by_steam_id(555).unwrap().updated_at, Some(100));
        assert_eq!(saved.find_by_steam_id(557).unwrap().keys, vec![fx.server.join("keys/key_557.bikey")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn second_install_touches_nothing() {
        let mut fx = fixture();
        let downloader = FakeDownloader::default();
        let mut mgr = manager(downloader.clone());
        mgr.install(&mut fx.config, &fx.store, false).await.unwrap();

        let before = tree(fx.store.path().parent().unwrap());
        let report = mgr.install(&mut fx.config, &fx.store, false).await.unwrap();
        assert!(report.installed.is_empty());
        assert_eq!(tree(fx.store.path().parent().unwrap()), before);
        assert_eq!(downloader.calls().len(), 1);
    }

    #[tokio::test]
    async fn missing_item_aborts_before_download() {
        let mut fx = fixture();
        let id = fx.config.next_mod_id();
        fx.config.mods.push(Mod::workshop(id, 999, "Deleted", ModKind::Required));
        let downloader = FakeDownloader::default();
        let mut mgr = manager(downloader.clone());

        assert!(mgr.install(&mut fx.config, &fx.store, false).await.is_err());
        assert!(downloader.calls().is_empty());
        assert!(fx.store.load().unwrap().mods.iter().all(|m| m.updated_at.is_none()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn deactivate_then_activate_round_trips_links_and_keys() {
        let mut fx = fixture();
        let mut mgr = manager(FakeDownloader::default());
        mgr.install(&mut fx.config, &fx.store, false).await.unwrap();
        let link = fx.server.join("mods/@my_mod");
        let key = fx.server.join("keys/key_555.bikey");

        let changed = deactivate(&mut fx.config, &fx.store, &[1, 42]).unwrap();
        assert_eq!(changed, vec!["My Mod".to_string()]);
        assert!(fs::symlink_metadata(&link).is_err());
        assert!(!key.exists());
        assert!(fx.config.find_mod(1).unwrap().keys.is_empty());

        activate(&mut fx.config, &fx.store, &[1]).unwrap();
        assert!(fs::symlink_metadata(&link).is_ok());
        assert!(key.is_file());
        assert!(fx.store.load().unwrap().find_mod(1).unwrap().is_active);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn remove_deletes_content_and_entry() {
        let mut fx = fixture();
        let mut mgr = manager(FakeDownloader::default());
        mgr.install(&mut fx.config, &fx.store, false).await.unwrap();

        let removed = remove(&mut fx.config, &fx.store, &[2]).unwrap();
        assert_eq!(removed, vec!["Server Tools".to_string()]);
        assert!(!fx.server.join("steamapps/workshop/content/107410/556").exists());
        assert!(fs::symlink_metadata(fx.server.join("servermods/@server_tools")).is_err());
        assert!(fx.store.load().unwrap().find_mod(2).is_none());
    }

    #[test]
    fn unknown_ids_are_skipped() {
        let mut fx = fixture();
        assert!(remove(&mut fx.config, &fx.store, &[77]).unwrap().is_empty());
        assert_eq!(fx.config.mods.len(), 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn local_mods_get_keys_but_no_link() {
        let mut fx = fixture();
        fx.config.mods.clear();
        let id = fx.config.next_mod_id();
        fx.config.mods.push(Mod::local(id, "my_local", ModKind::Required));
        let local_dir = fx.server.join("mods/@my_local/keys");
        fs::create_dir_all(&local_dir).unwrap();
        fs::write(local_dir.join("local.bikey"), b"k").unwrap();

        let downloader = FakeDownloader::default();
        let mut mgr = manager(downloader.clone());
        mgr.install(&mut fx.config, &fx.store, false).await.unwrap();

        assert!(downloader.calls().is_empty());
        let m = fx.config.find_mod(id).unwrap();
        assert!(m.updated_at.is_some());
        assert_eq!(m.keys, vec![fx.server.join("keys/local.bikey")]);
        assert!(!fs::symlink_metadata(fx.server.join("mods/@my_local")).unwrap().file_type().is_symlink());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn linuxgsm_config_follows_installs() {
        let mut fx = fixture();
        let cfg = fx.server.join("arma3server.cfg");
        fs::write(&cfg, "#mods=\"\"\nmods=\"\"\n").unwrap();
        fx.config.linux_gsm = Some(cfg.clone());

        let mut mgr = manager(FakeDownloader::default());
        mgr.install(&mut fx.config, &fx.store, false).await.unwrap();
        let text = fs::read_to_string(&cfg).unwrap();
        assert_eq!(
            text,
            "#mods=\"\"\nmods=\"mods/@my_mod\\;\"\nservermods=\"servermods/@server_tools\\;\"\n"
        );
    }
}

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::{ConfigStore, MagmaConfig, MissingItemPolicy};
use crate::error::ApiError;
use crate::install::{sync_linuxgsm, ModManager};
use crate::mods::Mod;
use crate::progress::Progress;
use crate::steam_api::{require_all, ItemOutcome, PublishedFile, WorkshopApi};
use crate::steamcmd::WorkshopDownloader;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub updated: Vec<String>,
    /// Workshop ids left out because the item no longer resolves.
    pub skipped: Vec<u64>,
}

impl UpdateReport {
    pub fn is_up_to_date(&self) -> bool {
        self.updated.is_empty()
    }
}

/// Looks up metadata honoring `onMissingItem`. Returns the found records and the skipped ids.
pub async fn lookup_with_policy<A: WorkshopApi>(
    api: &A,
    ids: &[u64],
    policy: MissingItemPolicy,
) -> Result<(Vec<PublishedFile>, Vec<u64>), ApiError> {
    let outcomes = api.published_file_outcomes(ids).await?;
    if policy == MissingItemPolicy::Abort {
        return Ok((require_all(outcomes)?, Vec::new()));
    }

    let mut found = Vec::with_capacity(outcomes.len());
    let mut skipped = Vec::new();
    for outcome in outcomes {
        match outcome {
            ItemOutcome::Found(file) => found.push(file),
            ItemOutcome::Missing(id) => {
                warn!("Workshop item {id} no longer exists; skipping");
                skipped.push(id);
            }
            ItemOutcome::Failed { id, code } => {
                warn!("Workshop item {id} returned result {code}; skipping");
                skipped.push(id);
            }
        }
    }
    Ok((found, skipped))
}

/// Installed Workshop mods whose remote timestamp moved, with the new timestamp applied.
pub fn changed_mods(mods: &[Mod], details: &[PublishedFile]) -> Vec<Mod> {
    mods.iter()
        .filter(|m| !m.is_local && m.is_installed())
        .filter_map(|m| {
            let file = details.iter().find(|f| Some(f.publishedfileid) == m.steam_id)?;
            (m.updated_at != Some(file.time_updated)).then(|| {
                let mut m = m.clone();
                m.updated_at = Some(file.time_updated);
                m
            })
        })
        .collect()
}

impl<A: WorkshopApi, D: WorkshopDownloader> ModManager<A, D> {
    /// Re-downloads installed Workshop mods that changed upstream. Starts no SteamCMD
    /// process when nothing changed.
    pub async fn update(&mut self, config: &mut MagmaConfig, store: &ConfigStore) -> Result<UpdateReport> {
        let server = config.server_path.clone();
        let installed: Vec<&Mod> = config.mods.iter().filter(|m| !m.is_local && m.is_installed()).collect();
        if installed.is_empty() {
            info!("no installed Workshop mods");
            return Ok(UpdateReport::default());
        }

        for m in &installed {
            self.progress.emit(Progress::ComparingTimestamp { name: m.name.clone() });
        }
        let ids: Vec<u64> = installed.iter().filter_map(|m| m.steam_id).collect();
        let (details, skipped) = lookup_with_policy(&self.api, &ids, config.on_missing_item)
            .await
            .context("fetch Workshop metadata")?;

        let mut changed = changed_mods(&config.mods, &details);
        for m in &installed {
            if changed.iter().any(|c| c.id == m.id) {
                self.progress.emit(Progress::UpdateAvailable { name: m.name.clone() });
            } else if !m.steam_id.map(|id| skipped.contains(&id)).unwrap_or(false) {
                self.progress.emit(Progress::TimestampUnchanged { name: m.name.clone() });
            }
        }

        if changed.is_empty() {
            return Ok(UpdateReport { updated: Vec::new(), skipped });
        }

        let ids: Vec<u64> = changed.iter().filter_map(|m| m.steam_id).collect();
        info!("updating {} Workshop item(s)", ids.len());
        self.downloader.download(&server, &ids).await.context("download Workshop items")?;

        for m in changed.iter_mut() {
            self.prepare_workshop_mod(m, &server)?;
        }

        config.merge_mods(&changed);
        store.save(config)?;
        sync_linuxgsm(config)?;
        self.progress.emit(Progress::AllReady);

        Ok(UpdateReport { updated: changed.into_iter().map(|m| m.name).collect(), skipped })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::testing::{FakeApi, FakeDownloader};
    use crate::mods::ModKind;
    use crate::progress::ProgressSink;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn installed_config(dir: &TempDir, updated_at: i64) -> (ConfigStore, MagmaConfig) {
        let server = dir.path().join("server");
        fs::create_dir_all(&server).unwrap();
        let store = ConfigStore::in_dir(dir.path());
        let mut config = MagmaConfig::new(server, PathBuf::from("/usr/games/steamcmd"));
        let id = config.next_mod_id();
        let mut m = Mod::workshop(id, 555, "My Mod", ModKind::Required);
        m.updated_at = Some(updated_at);
        config.mods.push(m);
        let id = config.next_mod_id();
        config.mods.push(Mod::workshop(id, 600, "Not Yet Installed", ModKind::Required));
        store.save(&config).unwrap();
        (store, config)
    }

    #[tokio::test]
    async fn equal_timestamps_skip_steamcmd() {
        let dir = TempDir::new().unwrap();
        let (store, mut config) = installed_config(&dir, 100);
        let downloader = FakeDownloader::default();
        let api = FakeApi { items: vec![(555, 100), (600, 1)] };
        let mut mgr = ModManager::new(api, downloader.clone(), ProgressSink::discard());

        let report = mgr.update(&mut config, &store).await.unwrap();
        assert!(report.is_up_to_date());
        assert!(downloader.calls().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn changed_timestamp_downloads_exactly_that_item() {
        let dir = TempDir::new().unwrap();
        let (store, mut config) = installed_config(&dir, 100);
        let downloader = FakeDownloader::default();
        let api = FakeApi { items: vec![(555, 200), (600, 1)] };
        let (sink, mut rx) = ProgressSink::channel();
        let mut mgr = ModManager::new(api, downloader.clone(), sink);

        let report = mgr.update(&mut config, &store).await.unwrap();
        assert_eq!(report.updated, vec!["My Mod".to_string()]);
        assert_eq!(downloader.calls(), vec![vec![555]]);
        assert_eq!(store.load().unwrap().find_by_steam_id(555).unwrap().updated_at, Some(200));
        assert!(store.load().unwrap().find_by_steam_id(600).unwrap().updated_at.is_none());

        drop(mgr);
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        assert_eq!(events.first(), Some(&Progress::ComparingTimestamp { name: "My Mod".into() }));
        assert!(events.contains(&Progress::UpdateAvailable { name: "My Mod".into() }));
        assert_eq!(events.last(), Some(&Progress::AllReady));
    }

    #[tokio::test]
    async fn missing_item_policy_decides_between_abort_and_skip() {
        let dir = TempDir::new().unwrap();
        let (store, mut config) = installed_config(&dir, 100);
        let downloader = FakeDownloader::default();
        let api = FakeApi { items: vec![] };
        let mut mgr = ModManager::new(api, downloader.clone(), ProgressSink::discard());

        assert!(mgr.update(&mut config, &store).await.is_err());

        config.on_missing_item = MissingItemPolicy::Skip;
        let report = mgr.update(&mut config, &store).await.unwrap();
        assert!(report.is_up_to_date());
        assert_eq!(report.skipped, vec![555]);
        assert!(downloader.calls().is_empty());
    }

    #[test]
    fn never_installed_mods_are_not_compared() {
        let mods = vec![Mod::workshop(1, 555, "Fresh", ModKind::Required)];
        let details = vec![PublishedFile {
            publishedfileid: 555,
            result: 1,
            title: "Fresh".into(),
            time_updated: 5,
            file_size: None,
            preview_url: None,
        }];
        assert!(changed_mods(&mods, &details).is_empty());
    }
}

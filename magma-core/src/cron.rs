//! Announces available Workshop updates on a webhook, once per update.

use anyhow::{bail, Context, Result};
use humansize::{format_size, DECIMAL};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::{ConfigStore, MagmaConfig};
use crate::mods::Mod;
use crate::steam_api::{PublishedFile, WorkshopApi};
use crate::update::lookup_with_policy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    UpdateAvailable { name: String, steam_id: u64, installed_at: i64, time_updated: i64, file_size: Option<u64> },
    UpToDate { name: String, steam_id: u64 },
}

impl Notice {
    /// Updates the announced-ids list once this notice has been posted.
    pub fn record(&self, cron_messages: &mut Vec<u64>) {
        match self {
            Notice::UpdateAvailable { steam_id, .. } => {
                if !cron_messages.contains(steam_id) {
                    cron_messages.push(*steam_id);
                }
            }
            Notice::UpToDate { steam_id, .. } => cron_messages.retain(|id| id != steam_id),
        }
    }

    pub fn render(&self, server_path: &Path) -> String {
        match self {
            Notice::UpdateAvailable { name, steam_id, installed_at, time_updated, file_size } => {
                let size = file_size.map(|s| format_size(s, DECIMAL)).unwrap_or_else(|| "unknown".into());
                format!(
                    "**New update for {name}!**\nA new update has been released and requires your action.\n\
                     https://steamcommunity.com/workshop/filedetails/?id={steam_id}\n\
                     Server Path: {}\nLast Modified: <t:{installed_at}:f>\nUpdated on Workshop: <t:{time_updated}:f>\n\
                     Mod Size on Workshop: {size}",
                    server_path.display()
                )
            }
            Notice::UpToDate { name, .. } => format!(
                "**{name} is now up-to-date!**\nThe mod has been updated and no further action is required.\nServer Path: {}",
                server_path.display()
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CronPlan {
    pub notices: Vec<Notice>,
    /// Announced but not yet installed updates after this run.
    pub cron_messages: Vec<u64>,
}

/// Decides what to post. An update is announced once; the confirmation follows once the
/// installed timestamp catches up. Never-installed mods are ignored.
pub fn plan(mods: &[Mod], details: &[PublishedFile], cron_messages: &[u64]) -> CronPlan {
    let mut out = CronPlan { notices: Vec::new(), cron_messages: still_configured(mods, cron_messages) };

    for m in mods.iter().filter(|m| !m.is_local) {
        let (Some(steam_id), Some(installed_at)) = (m.steam_id, m.updated_at) else { continue };
        let Some(file) = details.iter().find(|f| f.publishedfileid == steam_id) else { continue };
        let announced = out.cron_messages.contains(&steam_id);

        if announced && installed_at == file.time_updated {
            out.cron_messages.retain(|id| *id != steam_id);
            out.notices.push(Notice::UpToDate { name: m.name.clone(), steam_id });
        } else if !announced && installed_at != file.time_updated {
            out.cron_messages.push(steam_id);
            out.notices.push(Notice::UpdateAvailable {
                name: m.name.clone(),
                steam_id,
                installed_at,
                time_updated: file.time_updated,
                file_size: file.file_size,
            });
        }
    }
    out
}

/// Announced ids whose mods are still configured.
fn still_configured(mods: &[Mod], cron_messages: &[u64]) -> Vec<u64> {
    cron_messages
        .iter()
        .copied()
        .filter(|id| mods.iter().any(|m| m.steam_id == Some(*id)))
        .collect()
}

pub trait Notifier: Send + Sync {
    fn send(&self, content: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Posts `{"content": ...}` to a Discord-style webhook.
pub struct Webhook {
    client: reqwest::Client,
    url: String,
}

impl Webhook {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("magma/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client, url: url.into() })
    }
}

impl Notifier for Webhook {
    async fn send(&self, content: &str) -> Result<()> {
        self.client
            .post(&self.url)
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await
            .context("post webhook")?
            .error_for_status()
            .context("webhook rejected the message")?;
        Ok(())
    }
}

pub fn webhook_for(config: &MagmaConfig) -> Result<Webhook> {
    match config.webhook_url.as_deref() {
        Some(url) if !url.trim().is_empty() => Webhook::new(url.trim()),
        _ => bail!("A webhook URL is not given in the configuration file. Set one with `magma configure --webhook-url <url>`."),
    }
}

/// Checks installed Workshop mods for updates and posts what changed since the last run.
pub async fn run<A: WorkshopApi, N: Notifier>(
    api: &A,
    notifier: &N,
    config: &mut MagmaConfig,
    store: &ConfigStore,
) -> Result<Vec<Notice>> {
    let ids: Vec<u64> = config.mods.iter().filter(|m| m.is_installed()).filter_map(|m| m.steam_id).collect();
    if ids.is_empty() {
        info!("no installed Workshop mods to check");
        return Ok(Vec::new());
    }

    let (details, _skipped) = lookup_with_policy(api, &ids, config.on_missing_item)
        .await
        .context("fetch Workshop metadata")?;
    let plan = plan(&config.mods, &details, &config.cron_messages);

    // record each notice as soon as it is out, so a failed post only repeats itself
    let mut recorded = still_configured(&config.mods, &config.cron_messages);
    let mut sent = Vec::with_capacity(plan.notices.len());
    let mut failure = None;
    for notice in plan.notices {
        if let Err(e) = notifier.send(&notice.render(&config.server_path)).await {
            failure = Some(e);
            break;
        }
        notice.record(&mut recorded);
        sent.push(notice);
    }
    if recorded != config.cron_messages {
        config.cron_messages = recorded;
        store.save(config)?;
    }
    if let Some(e) = failure {
        return Err(e.context(format!("posted {} notice(s) before the webhook failed", sent.len())));
    }
    info!("posted {} notice(s)", sent.len());
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::testing::FakeApi;
    use crate::mods::ModKind;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<String>>,
    }

    impl Notifier for Recorder {
        async fn send(&self, content: &str) -> Result<()> {
            self.sent.lock().unwrap().push(content.to_string());
            Ok(())
        }
    }

    /// Accepts `accept` messages, then rejects everything.
    struct Flaky {
        accept: usize,
        sent: Mutex<Vec<String>>,
    }

    impl Notifier for Flaky {
        async fn send(&self, content: &str) -> Result<()> {
            let mut sent = self.sent.lock().unwrap();
            if sent.len() >= self.accept {
                bail!("webhook returned 500");
            }
            sent.push(content.to_string());
            Ok(())
        }
    }

    fn file(id: u64, time_updated: i64) -> PublishedFile {
        PublishedFile {
            publishedfileid: id,
            result: 1,
            title: String::new(),
            time_updated,
            file_size: Some(2_000_000),
            preview_url: None,
        }
    }

    fn installed(id: u32, steam_id: u64, at: i64) -> Mod {
        let mut m = Mod::workshop(id, steam_id, format!("Mod {id}"), ModKind::Required);
        m.updated_at = Some(at);
        m
    }

    #[test]
    fn announces_once_then_confirms() {
        let mods = vec![installed(1, 555, 100)];
        let first = plan(&mods, &[file(555, 200)], &[]);
        assert!(matches!(first.notices[..], [Notice::UpdateAvailable { steam_id: 555, .. }]));
        assert_eq!(first.cron_messages, vec![555]);

        let again = plan(&mods, &[file(555, 200)], &first.cron_messages);
        assert!(again.notices.is_empty());
        assert_eq!(again.cron_messages, vec![555]);

        let mods = vec![installed(1, 555, 200)];
        let done = plan(&mods, &[file(555, 200)], &again.cron_messages);
        assert!(matches!(done.notices[..], [Notice::UpToDate { steam_id: 555, .. }]));
        assert!(done.cron_messages.is_empty());
    }

    #[test]
    fn never_installed_and_removed_mods_are_ignored() {
        let mods = vec![Mod::workshop(1, 555, "Fresh", ModKind::Required)];
        let out = plan(&mods, &[file(555, 200)], &[999]);
        assert!(out.notices.is_empty());
        assert!(out.cron_messages.is_empty());
    }

    #[test]
    fn update_message_mentions_size_and_link() {
        let notice = Notice::UpdateAvailable {
            name: "CBA_A3".into(),
            steam_id: 450814997,
            installed_at: 1,
            time_updated: 2,
            file_size: Some(2_000_000),
        };
        let text = notice.render(Path::new("/srv/arma3"));
        assert!(text.contains("New update for CBA_A3!"));
        assert!(text.contains("?id=450814997"));
        assert!(text.contains("2 MB"));
        assert!(text.contains("/srv/arma3"));
    }

    #[test]
    fn missing_webhook_is_an_error() {
        let config = MagmaConfig::new(PathBuf::from("/srv"), PathBuf::from("/usr/games/steamcmd"));
        assert!(webhook_for(&config).is_err());
    }

    #[tokio::test]
    async fn run_posts_and_persists_announcements() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::in_dir(dir.path());
        let mut config = MagmaConfig::new(dir.path().to_path_buf(), PathBuf::from("/usr/games/steamcmd"));
        config.mods.push(installed(1, 555, 100));
        store.save(&config).unwrap();

        let api = FakeApi { items: vec![(555, 300)] };
        let recorder = Recorder::default();
        let notices = run(&api, &recorder, &mut config, &store).await.unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(recorder.sent.lock().unwrap().len(), 1);
        assert_eq!(store.load().unwrap().cron_messages, vec![555]);

        run(&api, &recorder, &mut config, &store).await.unwrap();
        assert_eq!(recorder.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_post_keeps_earlier_announcements() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::in_dir(dir.path());
        let mut config = MagmaConfig::new(dir.path().to_path_buf(), PathBuf::from("/usr/games/steamcmd"));
        config.mods.push(installed(1, 555, 100));
        config.mods.push(installed(2, 556, 100));
        store.save(&config).unwrap();
        let api = FakeApi { items: vec![(555, 300), (556, 300)] };

        let flaky = Flaky { accept: 1, sent: Mutex::new(Vec::new()) };
        assert!(run(&api, &flaky, &mut config, &store).await.is_err());
        assert_eq!(flaky.sent.lock().unwrap().len(), 1);
        assert_eq!(store.load().unwrap().cron_messages, vec![555]);

        let recorder = Recorder::default();
        let notices = run(&api, &recorder, &mut config, &store).await.unwrap();
        assert!(matches!(notices[..], [Notice::UpdateAvailable { steam_id: 556, .. }]));
        assert_eq!(store.load().unwrap().cron_messages, vec![555, 556]);
    }
}

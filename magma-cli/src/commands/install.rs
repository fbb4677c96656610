use anyhow::Result;
use magma_core::{login_target, KeyStore, MagmaConfig, ModManager, ProgressSink, SteamApi, SteamCmd, SteamCmdDownloader};
use tracing::warn;

use super::{cron, open_config};
use crate::cli::SteamArgs;
use crate::prompt::Prompter;
use crate::ui::ProgressUi;

type SteamManager = ModManager<SteamApi, SteamCmdDownloader>;

fn manager(config: &MagmaConfig, steam: SteamArgs, ui: &ProgressUi, sink: ProgressSink) -> Result<SteamManager> {
    let keys = KeyStore::default_location()?;
    let login = login_target(config, &keys)?;
    let guard = Prompter::new(steam.non_interactive).guard_code(steam.steam_guard, ui.bar());
    let downloader = SteamCmdDownloader::new(SteamCmd::new(&config.steam_cmd_path), login, guard, sink.clone());
    Ok(ModManager::new(SteamApi::new()?, downloader, sink))
}

pub async fn install(force: bool, steam: SteamArgs) -> Result<()> {
    let (store, mut config) = open_config()?;
    let (sink, ui) = ProgressUi::start("Installing mods");
    // the manager holds the progress sink and must be gone before the UI closes
    let result = match manager(&config, steam, &ui, sink) {
        Ok(mut manager) => manager.install(&mut config, &store, force).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(report) if report.installed.is_empty() => {
            ui.clear().await;
            println!("All mods are already installed.");
        }
        Ok(report) => ui.succeed(&format!("Installed {} mod(s)", report.installed.len())).await,
        Err(e) => {
            ui.fail("Installation failed").await;
            return Err(e);
        }
    }
    Ok(())
}

pub async fn update(steam: SteamArgs) -> Result<()> {
    let (store, mut config) = open_config()?;
    let (sink, ui) = ProgressUi::start("Checking for updates");
    let result = match manager(&config, steam, &ui, sink) {
        Ok(mut manager) => manager.update(&mut config, &store).await,
        Err(e) => Err(e),
    };

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            ui.fail("Update failed").await;
            return Err(e);
        }
    };
    if report.is_up_to_date() {
        ui.clear().await;
        println!("All mods are up-to-date.");
    } else {
        ui.succeed(&format!("Updated {} mod(s)", report.updated.len())).await;
    }
    for id in &report.skipped {
        println!("Workshop item {id} is no longer available and was skipped.");
    }

    if config.webhook_url.is_some() {
        // confirmations for announced updates; a broken webhook does not fail the update
        if let Err(e) = cron::notify(&mut config, &store).await {
            warn!("could not post update notices: {e:#}");
            eprintln!("Could not post update notices: {e:#}");
        }
    }
    Ok(())
}

use anyhow::Result;
use magma_core::cron::{self, webhook_for};
use magma_core::{ConfigStore, MagmaConfig, SteamApi};

use super::open_config;

/// Posts what changed since the last run. Returns the number of messages sent.
pub(super) async fn notify(config: &mut MagmaConfig, store: &ConfigStore) -> Result<usize> {
    let webhook = webhook_for(config)?;
    let api = SteamApi::new()?;
    let notices = cron::run(&api, &webhook, config, store).await?;
    Ok(notices.len())
}

pub async fn run() -> Result<()> {
    let (store, mut config) = open_config()?;
    let sent = notify(&mut config, &store).await?;
    if sent == 0 {
        println!("Nothing new to report.");
    } else {
        println!("Posted {sent} notice(s).");
    }
    Ok(())
}

use anyhow::Result;
use magma_core::{ConfigError, ConfigStore, KeyStore, MagmaConfig};

use super::login::verified_credentials;
use crate::cli::InitArgs;
use crate::prompt::{PathKind, Prompter};

pub async fn run(args: InitArgs) -> Result<()> {
    let prompter = Prompter::new(args.non_interactive);
    let store = ConfigStore::new()?;
    if store.exists() && !args.force {
        return Err(ConfigError::AlreadyInitialized.into());
    }

    let steam_cmd = prompter.path(PathKind::SteamCmd, args.paths.steam_cmd_path()).await?;
    let server = prompter.path(PathKind::Server, args.paths.server_path()).await?;
    let mut config = MagmaConfig::new(server, steam_cmd);

    let with_account = args.credentials.username.is_some()
        || prompter
            .confirm("Log in with a Steam account? Anonymous logins cannot download most Arma 3 Workshop items.", false)
            .await?;
    if with_account {
        let (username, password) = verified_credentials(&config.steam_cmd_path, args.credentials, &prompter).await?;
        config.credentials = Some(KeyStore::default_location()?.seal(&username, &password)?);
    }

    config.linux_gsm = prompter.optional_path(PathKind::LinuxGsm, args.paths.linux_gsm_path()).await?;
    config.webhook_url = match args.paths.webhook_url {
        Some(url) => Some(url),
        None => prompter.optional_text("Webhook URL for `magma cron` (leave empty to skip):").await?,
    };

    store.save(&config)?;
    println!("Created {}", store.path().display());
    Ok(())
}

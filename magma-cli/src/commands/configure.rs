use anyhow::{bail, Result};
use magma_core::{sync_linuxgsm, KeyStore, MagmaConfig, MissingItemPolicy};
use std::fmt;

use super::login::verified_credentials;
use super::open_config;
use crate::cli::{ConfigureArgs, CredentialArgs};
use crate::prompt::{PathKind, Prompter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Setting {
    SteamCmd,
    Server,
    Credentials,
    LinuxGsm,
    WebhookUrl,
    MissingItem,
}

impl Setting {
    const ALL: [Setting; 6] = [
        Setting::SteamCmd,
        Setting::Server,
        Setting::Credentials,
        Setting::LinuxGsm,
        Setting::WebhookUrl,
        Setting::MissingItem,
    ];
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Setting::SteamCmd => "SteamCMD path",
            Setting::Server => "Server path",
            Setting::Credentials => "Steam credentials",
            Setting::LinuxGsm => "LinuxGSM instance config",
            Setting::WebhookUrl => "Webhook URL",
            Setting::MissingItem => "Missing Workshop item handling",
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct PolicyChoice(MissingItemPolicy);

impl fmt::Display for PolicyChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self.0 {
            MissingItemPolicy::Abort => "Abort the whole run",
            MissingItemPolicy::Skip => "Skip the item and continue",
        })
    }
}

async fn store_credentials(config: &mut MagmaConfig, args: CredentialArgs, prompter: &Prompter) -> Result<()> {
    let (username, password) = verified_credentials(&config.steam_cmd_path, args, prompter).await?;
    config.credentials = Some(KeyStore::default_location()?.seal(&username, &password)?);
    Ok(())
}

/// Applies the settings given as flags.
async fn from_flags(config: &mut MagmaConfig, args: ConfigureArgs, prompter: &Prompter) -> Result<()> {
    let ConfigureArgs { paths, credentials, on_missing_item, .. } = args;

    if let Some(path) = paths.steam_cmd_path() {
        config.steam_cmd_path = prompter.path(PathKind::SteamCmd, Some(path)).await?;
    }
    if let Some(path) = paths.server_path() {
        config.server_path = prompter.path(PathKind::Server, Some(path)).await?;
    }
    if let Some(path) = paths.linux_gsm_path() {
        config.linux_gsm = Some(prompter.path(PathKind::LinuxGsm, Some(path)).await?);
    }
    if let Some(url) = paths.webhook_url {
        let url = url.trim().to_string();
        config.webhook_url = (!url.is_empty()).then_some(url);
    }
    if let Some(policy) = on_missing_item {
        config.on_missing_item = policy.into();
    }

    match (credentials.username.is_some(), credentials.password.is_some()) {
        (true, true) => store_credentials(config, credentials, prompter).await?,
        (true, false) => bail!("The --username flag requires the --password flag."),
        (false, true) => bail!("The --password flag requires the --username flag."),
        (false, false) => {}
    }
    Ok(())
}

/// Lets the user pick the settings to change and asks for each.
async fn from_prompts(config: &mut MagmaConfig, steam_guard: Option<String>, prompter: &Prompter) -> Result<()> {
    let settings = prompter.multi_select("Which settings do you want to change?", Setting::ALL.to_vec()).await?;
    let mut steam_guard = steam_guard;

    for setting in settings {
        match setting {
            Setting::SteamCmd => config.steam_cmd_path = prompter.path(PathKind::SteamCmd, None).await?,
            Setting::Server => config.server_path = prompter.path(PathKind::Server, None).await?,
            Setting::LinuxGsm => config.linux_gsm = prompter.optional_path(PathKind::LinuxGsm, None).await?,
            Setting::WebhookUrl => {
                config.webhook_url = prompter.optional_text("Webhook URL (leave empty to remove it):").await?;
            }
            Setting::MissingItem => {
                let options = vec![PolicyChoice(MissingItemPolicy::Abort), PolicyChoice(MissingItemPolicy::Skip)];
                config.on_missing_item = prompter.select("When a Workshop item no longer exists:", options).await?.0;
            }
            Setting::Credentials => {
                let args = CredentialArgs { steam_guard: steam_guard.take(), ..CredentialArgs::default() };
                store_credentials(config, args, prompter).await?;
            }
        }
    }
    Ok(())
}

pub async fn run(args: ConfigureArgs) -> Result<()> {
    let (store, mut config) = open_config()?;
    let prompter = Prompter::new(args.non_interactive);
    let linux_gsm_before = config.linux_gsm.clone();

    if args.has_settings() {
        from_flags(&mut config, args, &prompter).await?;
    } else if prompter.is_interactive() {
        from_prompts(&mut config, args.credentials.steam_guard, &prompter).await?;
    } else {
        bail!("No flags were specified that indicate which settings should be updated.");
    }

    store.save(&config)?;
    if config.linux_gsm != linux_gsm_before {
        sync_linuxgsm(&config)?;
    }
    println!("Saved {}", store.path().display());
    Ok(())
}

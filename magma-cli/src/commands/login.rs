use anyhow::Result;
use magma_core::{KeyStore, LoginTarget, SteamCmd};
use std::path::Path;

use super::open_config;
use crate::cli::CredentialArgs;
use crate::prompt::Prompter;
use crate::ui::ProgressUi;

/// Logs in with SteamCMD until the credentials work. Unattended runs get one attempt.
pub(super) async fn verified_credentials(steam_cmd: &Path, args: CredentialArgs, prompter: &Prompter) -> Result<(String, String)> {
    let CredentialArgs { mut username, mut password, mut steam_guard } = args;
    let steamcmd = SteamCmd::new(steam_cmd);

    loop {
        let user = match username.take() {
            Some(user) => user,
            None => prompter.text("Steam username:", None).await?,
        };
        let pass = match password.take() {
            Some(pass) => pass,
            None => prompter.password("Steam password:").await?,
        };
        let target = LoginTarget::User { username: user.clone(), password: pass.clone() };

        let (sink, ui) = ProgressUi::start("Validating Steam credentials");
        let guard = prompter.guard_code(steam_guard.take(), ui.bar());
        match steamcmd.verify_login(&target, guard, sink).await {
            Ok(()) => {
                ui.succeed("Logged in").await;
                return Ok((user, pass));
            }
            Err(e) if prompter.is_interactive() => {
                ui.fail(&format!("Failed to login: {e}")).await;
            }
            Err(e) => {
                ui.fail("Failed to login").await;
                return Err(e.into());
            }
        }
    }
}

pub async fn run(args: CredentialArgs, prompter: Prompter) -> Result<()> {
    let (store, mut config) = open_config()?;
    let (username, password) = verified_credentials(&config.steam_cmd_path, args, &prompter).await?;

    let keys = KeyStore::default_location()?;
    config.credentials = Some(keys.seal(&username, &password)?);
    store.save(&config)?;
    println!("Stored the credentials for {username}. The key is kept in {}", keys.path().display());
    Ok(())
}

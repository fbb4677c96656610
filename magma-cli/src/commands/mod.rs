mod add;
mod configure;
mod cron;
mod init;
mod install;
mod list;
mod login;
mod select;
mod upgrade;

use anyhow::Result;
use magma_core::{ConfigStore, MagmaConfig};

use crate::cli::Command;
use crate::prompt::Prompter;

pub async fn run(command: Command) -> Result<()> {
    match command {
        Command::Init(args) => init::run(args).await,
        Command::Add { ids, kind } => add::workshop(&ids, kind.into()).await,
        Command::AddLocal { name, kind, non_interactive } => add::local(name, kind.into(), Prompter::new(non_interactive)).await,
        Command::Remove(args) => select::remove(args).await,
        Command::List => list::run(),
        Command::Install { force, steam } => install::install(force, steam).await,
        Command::Update { steam } => install::update(steam).await,
        Command::Activate(args) => select::activate(args).await,
        Command::Deactivate(args) => select::deactivate(args).await,
        Command::Login { credentials, non_interactive } => login::run(credentials, Prompter::new(non_interactive)).await,
        Command::Cron => cron::run().await,
        Command::Configure(args) => configure::run(args).await,
        Command::Upgrade => upgrade::run(),
    }
}

/// Loads `magma.json` from the working directory.
fn open_config() -> Result<(ConfigStore, MagmaConfig)> {
    let store = ConfigStore::new()?;
    let config = store.load()?;
    Ok((store, config))
}

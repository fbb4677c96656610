use anyhow::Result;
use magma_core::{install, MagmaConfig, Mod};

use super::open_config;
use crate::cli::SelectArgs;
use crate::prompt::{ModChoice, Prompter};

/// Ids from the command line, or the user's pick among the mods `eligible` accepts.
async fn pick(config: &MagmaConfig, args: SelectArgs, verb: &str, eligible: impl Fn(&Mod) -> bool) -> Result<Vec<u32>> {
    if !args.ids.is_empty() {
        return Ok(args.ids);
    }
    let choices: Vec<ModChoice> = config.mods.iter().filter(|m| eligible(m)).map(ModChoice::from).collect();
    if choices.is_empty() {
        println!("There are no mods to {verb}.");
        return Ok(Vec::new());
    }
    let picked = Prompter::new(args.non_interactive)
        .multi_select(&format!("Select the mods to {verb}:"), choices)
        .await?;
    Ok(picked.into_iter().map(|c| c.id).collect())
}

fn report(done: &[String], past: &str) {
    if done.is_empty() {
        println!("Nothing was {past}.");
    }
    for name in done {
        println!("{name} {past}.");
    }
}

pub async fn remove(args: SelectArgs) -> Result<()> {
    let (store, mut config) = open_config()?;
    let ids = pick(&config, args, "remove", |_| true).await?;
    if ids.is_empty() {
        return Ok(());
    }
    let removed = install::remove(&mut config, &store, &ids)?;
    report(&removed, "removed");
    Ok(())
}

pub async fn activate(args: SelectArgs) -> Result<()> {
    let (store, mut config) = open_config()?;
    let ids = pick(&config, args, "activate", |m| !m.is_active).await?;
    if ids.is_empty() {
        return Ok(());
    }
    let changed = install::activate(&mut config, &store, &ids)?;
    report(&changed, "activated");
    Ok(())
}

pub async fn deactivate(args: SelectArgs) -> Result<()> {
    let (store, mut config) = open_config()?;
    let ids = pick(&config, args, "deactivate", |m| m.is_active).await?;
    if ids.is_empty() {
        return Ok(());
    }
    let changed = install::deactivate(&mut config, &store, &ids)?;
    report(&changed, "deactivated");
    Ok(())
}

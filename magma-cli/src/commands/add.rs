use anyhow::Result;
use magma_core::{add_local, add_workshop, ModKind, SteamApi};

use super::open_config;
use crate::prompt::Prompter;

pub async fn workshop(ids: &[u64], kind: ModKind) -> Result<()> {
    let (store, mut config) = open_config()?;
    let api = SteamApi::new()?;
    let report = add_workshop(&api, &mut config, &store, ids, kind).await?;

    for m in &report.added {
        println!("Added {} as mod {} ({})", m.name, m.id, m.kind);
    }
    for id in &report.existing {
        println!("Workshop item {id} is already configured.");
    }
    if !report.added.is_empty() {
        println!("Run `magma install` to download the new mods.");
    }
    Ok(())
}

pub async fn local(name: Option<String>, kind: ModKind, prompter: Prompter) -> Result<()> {
    let (store, mut config) = open_config()?;
    let name = match name {
        Some(name) => name,
        None => prompter.text("Local mod name:", None).await?,
    };
    let m = add_local(&mut config, &store, &name, kind)?;
    println!("Added local mod {} as mod {} ({})", m.name, m.id, m.kind);
    println!("Run `magma install` to install its keys.");
    Ok(())
}

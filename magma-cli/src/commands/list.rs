use anyhow::Result;
use magma_core::Mod;

use super::open_config;

const HEADER: [&str; 6] = ["ID", "Name", "Type", "Workshop ID", "Active", "Installed"];

fn row(m: &Mod) -> [String; 6] {
    [
        m.id.to_string(),
        m.name.clone(),
        m.kind.to_string(),
        m.steam_id.map(|id| id.to_string()).unwrap_or_else(|| "local".into()),
        if m.is_active { "yes" } else { "no" }.into(),
        if m.is_installed() { "yes" } else { "no" }.into(),
    ]
}

/// Columns padded to their widest cell.
fn table(mods: &[Mod]) -> String {
    let rows: Vec<[String; 6]> = mods.iter().map(row).collect();
    let mut widths = HEADER.map(str::len);
    for r in &rows {
        for (w, cell) in widths.iter_mut().zip(r) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, w)| format!("{cell:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![line(&HEADER.map(String::from))];
    out.extend(rows.iter().map(|r| line(r)));
    out.join("\n")
}

pub fn run() -> Result<()> {
    let (_, config) = open_config()?;
    if config.mods.is_empty() {
        println!("No mods were found.");
        return Ok(());
    }
    println!("{}", table(&config.mods));
    Ok(())
}

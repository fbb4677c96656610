use anyhow::Result;
use magma_core::{upgrade, ConfigStore, KeyStore, UpgradeOutcome};

pub fn run() -> Result<()> {
    let store = ConfigStore::new()?;
    let keys = KeyStore::default_location()?;
    match upgrade(&store, &keys)? {
        UpgradeOutcome::AlreadyCurrent => println!("magma.json is already up-to-date."),
        UpgradeOutcome::Upgraded { from, to } => println!("Upgraded magma.json from version {from} to {to}."),
        UpgradeOutcome::UpgradedWithoutCredentials { from, to } => {
            println!("Upgraded magma.json from version {from} to {to}.");
            println!("The stored Steam credentials could not be read. Run `magma login` to add them again.");
        }
        UpgradeOutcome::Unsupported(version) => {
            println!("magma.json version {version} cannot be upgraded automatically. Run `magma init --force` to start over.")
        }
    }
    Ok(())
}

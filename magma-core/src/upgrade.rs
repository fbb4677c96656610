use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::config::{ConfigStore, MagmaConfig, CURRENT_VERSION};
use crate::mods::ModKind;
use crate::secrets::{decrypt_legacy, KeyStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    AlreadyCurrent,
    Upgraded { from: u32, to: u32 },
    /// Credentials could not be carried over and were dropped.
    UpgradedWithoutCredentials { from: u32, to: u32 },
    Unsupported(u32),
}

/// Version 3 stored the mod type as an index.
fn kind_from_index(index: u64) -> ModKind {
    match index {
        1 => ModKind::ClientOnly,
        2 => ModKind::ServerOnly,
        _ => ModKind::Required,
    }
}

fn migrate_mod_types(obj: &mut Map<String, Value>) {
    let Some(Value::Array(mods)) = obj.get_mut("mods") else { return };
    for m in mods.iter_mut() {
        if let Some(index) = m.get("type").and_then(Value::as_u64) {
            m["type"] = json!(kind_from_index(index));
        }
    }
}

/// Re-encrypts the password under a key kept in the key store. Returns false when the
/// credentials had to be dropped.
fn migrate_credentials(obj: &mut Map<String, Value>, keys: &KeyStore) -> Result<bool> {
    let key = obj.remove("key").and_then(|k| k.as_str().map(str::to_string));
    let Some(credentials) = obj.get("credentials").cloned() else { return Ok(true) };
    if credentials.is_null() {
        obj.remove("credentials");
        return Ok(true);
    }

    let username = credentials.get("username").and_then(Value::as_str);
    let password = credentials.get("password").and_then(Value::as_str);
    let plain = match (key.as_deref(), password) {
        (Some(key), Some(password)) => decrypt_legacy(key, password).ok(),
        _ => None,
    };

    match (username, plain) {
        (Some(username), Some(plain)) => {
            let sealed = keys.seal(username, &plain).context("store the encryption key")?;
            obj.insert("credentials".into(), serde_json::to_value(sealed)?);
            Ok(true)
        }
        _ => {
            warn!("stored Steam credentials could not be decrypted; dropping them");
            obj.remove("credentials");
            Ok(false)
        }
    }
}

/// Brings `magma.json` up to the current schema.
pub fn upgrade(store: &ConfigStore, keys: &KeyStore) -> Result<UpgradeOutcome> {
    let mut raw = store.load_raw()?;
    let from = raw.get("version").and_then(Value::as_u64).unwrap_or(0) as u32;
    if from == CURRENT_VERSION {
        return Ok(UpgradeOutcome::AlreadyCurrent);
    }
    if from != 3 {
        return Ok(UpgradeOutcome::Unsupported(from));
    }

    let Some(obj) = raw.as_object_mut() else {
        return Ok(UpgradeOutcome::Unsupported(from));
    };
    migrate_mod_types(obj);
    let kept_credentials = migrate_credentials(obj, keys)?;
    obj.entry("cronMessages").or_insert_with(|| json!([]));
    obj.insert("version".into(), json!(CURRENT_VERSION));

    // refuse to write something the current version cannot read
    serde_json::from_value::<MagmaConfig>(raw.clone()).context("upgraded configuration is not readable")?;
    store.save_raw(&raw)?;
    info!("upgraded magma.json from version {from} to {CURRENT_VERSION}");

    Ok(if kept_credentials {
        UpgradeOutcome::Upgraded { from, to: CURRENT_VERSION }
    } else {
        UpgradeOutcome::UpgradedWithoutCredentials { from, to: CURRENT_VERSION }
    })
}

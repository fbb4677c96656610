pub mod add;
pub mod config;
pub mod cron;
pub mod elevation;
pub mod error;
pub mod fs_linker;
pub mod install;
pub mod linuxgsm;
pub mod logging;
pub mod mods;
pub mod processor;
pub mod progress;
pub mod secrets;
pub mod servers;
pub mod steam_api;
pub mod steamcmd;
pub mod update;
pub mod upgrade;
pub mod validate;

pub use add::{add_local, add_workshop, AddReport};
pub use config::{ConfigStore, MagmaConfig, MissingItemPolicy, CONFIG_FILE, CURRENT_VERSION};
pub use cron::{Notice, Notifier, Webhook};
pub use elevation::{elevation_warning, is_elevated};
pub use error::{ApiError, ConfigError, CryptoError, SteamCmdError};
pub use install::{activate, deactivate, remove, sync_linuxgsm, InstallReport, ModManager};
pub use logging::init_logging;
pub use mods::{Credentials, Mod, ModKind};
pub use progress::{Progress, ProgressSink};
pub use secrets::{Encrypter, KeyStore, SecretKey};
pub use servers::{detect_server_dir, detect_steamcmd, ARMA3};
pub use steam_api::{ItemOutcome, PublishedFile, SteamApi, WorkshopApi};
pub use steamcmd::{login_target, GuardCode, LoginTarget, SteamCmd, SteamCmdDownloader, WorkshopDownloader};
pub use update::UpdateReport;
pub use upgrade::{upgrade, UpgradeOutcome};

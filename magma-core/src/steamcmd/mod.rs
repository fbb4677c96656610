//! Driving the SteamCMD console: login (including Steam Guard) and Workshop downloads.

pub mod machine;
pub mod markers;
pub mod session;

use std::future::Future;
use std::path::Path;

pub use machine::{transition, ExitStatus, Observation, SessionEvent, SessionState};
pub use session::{guard_timeout_from_env, GuardCallback, GuardCode, LineBuffer, LoginTarget, SteamCmd, SteamCmdSession};

use crate::config::MagmaConfig;
use crate::error::{CryptoError, SteamCmdError};
use crate::progress::ProgressSink;
use crate::secrets::KeyStore;

/// Builds the login for the stored credentials, anonymous when there are none.
pub fn login_target(config: &MagmaConfig, keys: &KeyStore) -> Result<LoginTarget, CryptoError> {
    match &config.credentials {
        Some(credentials) => Ok(LoginTarget::User {
            username: credentials.username.clone(),
            password: keys.open(credentials)?,
        }),
        None => Ok(LoginTarget::Anonymous),
    }
}

/// Downloads Workshop items into a server directory.
pub trait WorkshopDownloader: Send {
    /// Downloads every id in one go and returns the ids that completed.
    fn download(&mut self, install_dir: &Path, ids: &[u64]) -> impl Future<Output = Result<Vec<u64>, SteamCmdError>> + Send;
}

/// Runs one SteamCMD process per call.
pub struct SteamCmdDownloader {
    steamcmd: SteamCmd,
    login: LoginTarget,
    guard: GuardCode,
    progress: ProgressSink,
}

impl SteamCmdDownloader {
    pub fn new(steamcmd: SteamCmd, login: LoginTarget, guard: GuardCode, progress: ProgressSink) -> Self {
        Self { steamcmd, login, guard, progress }
    }
}

impl WorkshopDownloader for SteamCmdDownloader {
    async fn download(&mut self, install_dir: &Path, ids: &[u64]) -> Result<Vec<u64>, SteamCmdError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        // a fixed code is only good for one login
        let guard = std::mem::take(&mut self.guard);
        let mut session = self.steamcmd.spawn(&self.login, guard, self.progress.clone())?;
        session.login().await?;
        session.download(install_dir, ids).await
    }
}

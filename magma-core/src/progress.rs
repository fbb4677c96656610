use std::fmt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Everything a long-running command reports while it works, in production order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    LoggingIn,
    SteamGuardRequired,
    LoggedIn,
    LoginFailed(String),
    ItemDownloaded(u64),
    ComparingTimestamp { name: String },
    TimestampUnchanged { name: String },
    UpdateAvailable { name: String },
    Lowercasing { name: String },
    Linking { name: String },
    UpdatingKeys { name: String },
    ItemReady { name: String },
    AllReady,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Progress::LoggingIn => write!(f, "Logging in to Steam"),
            Progress::SteamGuardRequired => write!(f, "Steam Guard code required"),
            Progress::LoggedIn => write!(f, "Logged in"),
            Progress::LoginFailed(reason) => write!(f, "Login failed: {reason}"),
            Progress::ItemDownloaded(id) => write!(f, "Downloaded item {id}"),
            Progress::ComparingTimestamp { name } => write!(f, "Checking {name} for updates"),
            Progress::TimestampUnchanged { name } => write!(f, "{name} is up-to-date"),
            Progress::UpdateAvailable { name } => write!(f, "Update available for {name}"),
            Progress::Lowercasing { name } => write!(f, "Renaming {name} files to lowercase"),
            Progress::Linking { name } => write!(f, "Linking {name}"),
            Progress::UpdatingKeys { name } => write!(f, "Updating keys for {name}"),
            Progress::ItemReady { name } => write!(f, "{name} is ready"),
            Progress::AllReady => write!(f, "All mods are ready"),
        }
    }
}

/// Sending half handed to the core. A `None` sink drops events, which is what tests
/// and unattended runs usually want.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<UnboundedSender<Progress>>,
}

impl ProgressSink {
    pub fn channel() -> (Self, UnboundedReceiver<Progress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn discard() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: Progress) {
        tracing::debug!(target: "progress", "{}", event);
        if let Some(tx) = &self.tx {
            // receiver gone means nobody is watching any more
            let _ = tx.send(event);
        }
    }
}

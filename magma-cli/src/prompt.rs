use anyhow::{bail, Context, Result};
use futures_util::FutureExt;
use indicatif::ProgressBar;
use inquire::{Confirm, InquireError, MultiSelect, Password, Select, Text};
use magma_core::validate::{self, expand_path};
use magma_core::{detect_server_dir, detect_steamcmd, GuardCode, Mod};
use std::fmt;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

/// Runs a blocking inquire prompt off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, InquireError> + Send + 'static,
{
    let answer = tokio::task::spawn_blocking(f).await.context("prompt task panicked")??;
    Ok(answer)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    SteamCmd,
    Server,
    LinuxGsm,
}

impl PathKind {
    fn question(self) -> &'static str {
        match self {
            PathKind::SteamCmd => "Path to the SteamCMD executable:",
            PathKind::Server => "Path to the Arma 3 server directory:",
            PathKind::LinuxGsm => "Path to the LinuxGSM instance config (leave empty to skip):",
        }
    }

    fn flag(self) -> &'static str {
        match self {
            PathKind::SteamCmd => "--steam-cmd",
            PathKind::Server => "--server",
            PathKind::LinuxGsm => "--linux-gsm",
        }
    }

    pub fn is_valid(self, path: &Path) -> bool {
        match self {
            PathKind::SteamCmd => validate::is_steamcmd(path),
            PathKind::Server => validate::is_server_dir(path),
            PathKind::LinuxGsm => validate::is_linuxgsm_config(path),
        }
    }

    fn hint(self) -> &'static str {
        match self {
            PathKind::SteamCmd => validate::steamcmd_hint(),
            PathKind::Server => validate::server_hint(),
            PathKind::LinuxGsm => validate::linuxgsm_hint(),
        }
    }

    fn detect(self) -> Option<PathBuf> {
        match self {
            PathKind::SteamCmd => detect_steamcmd(),
            PathKind::Server => detect_server_dir(),
            PathKind::LinuxGsm => None,
        }
    }
}

/// One line of a mod selection list.
#[derive(Debug, Clone)]
pub struct ModChoice {
    pub id: u32,
    label: String,
}

impl From<&Mod> for ModChoice {
    fn from(m: &Mod) -> Self {
        let origin = match m.steam_id {
            Some(steam_id) => steam_id.to_string(),
            None => "local".to_string(),
        };
        Self { id: m.id, label: format!("{} - {} ({}, {})", m.id, m.name, m.kind, origin) }
    }
}

impl fmt::Display for ModChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Asks the user for missing input, or refuses to when running unattended.
#[derive(Debug, Clone, Copy)]
pub struct Prompter {
    interactive: bool,
}

impl Prompter {
    /// Prompts are also off when stdin is not a terminal.
    pub fn new(non_interactive: bool) -> Self {
        Self { interactive: !non_interactive && std::io::stdin().is_terminal() }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn require(&self, what: &str) -> Result<()> {
        if !self.interactive {
            bail!("{what} is required in non-interactive mode.");
        }
        Ok(())
    }

    pub async fn text(&self, message: &str, default: Option<String>) -> Result<String> {
        self.require(message.trim_end_matches(':'))?;
        let message = message.to_string();
        blocking(move || {
            let mut prompt = Text::new(&message);
            if let Some(default) = default.as_deref() {
                prompt = prompt.with_default(default);
            }
            prompt.prompt()
        })
        .await
    }

    /// Like `text`, but empty answers and unattended runs give `None`.
    pub async fn optional_text(&self, message: &str) -> Result<Option<String>> {
        if !self.interactive {
            return Ok(None);
        }
        let answer = self.text(message, None).await?;
        let answer = answer.trim();
        Ok((!answer.is_empty()).then(|| answer.to_string()))
    }

    pub async fn password(&self, message: &str) -> Result<String> {
        self.require(message.trim_end_matches(':'))?;
        let message = message.to_string();
        blocking(move || Password::new(&message).without_confirmation().prompt()).await
    }

    pub async fn confirm(&self, message: &str, default: bool) -> Result<bool> {
        if !self.interactive {
            return Ok(default);
        }
        let message = message.to_string();
        blocking(move || Confirm::new(&message).with_default(default).prompt()).await
    }

    pub async fn select<T>(&self, message: &str, options: Vec<T>) -> Result<T>
    where
        T: fmt::Display + Send + 'static,
    {
        self.require(message.trim_end_matches(':'))?;
        let message = message.to_string();
        blocking(move || Select::new(&message, options).prompt()).await
    }

    pub async fn multi_select<T>(&self, message: &str, options: Vec<T>) -> Result<Vec<T>>
    where
        T: fmt::Display + Send + 'static,
    {
        self.require(message.trim_end_matches(':'))?;
        let message = message.to_string();
        blocking(move || MultiSelect::new(&message, options).prompt()).await
    }

    /// Checks a path given on the command line, asking again while it is invalid. Without
    /// one, the detected default is used unattended or offered in the prompt.
    pub async fn path(&self, kind: PathKind, given: Option<PathBuf>) -> Result<PathBuf> {
        match given {
            Some(path) if kind.is_valid(&path) => return Ok(path),
            Some(path) => {
                if !self.interactive {
                    bail!("{} is not valid. {}", path.display(), kind.hint());
                }
                eprintln!("{} is not valid. {}", path.display(), kind.hint());
            }
            None if !self.interactive => {
                return match kind.detect() {
                    Some(path) => Ok(path),
                    None => bail!("{} is required in non-interactive mode. {}", kind.flag(), kind.hint()),
                };
            }
            None => {}
        }

        loop {
            let default = kind.detect().map(|p| p.display().to_string());
            let path = expand_path(&self.text(kind.question(), default).await?);
            if kind.is_valid(&path) {
                return Ok(path);
            }
            eprintln!("{} is not valid. {}", path.display(), kind.hint());
        }
    }

    /// Like `path`, for settings that may stay unset.
    pub async fn optional_path(&self, kind: PathKind, given: Option<PathBuf>) -> Result<Option<PathBuf>> {
        if given.is_some() {
            return self.path(kind, given).await.map(Some);
        }
        loop {
            let Some(answer) = self.optional_text(kind.question()).await? else { return Ok(None) };
            let path = expand_path(&answer);
            if kind.is_valid(&path) {
                return Ok(Some(path));
            }
            eprintln!("{} is not valid. {}", path.display(), kind.hint());
        }
    }

    /// Where Steam Guard codes come from: the flag, else a prompt shown over the spinner,
    /// else nowhere.
    pub fn guard_code(&self, flag: Option<String>, bar: ProgressBar) -> GuardCode {
        if let Some(code) = flag {
            return GuardCode::Fixed(code.trim().to_string());
        }
        if !self.interactive {
            return GuardCode::Unavailable;
        }
        GuardCode::Callback(Box::new(move || {
            let bar = bar.clone();
            async move {
                let code = blocking(move || bar.suspend(|| Text::new("Steam Guard code:").prompt())).await?;
                Ok::<_, anyhow::Error>(code.trim().to_string())
            }
            .boxed()
        }))
    }
}

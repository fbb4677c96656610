use clap::{Args, Parser, Subcommand, ValueEnum};
use magma_core::{MissingItemPolicy, ModKind};
use std::path::PathBuf;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_COMMIT_HASH"), ")");

/// Manages Steam Workshop mods for an Arma 3 dedicated server.
#[derive(Parser, Debug)]
#[command(name = "magma", version = VERSION, about, long_about = None)]
pub struct Cli {
    /// Print debug output on the console as well as in the log file.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create magma.json in the current directory.
    #[command(alias = "initialize")]
    Init(InitArgs),

    /// Add Steam Workshop items to the configuration. Nothing is downloaded yet.
    Add {
        /// Workshop ids of the items to add.
        #[arg(required = true, num_args = 1..)]
        ids: Vec<u64>,

        #[arg(short = 't', long = "type", value_enum, default_value_t = KindArg::Required)]
        kind: KindArg,
    },

    /// Add a mod that already sits in one of the server's mod directories.
    #[command(name = "add:local")]
    AddLocal {
        /// Mod name; the directory is expected at `@<snake_case_name>`.
        name: Option<String>,

        #[arg(short = 't', long = "type", value_enum, default_value_t = KindArg::Required)]
        kind: KindArg,

        #[arg(short, long)]
        non_interactive: bool,
    },

    /// Remove mods together with their links, keys and downloaded files.
    #[command(alias = "uninstall")]
    Remove(SelectArgs),

    /// List the configured mods.
    #[command(alias = "ls")]
    List,

    /// Download and set up every mod that is not installed yet.
    Install {
        /// Reinstall mods that are already installed.
        #[arg(short, long)]
        force: bool,

        #[command(flatten)]
        steam: SteamArgs,
    },

    /// Download and set up mods that changed on the Workshop.
    Update {
        #[command(flatten)]
        steam: SteamArgs,
    },

    /// Link mods into the server and install their keys.
    Activate(SelectArgs),

    /// Unlink mods and remove their keys, keeping the downloaded files.
    Deactivate(SelectArgs),

    /// Verify Steam credentials with SteamCMD and store them.
    Login {
        #[command(flatten)]
        credentials: CredentialArgs,

        #[arg(short, long)]
        non_interactive: bool,
    },

    /// Post Workshop update notices to the configured webhook.
    Cron,

    /// Change settings in magma.json.
    #[command(alias = "config")]
    Configure(ConfigureArgs),

    /// Bring an older magma.json up to the current version.
    Upgrade,
}

#[derive(Args, Debug, Default)]
pub struct CredentialArgs {
    /// Steam username.
    #[arg(short, long)]
    pub username: Option<String>,

    /// Steam password. It ends up in SteamCMD's command line.
    #[arg(short, long)]
    pub password: Option<String>,

    /// Steam Guard code for the next login.
    #[arg(short = 'g', long)]
    pub steam_guard: Option<String>,
}

#[derive(Args, Debug)]
pub struct SteamArgs {
    /// Steam Guard code for the next login.
    #[arg(short = 'g', long)]
    pub steam_guard: Option<String>,

    /// Fail instead of prompting.
    #[arg(short, long)]
    pub non_interactive: bool,
}

#[derive(Args, Debug)]
pub struct SelectArgs {
    /// Local mod ids as shown by `magma list`. Prompts for a selection when empty.
    pub ids: Vec<u32>,

    #[arg(short, long)]
    pub non_interactive: bool,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing magma.json.
    #[arg(short, long)]
    pub force: bool,

    #[command(flatten)]
    pub paths: PathArgs,

    #[command(flatten)]
    pub credentials: CredentialArgs,

    #[arg(short, long)]
    pub non_interactive: bool,
}

#[derive(Args, Debug, Default)]
pub struct PathArgs {
    /// Arma 3 server directory.
    #[arg(short, long)]
    pub server: Option<String>,

    /// SteamCMD executable.
    #[arg(short = 'c', long)]
    pub steam_cmd: Option<String>,

    /// LinuxGSM instance config to keep the mod lines of.
    #[arg(short = 'l', long)]
    pub linux_gsm: Option<String>,

    /// Webhook that receives `magma cron` notices.
    #[arg(short, long)]
    pub webhook_url: Option<String>,
}

#[derive(Args, Debug)]
pub struct ConfigureArgs {
    #[command(flatten)]
    pub paths: PathArgs,

    #[command(flatten)]
    pub credentials: CredentialArgs,

    /// What `update` and `cron` do with Workshop items that no longer exist.
    #[arg(long, value_enum)]
    pub on_missing_item: Option<MissingItemArg>,

    #[arg(short, long)]
    pub non_interactive: bool,
}

impl ConfigureArgs {
    /// True when any setting was passed on the command line. A lone guard code does not count.
    pub fn has_settings(&self) -> bool {
        let p = &self.paths;
        p.server.is_some()
            || p.steam_cmd.is_some()
            || p.linux_gsm.is_some()
            || p.webhook_url.is_some()
            || self.credentials.username.is_some()
            || self.credentials.password.is_some()
            || self.on_missing_item.is_some()
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindArg {
    Required,
    ClientOnly,
    ServerOnly,
}

impl From<KindArg> for ModKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Required => ModKind::Required,
            KindArg::ClientOnly => ModKind::ClientOnly,
            KindArg::ServerOnly => ModKind::ServerOnly,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissingItemArg {
    Abort,
    Skip,
}

impl From<MissingItemArg> for MissingItemPolicy {
    fn from(policy: MissingItemArg) -> Self {
        match policy {
            MissingItemArg::Abort => MissingItemPolicy::Abort,
            MissingItemArg::Skip => MissingItemPolicy::Skip,
        }
    }
}

impl PathArgs {
    pub fn server_path(&self) -> Option<PathBuf> {
        self.server.as_deref().map(magma_core::validate::expand_path)
    }

    pub fn steam_cmd_path(&self) -> Option<PathBuf> {
        self.steam_cmd.as_deref().map(magma_core::validate::expand_path)
    }

    pub fn linux_gsm_path(&self) -> Option<PathBuf> {
        self.linux_gsm.as_deref().map(magma_core::validate::expand_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_add_local_with_type() {
        let cli = Cli::try_parse_from(["magma", "add:local", "My Mod", "-t", "server-only", "-n"]).unwrap();
        match cli.command {
            Command::AddLocal { name, kind, non_interactive } => {
                assert_eq!(name.as_deref(), Some("My Mod"));
                assert_eq!(ModKind::from(kind), ModKind::ServerOnly);
                assert!(non_interactive);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn add_requires_ids() {
        assert!(Cli::try_parse_from(["magma", "add"]).is_err());
        let cli = Cli::try_parse_from(["magma", "-v", "add", "450814997", "333310405"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Add { ref ids, .. } if ids.len() == 2));
    }

    #[test]
    fn install_takes_guard_code_and_force() {
        let cli = Cli::try_parse_from(["magma", "install", "-f", "-g", "ABCDE", "-n"]).unwrap();
        match cli.command {
            Command::Install { force, steam } => {
                assert!(force);
                assert_eq!(steam.steam_guard.as_deref(), Some("ABCDE"));
                assert!(steam.non_interactive);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn configure_detects_settings() {
        let cli = Cli::try_parse_from(["magma", "configure", "-g", "ABCDE"]).unwrap();
        let Command::Configure(args) = cli.command else { panic!("expected configure") };
        assert!(!args.has_settings());

        let cli = Cli::try_parse_from(["magma", "configure", "--on-missing-item", "skip"]).unwrap();
        let Command::Configure(args) = cli.command else { panic!("expected configure") };
        assert!(args.has_settings());
    }
}

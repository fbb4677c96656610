use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading or writing `magma.json`.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No configuration file exists in the working directory.
    #[error("Magma is not initialized. Run `magma init` to initialize your project.")]
    NotInitialized,

    /// The configuration file was written by another schema version.
    #[error("Magma has an out-of-date configuration file (magma.json, version {found}, expected {expected}). To fix this error run: `magma upgrade`.")]
    OutdatedConfigurationFile { found: u32, expected: u32 },

    #[error("Magma is already initialized. Add the --force flag to overwrite the magma.json file.")]
    AlreadyInitialized,

    /// A stored mod breaks the Workshop/local invariant.
    #[error("mod {id} ({name}) is invalid: {reason}")]
    InvalidMod { id: u32, name: String, reason: &'static str },

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by the Steam Web API client.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("Steam API responded with HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("Item with the given id of {0} does not exist.")]
    ItemNotFound(u64),

    #[error("Something went wrong when receiving the file data for {id} (result code {code}).")]
    ItemFailed { id: u64, code: i64 },

    #[error("Steam API returned an unreadable response: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Steam API returned {returned} item(s) for {requested} requested id(s)")]
    CountMismatch { requested: usize, returned: usize },
}

/// Errors raised while driving a SteamCMD process.
#[derive(Error, Debug)]
pub enum SteamCmdError {
    #[error("failed to start SteamCMD at {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("SteamCMD console I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("SteamCMD login failed: {0}")]
    LoginFailed(String),

    #[error("Steam Guard is requesting a code but none can be supplied. Try running `magma login`.")]
    GuardCodeRequired,

    #[error("failed to obtain a Steam Guard code: {0}")]
    GuardPrompt(String),

    #[error("SteamCMD exited before logging in: {0}")]
    ExitedBeforeLogin(String),

    #[error("SteamCMD download failed: {0}")]
    DownloadFailed(String),

    #[error("SteamCMD session is not logged in")]
    NotLoggedIn,
}

/// Errors raised by the password encrypter and key store.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("the encryption key is invalid; AES-256-CBC requires a base64 encoded 32 byte key")]
    InvalidKey,

    #[error("The payload is invalid.")]
    InvalidPayload,

    #[error("The MAC is invalid.")]
    InvalidMac,

    #[error("could not decrypt the payload")]
    Decrypt,

    #[error("failed to access key file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no encryption key found at {}. Run `magma login` to store your credentials again.", .0.display())]
    MissingKey(PathBuf),
}

use super::markers::{self, Marker};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Failure(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    /// `legacy_ok` is set once an older client printed `Logged in OK`.
    LoggingIn { legacy_ok: bool },
    AwaitingGuardCode,
    LoggedIn,
    Downloading,
    Exited(ExitStatus),
}

impl SessionState {
    pub fn is_exited(&self) -> bool {
        matches!(self, SessionState::Exited(_))
    }
}

/// What the driver saw or did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Line(String),
    Prompt(String),
    GuardTimeout,
    CodeSubmitted,
    DownloadsQueued,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggingIn,
    GuardCodeRequested,
    LoggedIn,
    LoginFailed(String),
    ItemDownloaded(u64),
    ItemFailed(String),
}

pub const EXITED_BEFORE_LOGIN: &str = "process exited before logging in";

fn failed(reason: &str) -> SessionState {
    SessionState::Exited(ExitStatus::Failure(reason.trim().to_string()))
}

pub fn transition(state: SessionState, observation: &Observation) -> (SessionState, Option<SessionEvent>) {
    use Observation as O;
    use SessionState as S;

    match state {
        S::Exited(status) => (S::Exited(status), None),

        S::NotStarted => match observation {
            O::Line(text) | O::Prompt(text) => match markers::classify(text) {
                // "Logging in user ...FAILED login with result code ..." arrives as one line
                Some(Marker::LoginFailure) => (failed(text), Some(SessionEvent::LoginFailed(text.trim().to_string()))),
                Some(Marker::GuardPrompt) => (S::AwaitingGuardCode, Some(SessionEvent::GuardCodeRequested)),
                Some(Marker::LoginAttempt) => (S::LoggingIn { legacy_ok: false }, Some(SessionEvent::LoggingIn)),
                _ => (S::NotStarted, None),
            },
            O::Eof => (failed(EXITED_BEFORE_LOGIN), None),
            _ => (S::NotStarted, None),
        },

        S::LoggingIn { legacy_ok } => match observation {
            O::Line(text) => match markers::classify(text) {
                Some(Marker::LoginFailure) => (failed(text), Some(SessionEvent::LoginFailed(text.trim().to_string()))),
                Some(Marker::GuardPrompt) => (S::AwaitingGuardCode, Some(SessionEvent::GuardCodeRequested)),
                Some(Marker::LoginComplete) => (S::LoggedIn, Some(SessionEvent::LoggedIn)),
                Some(Marker::LegacyLoggedIn) => (S::LoggingIn { legacy_ok: true }, None),
                _ if legacy_ok && text.contains(markers::LEGACY_OK) => (S::LoggedIn, Some(SessionEvent::LoggedIn)),
                _ => (S::LoggingIn { legacy_ok }, None),
            },
            O::Prompt(text) => match markers::classify(text) {
                Some(Marker::LoginFailure) => (failed(text), Some(SessionEvent::LoginFailed(text.trim().to_string()))),
                Some(Marker::GuardPrompt) => (S::AwaitingGuardCode, Some(SessionEvent::GuardCodeRequested)),
                _ => (S::LoggingIn { legacy_ok }, None),
            },
            O::GuardTimeout => (S::AwaitingGuardCode, Some(SessionEvent::GuardCodeRequested)),
            O::Eof => (failed(EXITED_BEFORE_LOGIN), None),
            _ => (S::LoggingIn { legacy_ok }, None),
        },

        S::AwaitingGuardCode => match observation {
            O::CodeSubmitted => (S::LoggingIn { legacy_ok: false }, None),
            O::Line(text) if markers::classify(text) == Some(Marker::LoginFailure) => {
                (failed(text), Some(SessionEvent::LoginFailed(text.trim().to_string())))
            }
            O::Eof => (failed(EXITED_BEFORE_LOGIN), None),
            _ => (S::AwaitingGuardCode, None),
        },

        S::LoggedIn => match observation {
            O::DownloadsQueued => (S::Downloading, None),
            O::Eof => (S::Exited(ExitStatus::Success), None),
            _ => (S::LoggedIn, None),
        },

        S::Downloading => match observation {
            O::Line(text) => match markers::classify(text) {
                Some(Marker::DownloadSuccess(id)) => (S::Downloading, Some(SessionEvent::ItemDownloaded(id))),
                Some(Marker::DownloadError) => (failed(text), Some(SessionEvent::ItemFailed(text.trim().to_string()))),
                _ => (S::Downloading, None),
            },
            O::Eof => (S::Exited(ExitStatus::Success), None),
            _ => (S::Downloading, None),
        },
    }
}

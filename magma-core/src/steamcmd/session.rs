use futures_util::future::BoxFuture;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::machine::{transition, ExitStatus, Observation, SessionEvent, SessionState, EXITED_BEFORE_LOGIN};
use super::markers;
use crate::error::SteamCmdError;
use crate::progress::{Progress, ProgressSink};
use crate::servers::ARMA3;

pub const DEFAULT_GUARD_TIMEOUT: Duration = Duration::from_secs(10);
const GUARD_TIMEOUT_ENV: &str = "MAGMA_GUARD_TIMEOUT_SECS";

/// SteamCMD does not always print a prompt when it wants a Steam Guard code, so a login
/// that stays silent this long is treated as waiting for one.
pub fn guard_timeout_from_env() -> Duration {
    std::env::var(GUARD_TIMEOUT_ENV)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_GUARD_TIMEOUT)
}

pub type GuardCallback = Box<dyn FnMut() -> BoxFuture<'static, anyhow::Result<String>> + Send>;

/// Where a Steam Guard code comes from when SteamCMD asks for one.
#[derive(Default)]
pub enum GuardCode {
    /// Supplied up front, used for the first request only.
    Fixed(String),
    /// Asked for on demand, e.g. by prompting the user.
    Callback(GuardCallback),
    /// Unattended run: a request is fatal.
    #[default]
    Unavailable,
}

impl std::fmt::Debug for GuardCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardCode::Fixed(_) => f.write_str("Fixed(..)"),
            GuardCode::Callback(_) => f.write_str("Callback(..)"),
            GuardCode::Unavailable => f.write_str("Unavailable"),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum LoginTarget {
    Anonymous,
    User { username: String, password: String },
}

impl std::fmt::Debug for LoginTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoginTarget::Anonymous => f.write_str("Anonymous"),
            LoginTarget::User { username, .. } => write!(f, "User({username})"),
        }
    }
}

/// Splits raw console bytes into observations. Carriage returns and ANSI escapes are dropped.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Observation> {
        self.pending.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            out.push(Observation::Line(clean(&line)));
        }
        if !self.pending.is_empty() {
            let tail = clean(&self.pending);
            if markers::is_prompt(&tail) {
                // consumed here so the rest of the line does not trigger it again
                self.pending.clear();
                out.push(Observation::Prompt(tail));
            }
        }
        out
    }

    /// Whatever is left once the stream closes.
    pub fn finish(&mut self) -> Option<Observation> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = clean(&std::mem::take(&mut self.pending));
        (!rest.trim().is_empty()).then_some(Observation::Line(rest))
    }
}

fn clean(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\u{1b}' => {
                if chars.peek() == Some(&'[') {
                    chars.next();
                    for c in chars.by_ref() {
                        if ('\u{40}'..='\u{7e}').contains(&c) {
                            break;
                        }
                    }
                }
            }
            '\r' | '\n' => {}
            c => out.push(c),
        }
    }
    out
}

fn quote_path(path: &Path) -> String {
    let text = path.display().to_string();
    if text.contains(' ') { format!("\"{text}\"") } else { text }
}

/// One running SteamCMD console. The reader is its stdout, the writer its stdin.
pub struct SteamCmdSession<R, W> {
    reader: R,
    writer: W,
    buffer: LineBuffer,
    queue: VecDeque<Observation>,
    eof: bool,
    state: SessionState,
    guard: GuardCode,
    guard_timeout: Duration,
    progress: ProgressSink,
    child: Option<Child>,
}

impl<R, W> SteamCmdSession<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W, guard: GuardCode, progress: ProgressSink, guard_timeout: Duration) -> Self {
        Self {
            reader,
            writer,
            buffer: LineBuffer::default(),
            queue: VecDeque::new(),
            eof: false,
            state: SessionState::NotStarted,
            guard,
            guard_timeout,
            progress,
            child: None,
        }
    }

    fn with_child(mut self, child: Child) -> Self {
        self.child = Some(child);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    fn apply(&mut self, observation: Observation) -> Option<SessionEvent> {
        let (next, event) = transition(self.state.clone(), &observation);
        if next != self.state {
            debug!(target: "steamcmd", "{:?}: {:?} -> {:?}", observation, self.state, next);
        }
        self.state = next;
        event
    }

    async fn next_observation(&mut self, deadline: Option<Instant>) -> Result<Observation, SteamCmdError> {
        loop {
            if let Some(obs) = self.queue.pop_front() {
                if let Observation::Line(text) = &obs {
                    debug!(target: "steamcmd", "{text}");
                }
                return Ok(obs);
            }
            if self.eof {
                return Ok(Observation::Eof);
            }
            let mut chunk = [0u8; 4096];
            let read = match deadline {
                Some(at) => match tokio::time::timeout_at(at, self.reader.read(&mut chunk)).await {
                    Ok(read) => read?,
                    Err(_) => return Ok(Observation::GuardTimeout),
                },
                None => self.reader.read(&mut chunk).await?,
            };
            if read == 0 {
                self.eof = true;
                self.queue.extend(self.buffer.finish());
            } else {
                self.queue.extend(self.buffer.push(&chunk[..read]));
            }
        }
    }

    async fn write_line(&mut self, line: &str) -> Result<(), SteamCmdError> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn reap(&mut self) {
        if let Some(mut child) = self.child.take() {
            match child.wait().await {
                Ok(status) => debug!(target: "steamcmd", "SteamCMD exited with {status}"),
                Err(e) => warn!("failed to wait for SteamCMD: {e}"),
            }
        }
    }

    /// Stops a console that will not exit on its own.
    async fn abort(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }

    async fn submit_guard_code(&mut self) -> Result<(), SteamCmdError> {
        self.progress.emit(Progress::SteamGuardRequired);
        let code = match std::mem::take(&mut self.guard) {
            GuardCode::Fixed(code) => code,
            GuardCode::Callback(mut ask) => {
                let answer = ask().await;
                self.guard = GuardCode::Callback(ask);
                answer.map_err(|e| SteamCmdError::GuardPrompt(format!("{e:#}")))?
            }
            GuardCode::Unavailable => {
                self.abort().await;
                return Err(SteamCmdError::GuardCodeRequired);
            }
        };
        info!("submitting Steam Guard code");
        self.write_line(code.trim()).await?;
        self.apply(Observation::CodeSubmitted);
        Ok(())
    }

    /// Drives the console until SteamCMD reports a completed login.
    pub async fn login(&mut self) -> Result<(), SteamCmdError> {
        self.progress.emit(Progress::LoggingIn);
        let mut guard_deadline: Option<Instant> = None;
        let mut guard_timer_fired = false;

        loop {
            if self.state == SessionState::LoggedIn {
                return Ok(());
            }
            if let SessionState::Exited(status) = &self.state {
                let reason = match status {
                    ExitStatus::Failure(reason) => reason.clone(),
                    ExitStatus::Success => EXITED_BEFORE_LOGIN.to_string(),
                };
                self.reap().await;
                return Err(SteamCmdError::ExitedBeforeLogin(reason));
            }

            let deadline = match self.state {
                SessionState::LoggingIn { .. } if !guard_timer_fired => guard_deadline,
                _ => None,
            };
            let observation = self.next_observation(deadline).await?;
            if observation == Observation::GuardTimeout {
                guard_timer_fired = true;
                debug!(target: "steamcmd", "no login progress after {:?}", self.guard_timeout);
            }

            let event = self.apply(observation);
            if matches!(self.state, SessionState::LoggingIn { .. }) && guard_deadline.is_none() {
                guard_deadline = Some(Instant::now() + self.guard_timeout);
            }

            match event {
                Some(SessionEvent::GuardCodeRequested) => {
                    // one request per login, whether prompted or timed out
                    guard_timer_fired = true;
                    self.submit_guard_code().await?
                }
                Some(SessionEvent::LoggedIn) => {
                    info!("SteamCMD logged in");
                    self.progress.emit(Progress::LoggedIn);
                }
                Some(SessionEvent::LoginFailed(reason)) => {
                    self.progress.emit(Progress::LoginFailed(reason.clone()));
                    self.abort().await;
                    return Err(SteamCmdError::LoginFailed(reason));
                }
                _ => {}
            }
        }
    }

    /// Queues every item into one session, then waits for SteamCMD to exit.
    /// Returns the ids SteamCMD reported as downloaded.
    pub async fn download(&mut self, install_dir: &Path, ids: &[u64]) -> Result<Vec<u64>, SteamCmdError> {
        if self.state != SessionState::LoggedIn {
            return Err(SteamCmdError::NotLoggedIn);
        }
        self.write_line(&format!("force_install_dir {}", quote_path(install_dir))).await?;
        for id in ids {
            info!("queueing workshop item {id}");
            self.write_line(&format!("workshop_download_item {} {id}", ARMA3.game_app_id)).await?;
        }
        self.write_line("quit").await?;
        self.apply(Observation::DownloadsQueued);

        let mut downloaded = Vec::with_capacity(ids.len());
        while !self.state.is_exited() {
            let observation = self.next_observation(None).await?;
            match self.apply(observation) {
                Some(SessionEvent::ItemDownloaded(id)) => {
                    self.progress.emit(Progress::ItemDownloaded(id));
                    downloaded.push(id);
                }
                Some(SessionEvent::ItemFailed(reason)) => {
                    self.abort().await;
                    return Err(SteamCmdError::DownloadFailed(reason));
                }
                _ => {}
            }
        }
        self.reap().await;

        if let Some(missing) = ids.iter().find(|id| !downloaded.contains(id)) {
            return Err(SteamCmdError::DownloadFailed(format!("item {missing} was not reported as downloaded")));
        }
        Ok(downloaded)
    }

    /// Ends a login-only session.
    pub async fn quit(mut self) -> Result<(), SteamCmdError> {
        if !self.state.is_exited() {
            self.write_line("quit").await?;
            while !self.state.is_exited() {
                let observation = self.next_observation(None).await?;
                self.apply(observation);
            }
        }
        self.reap().await;
        Ok(())
    }
}

/// Spawns SteamCMD processes from the configured executable.
#[derive(Debug, Clone)]
pub struct SteamCmd {
    path: PathBuf,
    guard_timeout: Duration,
}

impl SteamCmd {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), guard_timeout: guard_timeout_from_env() }
    }

    pub fn spawn(
        &self,
        login: &LoginTarget,
        guard: GuardCode,
        progress: ProgressSink,
    ) -> Result<SteamCmdSession<ChildStdout, ChildStdin>, SteamCmdError> {
        let mut cmd = Command::new(&self.path);
        cmd.arg("+login");
        match login {
            LoginTarget::Anonymous => {
                cmd.arg("anonymous");
            }
            LoginTarget::User { username, password } => {
                cmd.arg(username).arg(password);
            }
        }
        cmd.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::null()).kill_on_drop(true);

        info!("starting SteamCMD {} as {:?}", self.path.display(), login);
        let mut child = cmd
            .spawn()
            .map_err(|source| SteamCmdError::Spawn { path: self.path.clone(), source })?;
        let stdout = child.stdout.take().ok_or_else(|| closed_pipe("stdout"))?;
        let stdin = child.stdin.take().ok_or_else(|| closed_pipe("stdin"))?;
        Ok(SteamCmdSession::new(stdout, stdin, guard, progress, self.guard_timeout).with_child(child))
    }

    /// Logs in and quits straight away, to check the credentials.
    pub async fn verify_login(&self, login: &LoginTarget, guard: GuardCode, progress: ProgressSink) -> Result<(), SteamCmdError> {
        let mut session = self.spawn(login, guard, progress)?;
        session.login().await?;
        session.quit().await
    }
}

fn closed_pipe(which: &str) -> SteamCmdError {
    SteamCmdError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, format!("SteamCMD {which} was not captured")))
}

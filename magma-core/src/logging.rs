use directories::ProjectDirs;
use once_cell::sync::OnceCell;
use std::fs;
use std::path::PathBuf;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static INIT: OnceCell<()> = OnceCell::new();
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// `logs/` under the user data directory, or `./logs` if it cannot be resolved.
pub fn log_dir() -> PathBuf {
    ProjectDirs::from("com", "magma", "magma")
        .map(|dirs| dirs.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Installs the global subscriber once. The console only shows warnings unless `verbose`
/// is set; the daily log file gets everything the filter lets through.
pub fn init_logging(verbose: bool) {
    let _ = INIT.get_or_init(|| {
        let dir = log_dir();
        let _ = fs::create_dir_all(&dir);
        let file_appender = rolling::daily(&dir, "magma.log");
        let (nb_file, guard) = tracing_appender::non_blocking(file_appender);
        let _ = FILE_GUARD.set(guard);

        let console_level = if verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };
        let console_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .with_filter(console_level);
        let file_layer = fmt::layer().with_writer(nb_file).with_ansi(false).with_target(false);

        let default = if verbose { "debug" } else { "info" };
        let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
        let _ = tracing_subscriber::registry()
            .with(env)
            .with(console_layer)
            .with(file_layer)
            .try_init();
    });
}

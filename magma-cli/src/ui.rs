use indicatif::{ProgressBar, ProgressStyle};
use magma_core::{Progress, ProgressSink};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Spinner that follows the events a core operation emits. Finished steps are kept as
/// lines above the spinner.
pub struct ProgressUi {
    bar: ProgressBar,
    task: JoinHandle<()>,
}

impl ProgressUi {
    /// Returns the sink to hand to the core. The UI stops following once every clone of
    /// it is dropped.
    pub fn start(message: &str) -> (ProgressSink, Self) {
        let (sink, mut rx) = ProgressSink::channel();
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            bar.set_style(style);
        }
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_message(message.to_string());

        let shown = bar.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                show(&shown, &event);
            }
        });
        (sink, Self { bar, task })
    }

    /// Handle for suspending the spinner around prompts.
    pub fn bar(&self) -> ProgressBar {
        self.bar.clone()
    }

    pub async fn succeed(self, message: &str) {
        self.close(Some(format!("✔ {message}"))).await;
    }

    pub async fn fail(self, message: &str) {
        self.close(Some(format!("✖ {message}"))).await;
    }

    pub async fn clear(self) {
        self.close(None).await;
    }

    async fn close(self, last: Option<String>) {
        // the task ends once the senders are gone
        if let Err(e) = self.task.await {
            tracing::debug!("progress display stopped: {e}");
        }
        if let Some(text) = last {
            line(&self.bar, text);
        }
        self.bar.finish_and_clear();
    }
}

/// A line above the spinner; plain output when the spinner is not drawn.
fn line(bar: &ProgressBar, text: String) {
    if bar.is_hidden() {
        println!("{text}");
    } else {
        bar.println(text);
    }
}

fn show(bar: &ProgressBar, event: &Progress) {
    match event {
        Progress::LoggedIn
        | Progress::ItemDownloaded(_)
        | Progress::TimestampUnchanged { .. }
        | Progress::ItemReady { .. }
        | Progress::AllReady => line(bar, format!("✔ {event}")),
        Progress::LoginFailed(_) => line(bar, format!("✖ {event}")),
        Progress::UpdateAvailable { .. } => line(bar, format!("• {event}")),
        _ => bar.set_message(event.to_string()),
    }
}

//! Terminal rendering of the upload session.
//!
//! Mirrors the session published by the controller onto an indicatif
//! progress bar until the session settles.

use crate::models::{UploadSession, UploadState};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;
use tokio::task::JoinHandle;

fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

/// Whole-percent position shown on the bar.
pub fn bar_position(session: &UploadSession) -> u64 {
    session.progress.clamp(0.0, 100.0).round() as u64
}

/// Status line shown next to the bar.
pub fn status_message(session: &UploadSession) -> String {
    let file = session.file_name.as_deref().unwrap_or("");
    match session.state {
        UploadState::Idle => "Waiting for a file".to_string(),
        UploadState::Loading => format!("Analyzing trust signals in {}…", file),
        UploadState::Success => "Upload complete".to_string(),
        UploadState::Error => session
            .error_message
            .clone()
            .unwrap_or_else(|| "Upload failed".to_string()),
    }
}

/// Render session updates until the session settles.
///
/// A hidden bar is used when `show` is false, so the task still drains the
/// channel without writing to the terminal.
pub fn spawn_progress_display(mut rx: watch::Receiver<UploadSession>, show: bool) -> JoinHandle<()> {
    let bar = if show {
        ProgressBar::new(100)
    } else {
        ProgressBar::hidden()
    };
    bar.set_style(progress_style());

    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let session = rx.borrow_and_update().clone();
            bar.set_position(bar_position(&session));
            bar.set_message(status_message(&session));

            match session.state {
                UploadState::Success => {
                    bar.finish_with_message(status_message(&session));
                    break;
                }
                UploadState::Error => {
                    bar.abandon_with_message(status_message(&session));
                    break;
                }
                UploadState::Idle | UploadState::Loading => {}
            }
        }
    })
}

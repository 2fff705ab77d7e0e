//! Spinner shown while the coordinator waits on a fix or a delivery.

use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::time::Duration;

/// Run `fut` behind a spinner labelled `message`; the spinner is cleared afterwards.
pub async fn with_spinner<F, T>(message: &str, fut: F) -> T
where
    F: Future<Output = T>,
{
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    let out = fut.await;
    spinner.finish_and_clear();
    out
}

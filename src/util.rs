use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Spinner shown while the backend runs; it has no notion of progress
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();

    if let Ok(style) = ProgressStyle::default_spinner().template("[{spinner:.green} {elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(100));

    pb
}

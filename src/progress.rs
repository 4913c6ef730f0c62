//! Progress reporting: open-ended counters for fetches and store scans.

use indicatif::{ProgressBar, ProgressStyle};

fn count_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg} {pos}  it/s: {per_sec}  elapsed: {elapsed_precise}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Counter for posts pulled from an account's timeline.
pub fn make_fetch_spinner(account: &str) -> ProgressBar {
    make_count_spinner(&format!("Fetching {}", account))
}

/// Counter with a label; the total is unknown up front.
pub fn make_count_spinner(label: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(count_style());
    if !label.is_empty() {
        pb.set_message(label.to_string());
    }
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

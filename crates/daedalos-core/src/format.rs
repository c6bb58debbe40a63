//! Formatting utilities

use std::time::Duration;

/// Format a duration in human-readable form
pub fn duration(d: Duration) -> String {
    let seconds = d.as_secs();
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        let mins = seconds / 60;
        let secs = seconds % 60;
        if secs == 0 {
            format!("{}m", mins)
        } else {
            format!("{}m {}s", mins, secs)
        }
    } else {
        let hours = seconds / 3600;
        let mins = (seconds % 3600) / 60;
        format!("{}h {}m", hours, mins)
    }
}

/// Format a duration as a MM:SS clock. Minutes are not capped at 59.
pub fn clock(d: Duration) -> String {
    let seconds = d.as_secs();
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Build a fixed-width progress bar from a fraction in 0.0..=1.0
pub fn progress_bar(fraction: f64, width: usize) -> String {
    let fraction = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = ((fraction * width as f64) as usize).min(width);
    let empty = width - filled;
    format!(
        "{}{}",
        "\u{2588}".repeat(filled), // filled blocks
        "\u{2591}".repeat(empty)   // empty blocks
    )
}

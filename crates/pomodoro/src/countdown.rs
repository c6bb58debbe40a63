//! Countdown display
//!
//! Waits out a phase while redrawing a single progress line once per tick:
//!
//! ```text
//! 🍅 [█████████░░░░░░░░░░░░░░░░░░░░░] 17:32 remaining
//! ```

use std::io::Write;
use std::time::Duration;

use daedalos_core::format;
use tokio::time::Instant;
use tracing::debug;
use unicode_width::UnicodeWidthStr;

use crate::cancel::CancelScope;

/// Redraw interval
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Width of the progress bar, in segments
pub const DEFAULT_BAR_WIDTH: usize = 30;

/// Renders a progress line while waiting for a deadline
#[derive(Debug, Clone)]
pub struct Countdown {
    tick: Duration,
    bar_width: usize,
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new(DEFAULT_TICK, DEFAULT_BAR_WIDTH)
    }
}

impl Countdown {
    pub fn new(tick: Duration, bar_width: usize) -> Self {
        Self { tick, bar_width }
    }

    /// Wait until `duration` elapses or `scope` is cancelled.
    ///
    /// Returns `true` when the duration ran out and `false` on cancellation.
    /// The progress line is cleared on both paths.
    pub async fn wait<W: Write>(
        &self,
        out: &mut W,
        scope: &CancelScope,
        duration: Duration,
        label: &str,
    ) -> bool {
        let deadline = Instant::now()
            .checked_add(duration)
            .unwrap_or_else(far_future);
        let mut drawn = 0;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                clear_line(out, drawn);
                return true;
            }

            let line = render_line(label, duration, remaining, self.bar_width);
            // Emoji labels take two terminal columns.
            drawn = drawn.max(line.width());
            draw(out, &line);

            tokio::select! {
                _ = scope.cancelled() => {
                    debug!(label, "countdown cancelled");
                    clear_line(out, drawn);
                    return false;
                }
                _ = tokio::time::sleep(self.tick.min(remaining)) => {}
            }
        }
    }
}

/// Build the progress line for a phase of `total` with `remaining` left
pub fn render_line(label: &str, total: Duration, remaining: Duration, bar_width: usize) -> String {
    let fraction = if total.is_zero() {
        1.0
    } else {
        (total.saturating_sub(remaining)).as_secs_f64() / total.as_secs_f64()
    };
    format!(
        "{} [{}] {} remaining",
        label,
        format::progress_bar(fraction, bar_width),
        format::clock(remaining)
    )
}

/// Deadline for waits too long to represent, about 30 years out
fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86400 * 365 * 30)
}

fn draw<W: Write>(out: &mut W, line: &str) {
    // A broken terminal must not stop the timer.
    let _ = write!(out, "\r{}", line);
    let _ = out.flush();
}

fn clear_line<W: Write>(out: &mut W, width: usize) {
    if width == 0 {
        return;
    }
    let _ = write!(out, "\r{}\r", " ".repeat(width));
    let _ = out.flush();
}

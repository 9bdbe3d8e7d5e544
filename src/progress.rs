//! Progress line parsing and panel rendering
//!
//! The external downloader emits human-readable progress lines such as
//!
//! ```text
//! [download]  42.7% of ~120.5MiB at 3.2MiB/s ETA 00:35
//! ```
//!
//! [`parse_progress_line`] extracts the individual fields from one such line.
//! It is a pure function: any field absent from the line yields its default,
//! and a completely malformed line yields an all-default snapshot. It never
//! fails.
//!
//! The rendering half turns a snapshot (or raw byte counts during uploads)
//! into the fixed-width text panel shown in the remote progress message.

use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

/// Number of segments in the rendered progress bar
const BAR_SEGMENTS: usize = 18;

/// Maximum length of a rendered download panel, in characters
const PANEL_CAP: usize = 900;

/// Maximum length of a rendered transfer (upload) panel, in characters
const TRANSFER_PANEL_CAP: usize = 800;

static PERCENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,3}\.\d+)%").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static TOTAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"of ~\s*([0-9.,A-Za-z]+)").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static SPEED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"at\s+([0-9.,A-Za-z]+/s)").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});
static ETA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"ETA\s+([0-9:]+)").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

/// Structured progress extracted from one downloader output line
///
/// Always the *latest* snapshot for a job; never persisted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProgressSnapshot {
    /// Completion percentage, 0.0 to 100.0
    pub percent: f64,
    /// Human label for the processed amount (synthesized from percent + total)
    pub processed: String,
    /// Human label for the total size (e.g. "120.5MiB")
    pub total: String,
    /// Human label for the transfer rate (e.g. "3.2MiB/s")
    pub speed: String,
    /// Human label for the estimated time remaining (e.g. "00:35")
    pub eta: String,
}

/// Parse one line of downloader output into a [`ProgressSnapshot`].
///
/// Stateless and reentrant. Fields that don't appear in the line are left at
/// their defaults. The processed label is synthesized only when both percent
/// and total are present.
pub fn parse_progress_line(line: &str) -> ProgressSnapshot {
    let percent = PERCENT_RE
        .captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0);

    let total = TOTAL_RE
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    let speed = SPEED_RE
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    let eta = ETA_RE
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    let processed = if percent != 0.0 && !total.is_empty() {
        format!("{percent:.2}%")
    } else {
        String::new()
    };

    ProgressSnapshot {
        percent,
        processed,
        total,
        speed,
        eta,
    }
}

fn bar(percent: f64) -> String {
    let clamped = percent.clamp(0.0, 100.0);
    let filled = ((clamped / 100.0) * BAR_SEGMENTS as f64) as usize;
    let filled = filled.min(BAR_SEGMENTS);
    let mut s = String::with_capacity(BAR_SEGMENTS * 3);
    for _ in 0..filled {
        s.push('█');
    }
    for _ in filled..BAR_SEGMENTS {
        s.push('░');
    }
    s
}

/// Keep only the last `cap` characters of `text`.
fn tail_capped(text: String, cap: usize) -> String {
    let count = text.chars().count();
    if count <= cap {
        return text;
    }
    text.chars().skip(count - cap).collect()
}

/// Render a download snapshot into the progress panel text.
///
/// Fixed-width bar of 18 segments proportional to percent, plus speed, size,
/// and ETA labels. The result is capped to the last 900 characters.
pub fn render_progress_panel(snapshot: &ProgressSnapshot) -> String {
    let lines = [
        "Downloading".to_string(),
        format!("{} {:.2}%", bar(snapshot.percent), snapshot.percent),
        format!("Speed: {}", snapshot.speed),
        format!("Processed: {}", snapshot.processed),
        format!("Size - ETA: {} - {}", snapshot.total, snapshot.eta),
    ];
    tail_capped(lines.join("\n"), PANEL_CAP)
}

/// Format a byte count as a human-readable size label.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let exponent = ((bytes as f64).log2() / 10.0).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    format!("{value:.2} {}", UNITS[exponent])
}

/// Estimate remaining time from elapsed wall time and byte counts.
///
/// Returns "Unknown" when nothing has been processed yet or the total is
/// indeterminate.
pub fn format_eta(elapsed: Duration, processed: u64, total: u64) -> String {
    if processed == 0 || total == 0 {
        return "Unknown".to_string();
    }
    let elapsed_secs = elapsed.as_secs_f64().max(1e-6);
    let speed = processed as f64 / elapsed_secs;
    if speed <= 0.0 {
        return "Unknown".to_string();
    }
    let remaining = total.saturating_sub(processed);
    let eta_seconds = (remaining as f64 / speed) as u64;
    let (minutes, seconds) = (eta_seconds / 60, eta_seconds % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Render the byte-based transfer panel used during uploads.
///
/// `current` and `total` come from the transport's progress callback; `elapsed`
/// is time since the upload started. The result is capped to the last 800
/// characters.
pub fn render_transfer_panel(current: u64, total: u64, elapsed: Duration) -> String {
    let percent = if total > 0 {
        (current as f64 / total as f64) * 100.0
    } else {
        0.0
    };
    let speed = if current > 0 {
        let secs = elapsed.as_secs_f64().max(1e-6);
        format!("{}/s", format_size((current as f64 / secs) as u64))
    } else {
        "0 B/s".to_string()
    };
    let total_label = if total > 0 {
        format_size(total)
    } else {
        "Unknown".to_string()
    };
    let lines = [
        "Uploading".to_string(),
        format!("{} {:.2}%", bar(percent), percent),
        format!("Speed: {speed}"),
        format!("Processed: {}", format_size(current)),
        format!(
            "Size - ETA: {} - {}",
            total_label,
            format_eta(elapsed, current, total)
        ),
    ];
    tail_capped(lines.join("\n"), TRANSFER_PANEL_CAP)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_typical_ytdlp_line() {
        let line = "[download]  42.7% of ~120.5MiB at 3.2MiB/s ETA 00:35";
        let snap = parse_progress_line(line);
        assert!((snap.percent - 42.7).abs() < f64::EPSILON);
        assert_eq!(snap.total, "120.5MiB");
        assert_eq!(snap.speed, "3.2MiB/s");
        assert_eq!(snap.eta, "00:35");
        assert_eq!(snap.processed, "42.70%");
    }

    #[test]
    fn malformed_line_yields_all_defaults() {
        let snap = parse_progress_line("no progress markers here");
        assert_eq!(snap, ProgressSnapshot::default());
    }

    #[test]
    fn empty_line_yields_all_defaults() {
        assert_eq!(parse_progress_line(""), ProgressSnapshot::default());
    }

    #[test]
    fn percent_without_total_leaves_processed_empty() {
        let snap = parse_progress_line("[download]  10.0% at 1.0MiB/s");
        assert!((snap.percent - 10.0).abs() < f64::EPSILON);
        assert!(snap.total.is_empty());
        assert!(snap.processed.is_empty());
        assert_eq!(snap.speed, "1.0MiB/s");
    }

    #[test]
    fn total_without_percent_leaves_processed_empty() {
        let snap = parse_progress_line("fetching of ~55.1MiB");
        assert_eq!(snap.total, "55.1MiB");
        assert!(snap.processed.is_empty());
    }

    #[test]
    fn integer_percent_is_not_matched() {
        // Pattern requires digits.digits, matching the downloader's format
        let snap = parse_progress_line("[download] 42% of ~1MiB");
        assert_eq!(snap.percent, 0.0);
    }

    #[test]
    fn eta_captures_colon_separated_token() {
        let snap = parse_progress_line("ETA 1:02:33");
        assert_eq!(snap.eta, "1:02:33");
    }

    #[test]
    fn parser_is_total_over_garbage() {
        for line in [
            "%%%%%",
            "of ~",
            "at /s",
            "ETA",
            "\u{0}\u{1}\u{2}",
            "🦀🦀🦀",
            "99999999999999999999.9%",
        ] {
            // must not panic
            let _ = parse_progress_line(line);
        }
    }

    #[test]
    fn bar_is_proportional() {
        assert_eq!(bar(0.0), "░".repeat(18));
        assert_eq!(bar(100.0), "█".repeat(18));
        let half = bar(50.0);
        assert_eq!(half.chars().filter(|c| *c == '█').count(), 9);
    }

    #[test]
    fn bar_clamps_out_of_range_percent() {
        assert_eq!(bar(250.0), "█".repeat(18));
        assert_eq!(bar(-5.0), "░".repeat(18));
    }

    #[test]
    fn panel_contains_labels_and_respects_cap() {
        let snap = parse_progress_line("[download]  42.7% of ~120.5MiB at 3.2MiB/s ETA 00:35");
        let panel = render_progress_panel(&snap);
        assert!(panel.contains("42.70"));
        assert!(panel.contains("3.2MiB/s"));
        assert!(panel.chars().count() <= 900);
    }

    #[test]
    fn panel_cap_keeps_the_tail() {
        let snap = ProgressSnapshot {
            eta: "X".repeat(2000),
            ..Default::default()
        };
        let panel = render_progress_panel(&snap);
        assert_eq!(panel.chars().count(), 900);
        assert!(panel.ends_with('X'));
    }

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1024), "1.00 KiB");
        assert_eq!(format_size(1536), "1.50 KiB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MiB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GiB");
    }

    #[test]
    fn format_eta_unknown_cases() {
        assert_eq!(format_eta(Duration::from_secs(10), 0, 100), "Unknown");
        assert_eq!(format_eta(Duration::from_secs(10), 50, 0), "Unknown");
    }

    #[test]
    fn format_eta_scales_units() {
        // 10 bytes over 10s => 1 B/s; 50 remaining => 50s
        assert_eq!(format_eta(Duration::from_secs(10), 10, 60), "50s");
        // 3700 remaining at 1 B/s => 1h 1m 40s
        assert_eq!(format_eta(Duration::from_secs(100), 100, 3800), "1h 1m 40s");
    }

    #[test]
    fn transfer_panel_reports_percent_and_cap() {
        let panel = render_transfer_panel(50, 100, Duration::from_secs(10));
        assert!(panel.contains("50.00%"));
        assert!(panel.contains("Uploading"));
        assert!(panel.chars().count() <= 800);
    }

    #[test]
    fn transfer_panel_handles_unknown_total() {
        let panel = render_transfer_panel(1024, 0, Duration::from_secs(1));
        assert!(panel.contains("0.00%"));
        assert!(panel.contains("Unknown"));
    }
}

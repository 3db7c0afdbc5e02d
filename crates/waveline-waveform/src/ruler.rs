//! Time ruler marks
//!
//! Produces the `(second, label)` pairs the drawing surface paints under the
//! waveform: one labelled mark every ten seconds plus the final second.

/// Seconds between labelled ruler marks
const LABEL_INTERVAL: u64 = 10;

/// Format seconds as `MM:SS`, or `HH:MM:SS` once an hour is reached
pub fn format_clock(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours == 0 {
        format!("{:02}:{:02}", minutes, seconds)
    } else {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}

/// Labelled ruler marks for a timeline of `duration` seconds
pub fn ruler_marks(duration: f64) -> Vec<(u64, String)> {
    if duration <= 0.0 {
        return Vec::new();
    }

    let total = duration.ceil() as u64;
    (0..=total)
        .filter(|s| s % LABEL_INTERVAL == 0 || *s == total)
        .map(|s| (s, format_clock(s)))
        .collect()
}

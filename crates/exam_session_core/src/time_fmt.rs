//! crates/exam_session_core/src/time_fmt.rs

/// Formats remaining time for the exam header, e.g. `01:59:58`.
#[must_use]
pub fn format_clock(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Formats time taken for the results view, e.g. `1h 45m`, `12m` or `40s`.
#[must_use]
pub fn format_time_taken(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    match (hours, minutes) {
        (0, 0) => format!("{secs}s"),
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

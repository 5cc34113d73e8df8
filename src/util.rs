//! Shared utility functions

/// Shorten a title to at most `max_chars` characters, ending in "..." when
/// cut. Counts characters, not bytes.
pub fn truncate_title(title: &str, max_chars: usize) -> String {
    if title.chars().count() <= max_chars {
        return title.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let truncated: String = title.chars().take(keep).collect();
    format!("{}...", truncated)
}

/// Transfer rate in MB/s, 0 when nothing was measured
pub fn throughput_mb_s(size_mb: f64, secs: f64) -> f64 {
    if secs > 0.0 {
        size_mb / secs
    } else {
        0.0
    }
}

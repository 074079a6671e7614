//! Shared formatting helpers for CLI commands

use chrono::{DateTime, Local};

/// Format a byte count for display ("12.3 MB")
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format the time since `since` as "3日 4時間 5分"
pub fn format_uptime(since: DateTime<Local>, now: DateTime<Local>) -> String {
    let minutes = (now - since).num_minutes().max(0);
    let days = minutes / (24 * 60);
    let hours = (minutes / 60) % 24;
    let minutes = minutes % 60;

    if days > 0 {
        format!("{}日 {}時間 {}分", days, hours, minutes)
    } else if hours > 0 {
        format!("{}時間 {}分", hours, minutes)
    } else {
        format!("{}分", minutes)
    }
}

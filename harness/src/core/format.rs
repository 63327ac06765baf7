//! Deterministic formatting for harness artifacts and commit messages.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::core::types::CycleStatus;

/// Maximum number of characters kept from the agent's final message.
pub const RESULT_PREVIEW_CHARS: usize = 500;

/// ISO-8601 UTC timestamp with second precision (`2026-10-16T08:00:00Z`).
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Whole minutes of wall-clock time, rounded to nearest.
pub fn rounded_minutes(elapsed: Duration) -> u64 {
    (elapsed.as_millis() as u64 + 30_000) / 60_000
}

/// First [`RESULT_PREVIEW_CHARS`] characters of `text` (never splits a char).
pub fn result_preview(text: &str) -> String {
    text.chars().take(RESULT_PREVIEW_CHARS).collect()
}

/// Commit message for the harness bookkeeping commit.
pub fn commit_message(cycle: u32, status: CycleStatus, cost_usd: f64, minutes: u64) -> String {
    let label = if status.is_error() { "FAILED" } else { "OK" };
    format!("Cycle #{cycle} harness report [{label}, ${cost_usd:.4}, {minutes}min]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_drops_subseconds() {
        let at = Utc
            .with_ymd_and_hms(2026, 10, 16, 8, 5, 9)
            .single()
            .expect("valid date");
        assert_eq!(format_timestamp(at), "2026-10-16T08:05:09Z");
    }

    #[test]
    fn minutes_round_to_nearest() {
        assert_eq!(rounded_minutes(Duration::from_secs(0)), 0);
        assert_eq!(rounded_minutes(Duration::from_secs(29)), 0);
        assert_eq!(rounded_minutes(Duration::from_secs(30)), 1);
        assert_eq!(rounded_minutes(Duration::from_secs(150)), 3);
    }

    #[test]
    fn preview_is_bounded_by_chars() {
        let long = "é".repeat(RESULT_PREVIEW_CHARS + 20);
        let preview = result_preview(&long);
        assert_eq!(preview.chars().count(), RESULT_PREVIEW_CHARS);
        assert_eq!(result_preview("short"), "short");
    }

    #[test]
    fn commit_message_includes_status_cost_and_duration() {
        assert_eq!(
            commit_message(12, CycleStatus::Success, 0.42, 7),
            "Cycle #12 harness report [OK, $0.4200, 7min]"
        );
        assert_eq!(
            commit_message(13, CycleStatus::Error, 0.0, 0),
            "Cycle #13 harness report [FAILED, $0.0000, 0min]"
        );
    }
}

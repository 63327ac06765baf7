//! Cycle numbering derived from the historical cycle log.
//!
//! The log is a markdown table appended to by the agent; each cycle row starts
//! with `| <number> |`. Headers, separators and prose are ignored.

use std::sync::LazyLock;

use regex::Regex;

/// Number assigned when there is no usable history.
pub const FIRST_CYCLE: u32 = 1;

static CYCLE_ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\| (\d+)").expect("cycle row regex should be valid"));

/// Return the cycle number following the last well-formed row in `log`.
///
/// The number is the leading digit run of the row's first column, so a row
/// like `| 3* | hotfix |` counts as cycle 3. Falls back to [`FIRST_CYCLE`]
/// when no row matches or the number overflows.
pub fn next_cycle_from_log(log: &str) -> u32 {
    let Some(caps) = log.lines().rev().find_map(|line| CYCLE_ROW_RE.captures(line)) else {
        return FIRST_CYCLE;
    };
    caps[1]
        .parse::<u32>()
        .ok()
        .and_then(|last| last.checked_add(1))
        .unwrap_or(FIRST_CYCLE)
}

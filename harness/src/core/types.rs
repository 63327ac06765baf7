//! Shared deterministic types for harness core logic.
//!
//! These types define stable contracts between the session runner, the report
//! writer and the health tracker. They do not depend on external state or I/O.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Terminal reason reported for one agent session.
///
/// Serialized as the engine's own string (`"success"`, `"error_max_turns"`, ...).
/// Unknown engine subtypes are preserved verbatim in [`SessionSubtype::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SessionSubtype {
    Success,
    /// The engine stopped because the turn cap was reached.
    ErrorMaxTurns,
    /// The engine stopped because the USD budget was exhausted.
    ErrorMaxBudgetUsd,
    /// Any other non-success terminal subtype.
    Other(String),
    /// The stream failed or ended before a terminal event arrived.
    TransportFailure,
}

impl SessionSubtype {
    pub fn as_str(&self) -> &str {
        match self {
            SessionSubtype::Success => "success",
            SessionSubtype::ErrorMaxTurns => "error_max_turns",
            SessionSubtype::ErrorMaxBudgetUsd => "error_max_budget_usd",
            SessionSubtype::Other(raw) => raw,
            SessionSubtype::TransportFailure => "transport_failure",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SessionSubtype::Success)
    }
}

impl From<String> for SessionSubtype {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "success" => SessionSubtype::Success,
            "error_max_turns" => SessionSubtype::ErrorMaxTurns,
            "error_max_budget_usd" => SessionSubtype::ErrorMaxBudgetUsd,
            "transport_failure" => SessionSubtype::TransportFailure,
            _ => SessionSubtype::Other(raw),
        }
    }
}

impl From<SessionSubtype> for String {
    fn from(subtype: SessionSubtype) -> Self {
        subtype.as_str().to_string()
    }
}

/// Overall classification of a cycle, derived solely from the session subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleStatus {
    Success,
    Error,
}

impl CycleStatus {
    pub fn from_subtype(subtype: &SessionSubtype) -> Self {
        if subtype.is_success() {
            CycleStatus::Success
        } else {
            CycleStatus::Error
        }
    }

    pub fn is_error(self) -> bool {
        self == CycleStatus::Error
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CycleStatus::Success => "success",
            CycleStatus::Error => "error",
        }
    }
}

/// Terminal classification of one session run.
///
/// Numeric fields are always populated (zero when the engine reported nothing),
/// so downstream arithmetic never deals with missing values.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    pub subtype: SessionSubtype,
    /// Final agent message; only present on success.
    pub result_text: Option<String>,
    pub cost_usd: f64,
    /// Token accounting as reported by the engine, passed through untouched.
    pub usage: Value,
    pub turns: u32,
    pub api_duration_ms: u64,
    /// Human-readable failure detail for non-success outcomes.
    pub error: Option<String>,
}

impl SessionOutcome {
    /// Outcome used when the engine never produced a terminal event.
    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self {
            subtype: SessionSubtype::TransportFailure,
            result_text: None,
            cost_usd: 0.0,
            usage: Value::Object(Default::default()),
            turns: 0,
            api_duration_ms: 0,
            error: Some(format!("Engine exception: {}", message.into())),
        }
    }

    pub fn status(&self) -> CycleStatus {
        CycleStatus::from_subtype(&self.subtype)
    }
}

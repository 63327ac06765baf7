//! Drive one bounded engine session to a single classified outcome.

use std::io::Write;

use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::core::types::{SessionOutcome, SessionSubtype};
use crate::io::engine::{Engine, EngineEvent, QueryRequest, ResultEvent};

/// Run a session to completion and classify it.
///
/// Always returns exactly one outcome:
/// - the first `result` event decides the classification; later ones are ignored.
/// - a failure to open the session, or a stream that errors or ends before any
///   `result` event, yields [`SessionSubtype::TransportFailure`].
///
/// Each `assistant` event writes a `.` to `progress`.
#[instrument(skip_all, fields(model = %request.model, max_turns = request.max_turns))]
pub async fn run_session<E: Engine, W: Write>(
    engine: &E,
    request: &QueryRequest,
    progress: &mut W,
) -> SessionOutcome {
    let mut stream = match engine.query(request) {
        Ok(stream) => stream,
        Err(err) => {
            error!(err = %format!("{err:#}"), "engine session failed to start");
            return SessionOutcome::transport_failure(format!("{err:#}"));
        }
    };

    let mut outcome: Option<SessionOutcome> = None;
    let mut activity = 0u64;
    while let Some(item) = stream.next().await {
        match item {
            Ok(EngineEvent::Assistant(_)) => {
                activity += 1;
                mark_progress(progress);
            }
            Ok(EngineEvent::Result(result)) => {
                if outcome.is_some() {
                    warn!(subtype = %result.subtype, "ignoring extra terminal event");
                    continue;
                }
                info!(subtype = %result.subtype, "engine reported terminal event");
                outcome = Some(classify_result(result));
            }
            Ok(EngineEvent::Other) => {}
            Err(err) => {
                if outcome.is_some() {
                    warn!(err = %format!("{err:#}"), "engine stream failed after terminal event");
                    break;
                }
                error!(err = %format!("{err:#}"), "engine stream failed");
                return SessionOutcome::transport_failure(format!("{err:#}"));
            }
        }
    }
    debug!(activity, "engine stream drained");

    outcome.unwrap_or_else(|| {
        error!("engine stream ended without a terminal event");
        SessionOutcome::transport_failure("stream ended without a result event")
    })
}

/// Map a terminal event into an outcome, defaulting missing numbers to zero.
pub fn classify_result(result: ResultEvent) -> SessionOutcome {
    let subtype = SessionSubtype::from(result.subtype);
    let (result_text, error) = if subtype.is_success() {
        (result.result, None)
    } else {
        (None, Some(format!("Agent ended with: {}", subtype.as_str())))
    };
    SessionOutcome {
        subtype,
        result_text,
        cost_usd: result.total_cost_usd.unwrap_or(0.0).max(0.0),
        usage: result.usage.unwrap_or_else(|| Value::Object(Default::default())),
        turns: result.num_turns.unwrap_or(0),
        api_duration_ms: result.duration_ms.unwrap_or(0),
        error,
    }
}

fn mark_progress<W: Write>(progress: &mut W) {
    // Progress is cosmetic; a closed stdout must not affect the session.
    if let Err(err) = progress.write_all(b".").and_then(|()| progress.flush()) {
        debug!(err = %err, "failed to write progress marker");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedEngine, assistant, result_event};
    use anyhow::anyhow;
    use std::path::PathBuf;

    fn request() -> QueryRequest {
        QueryRequest {
            workdir: PathBuf::from("."),
            prompt: "prompt".to_string(),
            model: "sonnet".to_string(),
            max_turns: 50,
            max_budget_usd: 2.0,
        }
    }

    #[tokio::test]
    async fn success_keeps_result_text_and_numbers() {
        let engine = ScriptedEngine::new(vec![
            Ok(assistant()),
            Ok(EngineEvent::Other),
            Ok(assistant()),
            Ok(result_event("success", Some("all good"), 0.42, 12)),
        ]);
        let mut progress = Vec::new();
        let outcome = run_session(&engine, &request(), &mut progress).await;

        assert_eq!(outcome.subtype, SessionSubtype::Success);
        assert_eq!(outcome.result_text.as_deref(), Some("all good"));
        assert_eq!(outcome.cost_usd, 0.42);
        assert_eq!(outcome.turns, 12);
        assert_eq!(outcome.error, None);
        assert_eq!(progress, b"..");
    }

    #[tokio::test]
    async fn limit_subtype_keeps_partial_numbers_but_drops_text() {
        let engine = ScriptedEngine::new(vec![
            Ok(assistant()),
            Ok(result_event("error_max_turns", Some("partial"), 1.1, 50)),
        ]);
        let outcome = run_session(&engine, &request(), &mut Vec::new()).await;

        assert_eq!(outcome.subtype, SessionSubtype::ErrorMaxTurns);
        assert_eq!(outcome.result_text, None);
        assert_eq!(outcome.cost_usd, 1.1);
        assert_eq!(outcome.turns, 50);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Agent ended with: error_max_turns")
        );
    }

    #[tokio::test]
    async fn stream_error_before_result_is_transport_failure() {
        let engine = ScriptedEngine::new(vec![
            Ok(assistant()),
            Err(anyhow!("network reset")),
            Ok(result_event("success", Some("never seen"), 0.1, 1)),
        ]);
        let outcome = run_session(&engine, &request(), &mut Vec::new()).await;

        assert_eq!(outcome.subtype, SessionSubtype::TransportFailure);
        assert_eq!(outcome.cost_usd, 0.0);
        assert_eq!(outcome.turns, 0);
        assert!(outcome.error.as_deref().unwrap_or_default().contains("network reset"));
    }

    #[tokio::test]
    async fn empty_stream_is_transport_failure() {
        let engine = ScriptedEngine::new(Vec::new());
        let outcome = run_session(&engine, &request(), &mut Vec::new()).await;
        assert_eq!(outcome.subtype, SessionSubtype::TransportFailure);
    }

    #[tokio::test]
    async fn open_failure_is_transport_failure() {
        let engine = ScriptedEngine::failing_to_open("engine not installed");
        let outcome = run_session(&engine, &request(), &mut Vec::new()).await;
        assert_eq!(outcome.subtype, SessionSubtype::TransportFailure);
        assert!(
            outcome
                .error
                .as_deref()
                .unwrap_or_default()
                .contains("engine not installed")
        );
    }

    #[tokio::test]
    async fn first_terminal_event_wins() {
        let engine = ScriptedEngine::new(vec![
            Ok(result_event("error_max_budget_usd", None, 2.0, 30)),
            Ok(result_event("success", Some("late"), 3.0, 31)),
            Err(anyhow!("exit status 1")),
        ]);
        let outcome = run_session(&engine, &request(), &mut Vec::new()).await;
        assert_eq!(outcome.subtype, SessionSubtype::ErrorMaxBudgetUsd);
        assert_eq!(outcome.cost_usd, 2.0);
    }

    #[cfg(unix)]
    fn fake_engine(dir: &std::path::Path, body: &str) -> crate::io::engine::ClaudeEngine {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("fake-engine.sh");
        std::fs::write(&script, format!("#!/bin/sh\ncat > /dev/null\n{body}"))
            .expect("write script");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
            .expect("chmod");
        crate::io::engine::ClaudeEngine::new(script.display().to_string())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn engine_crash_before_result_is_transport_failure() {
        let temp = tempfile::tempdir().expect("tempdir");
        let engine = fake_engine(
            temp.path(),
            "echo '{\"type\":\"assistant\",\"message\":{}}'\nexit 3\n",
        );
        let request = QueryRequest {
            workdir: temp.path().to_path_buf(),
            ..request()
        };

        let mut progress = Vec::new();
        let outcome = run_session(&engine, &request, &mut progress).await;

        assert_eq!(outcome.subtype, SessionSubtype::TransportFailure);
        assert_eq!(outcome.cost_usd, 0.0);
        assert_eq!(progress, b".");
        let error = outcome.error.unwrap_or_default();
        assert!(error.contains("engine exited with status 3"), "{error}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn engine_nonzero_exit_after_result_keeps_classification() {
        let temp = tempfile::tempdir().expect("tempdir");
        let engine = fake_engine(
            temp.path(),
            "echo '{\"type\":\"result\",\"subtype\":\"error_max_turns\",\"num_turns\":50}'\nexit 1\n",
        );
        let request = QueryRequest {
            workdir: temp.path().to_path_buf(),
            ..request()
        };

        let outcome = run_session(&engine, &request, &mut Vec::new()).await;
        assert_eq!(outcome.subtype, SessionSubtype::ErrorMaxTurns);
        assert_eq!(outcome.turns, 50);
    }

    #[test]
    fn classify_defaults_missing_fields_to_zero() {
        let outcome = classify_result(ResultEvent {
            subtype: "error_during_execution".to_string(),
            ..ResultEvent::default()
        });
        assert_eq!(
            outcome.subtype,
            SessionSubtype::Other("error_during_execution".to_string())
        );
        assert_eq!(outcome.cost_usd, 0.0);
        assert_eq!(outcome.turns, 0);
        assert_eq!(outcome.api_duration_ms, 0);
        assert_eq!(outcome.usage, serde_json::json!({}));
    }
}

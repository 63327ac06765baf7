//! Engine abstraction for agent sessions.
//!
//! The [`Engine`] trait decouples cycle orchestration from the agent backend
//! (currently the `claude` CLI in `stream-json` mode). A session is a lazy,
//! finite, non-restartable stream of [`EngineEvent`]s. Tests use scripted
//! engines that replay predetermined events without spawning processes.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result, anyhow};
use futures::stream::BoxStream;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Permission posture for unattended sessions: no interactive confirmation.
pub const PERMISSION_MODE: &str = "bypassPermissions";
/// Load project-level instructions (e.g. `CLAUDE.md`) into the session.
pub const SETTING_SOURCES: &str = "project";

/// Event stream produced by one engine session.
pub type EventStream = BoxStream<'static, Result<EngineEvent>>;

/// Parameters for one engine session.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// Working directory the agent operates in.
    pub workdir: PathBuf,
    pub prompt: String,
    pub model: String,
    pub max_turns: u32,
    pub max_budget_usd: f64,
}

/// One decoded line of the engine's event stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Agent activity; progress only.
    Assistant(AssistantEvent),
    /// Terminal outcome of the session.
    Result(ResultEvent),
    /// System, user and tool events the harness does not care about.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AssistantEvent {
    #[serde(default)]
    pub message: Value,
}

/// Fields of the terminal `result` event. Everything except `subtype` may be absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResultEvent {
    pub subtype: String,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
    #[serde(default)]
    pub usage: Option<Value>,
    #[serde(default)]
    pub num_turns: Option<u32>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

/// Abstraction over agent engine backends.
pub trait Engine {
    /// Open a session. Errors here mean the session could not be started at all.
    fn query(&self, request: &QueryRequest) -> Result<EventStream>;
}

/// Engine that spawns the `claude` CLI and decodes its `stream-json` stdout.
#[derive(Debug, Clone)]
pub struct ClaudeEngine {
    command: String,
}

impl ClaudeEngine {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Engine for ClaudeEngine {
    #[instrument(skip_all, fields(model = %request.model, max_turns = request.max_turns))]
    fn query(&self, request: &QueryRequest) -> Result<EventStream> {
        info!(workdir = %request.workdir.display(), command = %self.command, "starting engine session");

        let mut child = Command::new(&self.command)
            .args(build_args(request))
            .current_dir(&request.workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            // Engine diagnostics go straight to the harness log.
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawn {}", self.command))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout was not piped"))?;
        let prompt = request.prompt.clone();

        let stream = async_stream::try_stream! {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .context("write prompt to engine stdin")?;
            drop(stdin);

            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await.context("read engine stdout")? {
                if let Some(event) = parse_event_line(&line) {
                    yield event;
                }
            }

            let status = child.wait().await.context("wait for engine")?;
            if !status.success() {
                warn!(exit_code = ?status.code(), "engine exited unsuccessfully");
                let reason = match status.code() {
                    Some(code) => format!("status {code}"),
                    None => "no status (killed by signal)".to_string(),
                };
                Err::<(), _>(anyhow!("engine exited with {reason}"))?;
            }
            debug!("engine stream finished");
        };
        Ok(Box::pin(stream))
    }
}

/// CLI arguments for a session; the prompt itself is written to stdin.
pub fn build_args(request: &QueryRequest) -> Vec<String> {
    vec![
        "--print".to_string(),
        "--output-format".to_string(),
        "stream-json".to_string(),
        // stream-json requires verbose mode in print mode.
        "--verbose".to_string(),
        "--model".to_string(),
        request.model.clone(),
        "--max-turns".to_string(),
        request.max_turns.to_string(),
        "--max-budget-usd".to_string(),
        request.max_budget_usd.to_string(),
        "--permission-mode".to_string(),
        PERMISSION_MODE.to_string(),
        "--setting-sources".to_string(),
        SETTING_SOURCES.to_string(),
    ]
}

/// Decode one stdout line. Blank and unparseable lines yield `None`.
pub fn parse_event_line(line: &str) -> Option<EngineEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<EngineEvent>(trimmed) {
        Ok(event) => Some(event),
        Err(err) => {
            debug!(line = trimmed, err = %err, "ignoring unparseable engine line");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn request(workdir: PathBuf) -> QueryRequest {
        QueryRequest {
            workdir,
            prompt: "do the thing".to_string(),
            model: "sonnet".to_string(),
            max_turns: 50,
            max_budget_usd: 2.0,
        }
    }

    #[test]
    fn parses_assistant_event() {
        let event = parse_event_line(
            r#"{"type":"assistant","message":{"content":[{"type":"text","text":"hi"}]}}"#,
        )
        .expect("event");
        assert!(matches!(event, EngineEvent::Assistant(_)));
    }

    #[test]
    fn parses_success_result() {
        let line = r#"{"type":"result","subtype":"success","is_error":false,"result":"done","total_cost_usd":0.42,"usage":{"input_tokens":5},"num_turns":12,"duration_ms":9000,"session_id":"abc"}"#;
        let Some(EngineEvent::Result(result)) = parse_event_line(line) else {
            panic!("expected result event");
        };
        assert_eq!(result.subtype, "success");
        assert_eq!(result.result.as_deref(), Some("done"));
        assert_eq!(result.total_cost_usd, Some(0.42));
        assert_eq!(result.num_turns, Some(12));
        assert_eq!(result.duration_ms, Some(9000));
        assert_eq!(result.usage, Some(serde_json::json!({"input_tokens": 5})));
    }

    #[test]
    fn parses_limit_result_with_missing_fields() {
        let line = r#"{"type":"result","subtype":"error_max_turns","num_turns":50}"#;
        let Some(EngineEvent::Result(result)) = parse_event_line(line) else {
            panic!("expected result event");
        };
        assert_eq!(result.subtype, "error_max_turns");
        assert_eq!(result.total_cost_usd, None);
        assert_eq!(result.result, None);
    }

    #[test]
    fn unknown_event_types_are_other() {
        let event = parse_event_line(r#"{"type":"system","subtype":"init","tools":[]}"#);
        assert_eq!(event, Some(EngineEvent::Other));
    }

    #[test]
    fn garbage_and_blank_lines_are_skipped() {
        assert_eq!(parse_event_line(""), None);
        assert_eq!(parse_event_line("   "), None);
        assert_eq!(parse_event_line("not json"), None);
        assert_eq!(parse_event_line(r#"{"no_type":true}"#), None);
    }

    #[test]
    fn args_carry_limits_and_posture() {
        let args = build_args(&request(PathBuf::from(".")));
        let joined = args.join(" ");
        assert!(joined.contains("--model sonnet"));
        assert!(joined.contains("--max-turns 50"));
        assert!(joined.contains("--max-budget-usd 2"));
        assert!(joined.contains("--permission-mode bypassPermissions"));
        assert!(joined.contains("--setting-sources project"));
        assert!(joined.contains("--output-format stream-json"));
    }

    #[tokio::test]
    async fn missing_binary_fails_to_open() {
        let temp = tempfile::tempdir().expect("tempdir");
        let engine = ClaudeEngine::new(temp.path().join("no-such-engine").display().to_string());
        assert!(engine.query(&request(temp.path().to_path_buf())).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn streams_events_from_child_stdout() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let script = temp.path().join("fake-engine.sh");
        std::fs::write(
            &script,
            concat!(
                "#!/bin/sh\n",
                "cat > /dev/null\n",
                "echo '{\"type\":\"system\",\"subtype\":\"init\"}'\n",
                "echo 'noise'\n",
                "echo '{\"type\":\"assistant\",\"message\":{}}'\n",
                "echo '{\"type\":\"result\",\"subtype\":\"success\",\"result\":\"ok\"}'\n",
            ),
        )
        .expect("write script");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
            .expect("chmod");

        let engine = ClaudeEngine::new(script.display().to_string());
        let stream = engine
            .query(&request(temp.path().to_path_buf()))
            .expect("open session");
        let events: Vec<EngineEvent> = stream
            .map(|item| item.expect("event"))
            .collect()
            .await;

        assert_eq!(events.len(), 3);
        assert_eq!(events[0], EngineEvent::Other);
        assert!(matches!(events[1], EngineEvent::Assistant(_)));
        assert!(matches!(&events[2], EngineEvent::Result(r) if r.subtype == "success"));
    }
}

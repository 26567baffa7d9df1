//! Research worker bridge
//! Drives an external research worker process over JSON lines on stdin/stdout.
//! One worker per research run; the process is killed when the session is dropped.

use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio_util::sync::CancellationToken;

use crate::clients::traits::{PipelineError, ResearchPipeline, ResearchSession};
use crate::config::{BridgeConfig, Credentials, OPENAI_KEY_VAR, TAVILY_KEY_VAR};

#[derive(Debug, Clone)]
pub struct BridgePipeline {
    config: BridgeConfig,
}

impl BridgePipeline {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ResearchPipeline for BridgePipeline {
    async fn open(
        &self,
        query: &str,
        report_type: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn ResearchSession>, PipelineError> {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .kill_on_drop(true)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        // Keys go through the environment, never argv
        if let Some(key) = &credentials.openai_api_key {
            cmd.env(OPENAI_KEY_VAR, key);
        }
        if let Some(key) = &credentials.tavily_api_key {
            cmd.env(TAVILY_KEY_VAR, key);
        }

        let mut child = cmd.spawn().map_err(map_spawn_err)?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PipelineError::Spawn("worker stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PipelineError::Spawn("worker stdout unavailable".into()))?;

        tracing::debug!(
            command = %self.config.command,
            pid = ?child.id(),
            "Research worker spawned"
        );

        let mut session = BridgeSession {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            next_id: 0,
        };
        session
            .call(
                "init",
                json!({
                    "query": query,
                    "report_type": report_type,
                    "verbose": self.config.verbose,
                }),
                None,
            )
            .await?;

        Ok(Box::new(session))
    }
}

#[derive(Debug, Deserialize)]
struct BridgeReply {
    id: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

pub struct BridgeSession {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
}

impl BridgeSession {
    async fn call(
        &mut self,
        method: &str,
        params: Value,
        cancel: Option<&CancellationToken>,
    ) -> Result<Value, PipelineError> {
        self.next_id += 1;
        let id = self.next_id;

        let mut line = serde_json::to_string(&json!({
            "id": id,
            "method": method,
            "params": params,
        }))?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        tracing::debug!(method, "Cancelling research worker");
                        let _ = self.child.start_kill();
                        Err(PipelineError::Cancelled)
                    }
                    reply = read_reply(&mut self.stdout, id) => reply,
                }
            }
            None => read_reply(&mut self.stdout, id).await,
        }
    }
}

async fn read_reply(stdout: &mut BufReader<ChildStdout>, id: u64) -> Result<Value, PipelineError> {
    // Raw bytes: worker chatter is not guaranteed to be UTF-8
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if stdout.read_until(b'\n', &mut buf).await? == 0 {
            return Err(PipelineError::Closed);
        }
        let trimmed = buf.trim_ascii();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_slice::<BridgeReply>(trimmed) {
            Ok(reply) if reply.id == Some(id) => {
                return match reply.error {
                    Some(message) => Err(PipelineError::Remote(message)),
                    None => Ok(reply.result.unwrap_or(Value::Null)),
                };
            }
            Ok(reply) => {
                tracing::debug!(expected = id, got = ?reply.id, "Skipping unrelated worker reply");
            }
            Err(_) => {
                // Worker chatter (progress output, logs)
                tracing::debug!("worker: {}", String::from_utf8_lossy(trimmed));
            }
        }
    }
}

fn expect_list(method: &str, value: Value) -> Result<Vec<Value>, PipelineError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Err(PipelineError::Protocol(format!(
            "{method} returned {} instead of a list",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl ResearchSession for BridgeSession {
    async fn conduct_research(&mut self, cancel: CancellationToken) -> Result<(), PipelineError> {
        self.call("conduct_research", Value::Null, Some(&cancel))
            .await
            .map(|_| ())
    }

    async fn write_report(&mut self, cancel: CancellationToken) -> Result<String, PipelineError> {
        match self.call("write_report", Value::Null, Some(&cancel)).await? {
            Value::String(report) => Ok(report),
            other => Err(PipelineError::Protocol(format!(
                "write_report returned {} instead of text",
                json_kind(&other)
            ))),
        }
    }

    async fn source_urls(&mut self) -> Result<Vec<Value>, PipelineError> {
        let value = self.call("get_source_urls", Value::Null, None).await?;
        expect_list("get_source_urls", value)
    }

    async fn costs(&mut self) -> Result<Value, PipelineError> {
        self.call("get_costs", Value::Null, None).await
    }

    async fn research_sources(&mut self) -> Result<Vec<Value>, PipelineError> {
        let value = self.call("get_research_sources", Value::Null, None).await?;
        expect_list("get_research_sources", value)
    }
}

fn map_spawn_err(err: std::io::Error) -> PipelineError {
    if err.kind() == std::io::ErrorKind::NotFound {
        PipelineError::NotFound
    } else {
        PipelineError::Spawn(err.to_string())
    }
}

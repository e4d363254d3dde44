//! Child-process transport: newline-delimited JSON over the child's
//! stdin/stdout. Fully bidirectional; server-initiated requests travel the
//! same pipe. Standard error is drained to the host logger and carries no
//! protocol.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use conduit_mcp_core::{JsonRpcMessage, McpError, McpResult};

use crate::session::Session;
use crate::{run_handshake, wire_notify, wire_request, Transport, TransportKind, TransportOptions, Wire};

pub struct StdioTransport {
    command: Vec<String>,
    env: HashMap<String, String>,
    options: TransportOptions,
    session: Arc<Session>,
    state: tokio::sync::Mutex<Option<StdioState>>,
}

struct StdioState {
    child: Child,
    tasks: Vec<JoinHandle<()>>,
}

impl StdioTransport {
    pub fn new(
        command: Vec<String>,
        env: HashMap<String, String>,
        options: TransportOptions,
    ) -> McpResult<Self> {
        if command.is_empty() {
            return Err(McpError::connection("stdio transport needs a command"));
        }
        let session = Session::new(options.read_timeout);
        Ok(Self {
            command,
            env,
            options,
            session,
            state: tokio::sync::Mutex::new(None),
        })
    }

    fn spawn_child(&self) -> McpResult<Child> {
        let mut cmd = Command::new(&self.command[0]);
        cmd.args(&self.command[1..])
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd.spawn().map_err(|e| {
            McpError::connection(format!("failed to spawn '{}': {e}", self.command[0]))
        })
    }
}

#[async_trait]
impl Wire for StdioTransport {
    async fn deliver(&self, message: JsonRpcMessage) -> McpResult<()> {
        self.session.queue_outbound(message)
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn connect(&self) -> McpResult<()> {
        {
            let mut guard = self.state.lock().await;
            if guard.is_some() {
                return Ok(());
            }

            let mut child = self.spawn_child()?;
            let stdin = child
                .stdin
                .take()
                .ok_or_else(|| McpError::connection("failed to capture child stdin"))?;
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| McpError::connection("failed to capture child stdout"))?;
            let stderr = child
                .stderr
                .take()
                .ok_or_else(|| McpError::connection("failed to capture child stderr"))?;

            self.session.reset_liveness();
            let mut outbound = self.session.attach_outbound();
            let mut tasks = Vec::new();

            // Writer: drain the session's outbound queue onto the child's
            // stdin, one JSON message per line, flushed immediately.
            tasks.push(tokio::spawn(async move {
                let mut stdin = stdin;
                while let Some(message) = outbound.recv().await {
                    let line = match message.to_value().map(|v| v.to_string()) {
                        Ok(line) => line,
                        Err(err) => {
                            error!(error = %err, "failed to encode outbound message");
                            continue;
                        }
                    };
                    if stdin.write_all(line.as_bytes()).await.is_err()
                        || stdin.write_all(b"\n").await.is_err()
                        || stdin.flush().await.is_err()
                    {
                        error!("failed to write to child stdin");
                        break;
                    }
                }
                // Dropping stdin here closes the pipe: the child's cue to
                // exit on cleanup.
            }));

            // Reader: one complete JSON-RPC message per stdout line.
            let session = Arc::clone(&self.session);
            tasks.push(tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => {
                            let line = line.trim();
                            if line.is_empty() {
                                continue;
                            }
                            match serde_json::from_str::<Value>(line) {
                                Ok(value) => {
                                    if let Err(err) = session.dispatch(value) {
                                        warn!(error = %err, "failed to dispatch stdio message");
                                    }
                                }
                                Err(err) => {
                                    warn!(error = %err, "non-JSON line on child stdout");
                                }
                            }
                        }
                        Ok(None) => {
                            debug!("child stdout closed");
                            session.fail_all_pending("server closed stdio");
                            break;
                        }
                        Err(err) => {
                            warn!(error = %err, "error reading child stdout");
                            session.fail_all_pending("stdio read error");
                            break;
                        }
                    }
                }
            }));

            // Stderr carries no protocol; surface it for debugging.
            tasks.push(tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "mcp_stdio_stderr", "{line}");
                }
            }));

            *guard = Some(StdioState { child, tasks });
        }

        if let Err(err) = run_handshake(&self.session, &self.options, self).await {
            let _ = self.cleanup().await;
            return Err(err);
        }
        Ok(())
    }

    async fn request(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        wire_request(&self.session, self, method, params).await
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        wire_notify(&self.session, self, method, params).await
    }

    async fn cleanup(&self) -> McpResult<()> {
        let mut guard = self.state.lock().await;
        if let Some(mut state) = guard.take() {
            // Closing stdin is the graceful terminate; the hard kill only
            // lands if the child ignores it for a second.
            self.session.detach_outbound();
            match tokio::time::timeout(Duration::from_secs(1), state.child.wait()).await {
                Ok(Ok(status)) => debug!(?status, "child exited"),
                Ok(Err(err)) => warn!(error = %err, "error waiting for child"),
                Err(_) => {
                    warn!("child did not exit within 1s, killing");
                    let _ = state.child.start_kill();
                    let _ = state.child.wait().await;
                }
            }
            for task in state.tasks {
                task.abort();
            }
        }
        self.session.fail_all_pending("transport closed");
        Ok(())
    }

    fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Stdio
    }

    fn describe(&self) -> String {
        self.command.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_command() {
        let err = StdioTransport::new(Vec::new(), HashMap::new(), TransportOptions::default());
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn cleanup_before_connect_is_a_no_op() {
        let transport = StdioTransport::new(
            vec!["true".to_string()],
            HashMap::new(),
            TransportOptions::default(),
        )
        .unwrap();
        transport.cleanup().await.unwrap();
        transport.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn uninitialized_request_is_gated() {
        let transport = StdioTransport::new(
            vec!["true".to_string()],
            HashMap::new(),
            TransportOptions::default(),
        )
        .unwrap();
        let err = transport.request("tools/list", None).await.unwrap_err();
        assert!(matches!(err, McpError::ConnectionError(_)));
    }
}

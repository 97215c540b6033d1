/// Stdio connector for MCP - newline-delimited JSON-RPC over a child process
use super::base::Connector;
use crate::protocol::{
    IncomingMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, MessageKind, RequestId,
};
use crate::error::{Error, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long a server gets to exit after its stdin is closed before it is killed
const SHUTDOWN_GRACE_SECS: u64 = 5;

type PendingMap = Arc<Mutex<HashMap<RequestId, oneshot::Sender<std::result::Result<JsonRpcResponse, String>>>>>;
type SharedStdin = Arc<Mutex<Option<ChildStdin>>>;

/// Stdio-based MCP connector for spawning and communicating with processes
pub struct StdioConnector {
    command: String,
    args: Vec<String>,
    env_vars: HashMap<String, String>,
    timeout_secs: Option<u64>,
    child: Option<Child>,
    stdin: SharedStdin,
    pending: PendingMap,
    reader: Option<JoinHandle<()>>,
    connected: Arc<AtomicBool>,
}

impl StdioConnector {
    /// Create a new stdio connector
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env_vars: HashMap::new(),
            timeout_secs: None,
            child: None,
            stdin: Arc::new(Mutex::new(None)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            reader: None,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set environment variables to pass to the subprocess
    pub fn set_env(&mut self, env_vars: HashMap<String, String>) {
        self.env_vars = env_vars;
    }

    /// Fail requests that get no answer within `secs`
    pub fn with_timeout(mut self, secs: Option<u64>) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Process id of the running server, if any
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.id())
    }

    async fn write_line(stdin: &SharedStdin, line: &str) -> Result<()> {
        let mut guard = stdin.lock().await;
        let stdin = guard
            .as_mut()
            .ok_or_else(|| Error::ConnectionError("stdin closed".to_string()))?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn fail_pending(pending: &PendingMap, reason: &str) {
        let mut map = pending.lock().await;
        for (_, tx) in map.drain() {
            let _ = tx.send(Err(reason.to_string()));
        }
    }

    /// Route every line the server prints to whoever is waiting for it
    async fn reader_task(
        stdout: ChildStdout,
        stdin: SharedStdin,
        pending: PendingMap,
        connected: Arc<AtomicBool>,
    ) {
        let mut lines = BufReader::new(stdout).lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) if !line.trim().is_empty() => {
                    debug!("MCP <- {}", line.chars().take(200).collect::<String>());
                    let message: IncomingMessage = match serde_json::from_str(&line) {
                        Ok(message) => message,
                        Err(e) => {
                            warn!("MCP: ignoring unparseable line: {}", e);
                            continue;
                        }
                    };

                    match message.kind() {
                        MessageKind::Response(id) => {
                            let waiter = pending.lock().await.remove(&id);
                            match waiter {
                                Some(tx) => {
                                    let _ = tx.send(Ok(message.into_response(id)));
                                }
                                None => debug!(id = %id, "MCP: response with no waiter"),
                            }
                        }
                        MessageKind::Notification(method) => {
                            debug!(method = %method, "MCP: notification");
                        }
                        MessageKind::Request(id, method) => {
                            let reply = server_request_reply(id, &method);
                            if let Err(e) = Self::write_line(&stdin, &reply.to_string()).await {
                                warn!(method = %method, "MCP: failed to answer server request: {}", e);
                            }
                        }
                        MessageKind::Invalid => warn!("MCP: message with neither id nor method"),
                    }
                }
                Ok(Some(_)) => {}
                Ok(None) => {
                    debug!("MCP: server closed stdout");
                    break;
                }
                Err(e) => {
                    warn!("MCP: read error: {}", e);
                    break;
                }
            }
        }

        connected.store(false, Ordering::SeqCst);
        Self::fail_pending(&pending, "MCP server closed its output").await;
    }
}

/// Answer to a request the server sends to us; only `ping` is supported
fn server_request_reply(id: Value, method: &str) -> Value {
    if method == "ping" {
        json!({"jsonrpc": "2.0", "id": id, "result": {}})
    } else {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": -32601, "message": format!("Method not found: {}", method)}
        })
    }
}

#[async_trait::async_trait]
impl Connector for StdioConnector {
    async fn send_request(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        if !self.is_connected() {
            return Err(Error::ConnectionError("Not connected".to_string()));
        }

        let id = request.id.clone();
        let line = serde_json::to_string(&request)?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        // The reader may have drained the map just before the insert.
        if !self.is_connected() {
            self.pending.lock().await.remove(&id);
            return Err(Error::ConnectionError("MCP server closed its output".to_string()));
        }

        debug!(id = %id, method = %request.method, "MCP -> request");
        if let Err(e) = Self::write_line(&self.stdin, &line).await {
            self.pending.lock().await.remove(&id);
            return Err(Error::ConnectionError(format!("write failed: {}", e)));
        }

        let outcome = match self.timeout_secs {
            Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.pending.lock().await.remove(&id);
                    return Err(Error::Timeout(secs));
                }
            },
            None => rx.await,
        };

        outcome
            .map_err(|_| Error::ConnectionError("response channel dropped".to_string()))?
            .map_err(Error::ConnectionError)
    }

    async fn send_notification(&self, notification: JsonRpcNotification) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::ConnectionError("Not connected".to_string()));
        }
        let line = serde_json::to_string(&notification)?;
        debug!(method = %notification.method, "MCP -> notification");
        Self::write_line(&self.stdin, &line).await
    }

    async fn connect(&mut self) -> Result<()> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| {
            Error::ConnectionError(format!("Failed to spawn '{}': {}", self.command, e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::ConnectionError("No stdin available".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::ConnectionError("No stdout available".to_string()))?;

        *self.stdin.lock().await = Some(stdin);
        self.connected.store(true, Ordering::SeqCst);
        self.reader = Some(tokio::spawn(Self::reader_task(
            stdout,
            self.stdin.clone(),
            self.pending.clone(),
            self.connected.clone(),
        )));
        debug!(command = %self.command, pid = ?child.id(), "MCP server spawned");
        self.child = Some(child);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        // Dropping stdin signals EOF; well-behaved servers exit on their own.
        self.stdin.lock().await.take();

        let outcome = match self.child.take() {
            Some(mut child) => {
                match tokio::time::timeout(Duration::from_secs(SHUTDOWN_GRACE_SECS), child.wait())
                    .await
                {
                    Ok(Ok(status)) => {
                        debug!(%status, "MCP server exited");
                        Ok(())
                    }
                    Ok(Err(e)) => Err(Error::ConnectionError(format!("wait failed: {}", e))),
                    Err(_) => {
                        warn!("MCP server did not exit after stdin closed, killing it");
                        child
                            .kill()
                            .await
                            .map_err(|e| Error::ConnectionError(format!("kill failed: {}", e)))
                    }
                }
            }
            None => Ok(()),
        };

        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        Self::fail_pending(&self.pending, "connection closed").await;
        outcome
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

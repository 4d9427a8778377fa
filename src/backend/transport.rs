use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::types::JSONRPC_VERSION;
use crate::error::{Mcp2AiError, Result};

const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Message-oriented request/response channel to a tool backend.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value>;
    async fn notify(&self, method: &str, params: Value) -> Result<()>;
    async fn close(&self) -> Result<()>;
}

/// How to launch a backend process.
#[derive(Debug, Clone, Default)]
pub struct ServerCommand {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub inherit_stderr: bool,
}

impl ServerCommand {
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

type Writer = Box<dyn AsyncWrite + Send + Unpin>;
type PendingMap = Arc<StdMutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

fn lock(pending: &PendingMap) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<Result<Value>>>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Removes a request's slot when its caller stops waiting, whether it got
/// an answer, timed out or was cancelled.
struct PendingGuard<'a> {
    pending: &'a PendingMap,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(&self.id);
    }
}

/// JSON-RPC over newline-delimited streams, normally a child process's
/// stdin/stdout. Responses are matched to requests by id, so concurrent
/// requests are independent of each other.
pub struct StdioTransport {
    writer: Mutex<Option<Writer>>,
    child: Mutex<Option<Child>>,
    pending: PendingMap,
    next_id: AtomicU64,
    reader: StdMutex<Option<JoinHandle<()>>>,
    shutdown_grace: Duration,
}

impl StdioTransport {
    pub fn spawn(server: &ServerCommand) -> Result<Self> {
        let mut cmd = Command::new(&server.command);
        cmd.args(&server.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(if server.inherit_stderr {
                Stdio::inherit()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        if let Some(cwd) = &server.cwd {
            cmd.current_dir(cwd);
        }

        // Values are never logged; they commonly carry API keys.
        for (key, value) in &server.env {
            debug!("Setting backend env var: {} (value hidden)", key);
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| {
            Mcp2AiError::BackendUnavailable(format!(
                "failed to start '{}': {}",
                server.display(),
                e
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Mcp2AiError::BackendUnavailable("backend stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Mcp2AiError::BackendUnavailable("backend stdout not captured".into()))?;

        Ok(Self::build(stdout, stdin, Some(child)))
    }

    /// Build a transport over arbitrary streams. Must be called inside a
    /// Tokio runtime; the response reader runs as a background task.
    pub fn from_streams<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::build(reader, writer, None)
    }

    fn build<R, W>(reader: R, writer: W, child: Option<Child>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let pending: PendingMap = Arc::new(StdMutex::new(HashMap::new()));
        let handle = tokio::spawn(read_responses(reader, pending.clone()));

        Self {
            writer: Mutex::new(Some(Box::new(writer))),
            child: Mutex::new(child),
            pending,
            next_id: AtomicU64::new(1),
            reader: StdMutex::new(Some(handle)),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.pending).len()
    }

    async fn write_message(&self, message: &Value) -> Result<()> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');

        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| Mcp2AiError::BackendUnavailable("connection is closed".into()))?;

        writer.write_all(line.as_bytes()).await.map_err(|e| {
            Mcp2AiError::BackendUnavailable(format!("failed to write to backend: {}", e))
        })?;
        writer.flush().await.map_err(|e| {
            Mcp2AiError::BackendUnavailable(format!("failed to flush backend input: {}", e))
        })?;
        Ok(())
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        let request = json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(id, method, "sending backend request");
        self.write_message(&request).await?;

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(Mcp2AiError::BackendUnavailable(
                "backend closed the connection".into(),
            )),
        }
    }

    async fn notify(&self, method: &str, params: Value) -> Result<()> {
        let notification = json!({
            "jsonrpc": JSONRPC_VERSION,
            "method": method,
            "params": params,
        });

        debug!(method, "sending backend notification");
        self.write_message(&notification).await
    }

    async fn close(&self) -> Result<()> {
        // Closing stdin is the shutdown signal for a stdio server.
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }

        let child = self.child.lock().await.take();
        if let Some(mut child) = child {
            match timeout(self.shutdown_grace, child.wait()).await {
                Ok(Ok(status)) => debug!(%status, "backend exited"),
                Ok(Err(e)) => warn!("failed waiting for backend to exit: {}", e),
                Err(_) => {
                    warn!(
                        "backend did not exit within {:?}; killing it",
                        self.shutdown_grace
                    );
                    child.kill().await?;
                }
            }
        }

        let reader = self
            .reader
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = reader {
            handle.abort();
        }

        Ok(())
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        let reader = self
            .reader
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = reader {
            handle.abort();
        }
    }
}

async fn read_responses<R>(reader: R, pending: PendingMap)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                debug!("backend closed its output stream");
                break;
            }
            Ok(_) => match std::str::from_utf8(&buf) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        dispatch_line(line, &pending);
                    }
                }
                Err(e) => warn!("skipping backend line that is not valid UTF-8: {}", e),
            },
            Err(e) => {
                warn!("failed reading from backend: {}", e);
                break;
            }
        }
    }

    for (_, sender) in lock(&pending).drain() {
        let _ = sender.send(Err(Mcp2AiError::BackendUnavailable(
            "backend closed the connection".into(),
        )));
    }
}

fn dispatch_line(line: &str, pending: &PendingMap) {
    let message: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            debug!("ignoring non-JSON line from backend: {}", e);
            return;
        }
    };

    if message.get("method").is_some() {
        debug!(method = ?message.get("method"), "ignoring backend-initiated message");
        return;
    }

    let Some(id) = message.get("id").and_then(Value::as_u64) else {
        debug!("ignoring backend message without a numeric id");
        return;
    };

    let outcome = match message.get("error") {
        Some(error) => Err(Mcp2AiError::Protocol(format!("MCP error: {}", error))),
        None => Ok(message.get("result").cloned().unwrap_or(Value::Null)),
    };

    let sender = lock(pending).remove(&id);
    match sender {
        Some(sender) => {
            let _ = sender.send(outcome);
        }
        None => debug!(id, "response for an abandoned request"),
    }
}

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{debug, error, warn};

use crate::errors::{OffstageError, Result};
use crate::messages::{WireEvent, WireMessage};
use crate::synth::DispatchProtocol;

/// A synthesized script in loadable form: the on-disk path when persisted,
/// plus the full text for spawners that load from memory.
#[derive(Debug, Clone)]
pub struct LoadableScript {
    pub path: Option<PathBuf>,
    pub text: String,
}

/// The endpoints of one live execution context: a sender for outbound frames,
/// a receiver for inbound events, and the handle that terminates it.
pub struct SpawnedContext {
    pub outbound: mpsc::Sender<WireMessage>,
    pub inbound: mpsc::Receiver<WireEvent>,
    pub handle: ContextHandle,
}

/// Terminates the underlying context. Idempotent; termination runs once.
pub struct ContextHandle {
    terminator: Option<Box<dyn FnOnce() + Send>>,
}

impl ContextHandle {
    pub fn new(terminator: impl FnOnce() + Send + 'static) -> Self {
        Self {
            terminator: Some(Box::new(terminator)),
        }
    }

    pub fn terminate(&mut self) {
        if let Some(terminate) = self.terminator.take() {
            terminate();
        }
    }
}

/// Constructor for isolated execution contexts. The runtime treats this as an
/// available service: implementations decide what "isolated" means, from an
/// external runtime process down to a plain task for tests.
#[async_trait]
pub trait ContextSpawner: Send + Sync {
    async fn spawn(&self, script: &LoadableScript) -> Result<SpawnedContext>;

    /// The transport the spawned context's script must speak. The runtime
    /// hands this to the synthesizer, so the dispatch entry point always
    /// matches the spawner driving it.
    fn dispatch_protocol(&self) -> DispatchProtocol {
        DispatchProtocol::WorkerMessage
    }
}

/// Runs a handler on a dedicated in-process task.
///
/// No memory isolation; the script is ignored and the supplied closure plays
/// the handler's role. Used by tests and by embedders that already hold the
/// handler natively but want the same channel discipline.
pub struct InProcessSpawner {
    handler: Arc<dyn Fn(Value) -> std::result::Result<Value, String> + Send + Sync>,
}

impl InProcessSpawner {
    pub fn new(
        handler: impl Fn(Value) -> std::result::Result<Value, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }
}

#[async_trait]
impl ContextSpawner for InProcessSpawner {
    async fn spawn(&self, _script: &LoadableScript) -> Result<SpawnedContext> {
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<WireMessage>(32);
        let (inbound_tx, inbound_rx) = mpsc::channel::<WireEvent>(32);

        let handler = self.handler.clone();
        let worker = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let (correlation_id, payload) = message.into_parts();
                let event = match handler(payload) {
                    Ok(result) => WireEvent::Message(WireMessage::new(correlation_id, result)),
                    Err(message) => WireEvent::Error {
                        correlation_id: Some(correlation_id),
                        message,
                    },
                };
                if inbound_tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        let handle = ContextHandle::new(move || worker.abort());
        Ok(SpawnedContext {
            outbound: outbound_tx,
            inbound: inbound_rx,
            handle,
        })
    }
}

/// Launches an external runtime on a persisted script and bridges frames as
/// JSON lines: requests on stdin, replies on stdout, stderr lines surfaced as
/// uncorrelated error events. Scripts for this transport carry the
/// `StdioLines` dispatch tail.
pub struct ProcessSpawner {
    program: String,
    args: Vec<String>,
}

impl ProcessSpawner {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl ContextSpawner for ProcessSpawner {
    async fn spawn(&self, script: &LoadableScript) -> Result<SpawnedContext> {
        let path = script.path.as_ref().ok_or_else(|| {
            OffstageError::WorkerRuntime("process contexts require a persisted script".to_string())
        })?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                OffstageError::WorkerRuntime(format!("failed to launch {}: {}", self.program, e))
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            OffstageError::WorkerRuntime("worker process has no stdin".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            OffstageError::WorkerRuntime("worker process has no stdout".to_string())
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            OffstageError::WorkerRuntime("worker process has no stderr".to_string())
        })?;
        debug!("launched worker process {} {}", self.program, path.display());

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<WireMessage>(32);
        let (inbound_tx, inbound_rx) = mpsc::channel::<WireEvent>(32);

        let writer = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let line = match serde_json::to_string(&message) {
                    Ok(line) => line,
                    Err(e) => {
                        error!("unserializable outbound frame: {}", e);
                        continue;
                    }
                };
                if stdin.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
                if stdin.write_all(b"\n").await.is_err() {
                    break;
                }
            }
        });

        let reply_tx = inbound_tx.clone();
        let stdout_reader = tokio::spawn(async move {
            let mut lines = FramedRead::new(stdout, LinesCodec::new());
            while let Some(line) = lines.next().await {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("worker stdout framing error: {}", e);
                        break;
                    }
                };
                match serde_json::from_str::<WireMessage>(&line) {
                    Ok(message) => {
                        if reply_tx.send(WireEvent::Message(message)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("discarding unparseable worker line: {}", e),
                }
            }
        });

        let stderr_reader = tokio::spawn(async move {
            let mut lines = FramedRead::new(stderr, LinesCodec::new());
            while let Some(Ok(line)) = lines.next().await {
                let event = WireEvent::Error {
                    correlation_id: None,
                    message: line,
                };
                if inbound_tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        let handle = ContextHandle::new(move || {
            writer.abort();
            stdout_reader.abort();
            stderr_reader.abort();
            if let Err(e) = child.start_kill() {
                debug!("worker process already gone: {}", e);
            }
        });

        Ok(SpawnedContext {
            outbound: outbound_tx,
            inbound: inbound_rx,
            handle,
        })
    }

    fn dispatch_protocol(&self) -> DispatchProtocol {
        DispatchProtocol::StdioLines
    }
}

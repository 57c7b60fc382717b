use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::{OffstageError, Result};
use crate::id::CorrelationId;
use crate::messages::{WireEvent, WireMessage};

type PendingMap = Arc<Mutex<HashMap<CorrelationId, oneshot::Sender<Result<Value>>>>>;

/// Correlation layer over one worker's message channel.
///
/// Every outbound frame carries a fresh correlation id; a dedicated receive
/// loop settles the matching pending request as replies arrive, in arrival
/// order rather than issuance order. Any number of calls may be in flight at
/// once. No timeout is applied here; callers bring their own deadlines, and a
/// hung worker leaves its call pending until the channel closes.
pub struct RpcChannel {
    outbound: mpsc::Sender<WireMessage>,
    pending: PendingMap,
    receive_loop: JoinHandle<()>,
    closed: Arc<AtomicBool>,
}

impl RpcChannel {
    /// Wrap a spawned context's channel pair and start the receive loop.
    pub fn new(outbound: mpsc::Sender<WireMessage>, mut inbound: mpsc::Receiver<WireEvent>) -> Self {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let loop_pending = pending.clone();
        let loop_closed = closed.clone();
        let receive_loop = tokio::spawn(async move {
            while let Some(event) = inbound.recv().await {
                settle(&loop_pending, event);
            }
            // context went away, nobody will reply anymore
            loop_closed.store(true, Ordering::SeqCst);
            reject_all(&loop_pending);
        });

        Self {
            outbound,
            pending,
            receive_loop,
            closed,
        }
    }

    /// Send a payload and suspend until the matching reply (or rejection)
    /// arrives.
    pub async fn call(&self, payload: Value) -> Result<Value> {
        let correlation_id = CorrelationId::generate();
        let (reply_tx, reply_rx) = oneshot::channel();
        {
            // the closed check and the insert must not be separable: close()
            // sets the flag and then drains under this same lock, so an entry
            // can never land behind reject_all
            let mut pending = self.pending.lock().unwrap();
            if self.closed.load(Ordering::SeqCst) {
                return Err(OffstageError::ChannelClosed);
            }
            pending.insert(correlation_id.clone(), reply_tx);
        }

        let message = WireMessage::new(correlation_id.clone(), payload);
        if self.outbound.send(message).await.is_err() {
            self.pending.lock().unwrap().remove(&correlation_id);
            return Err(OffstageError::ChannelClosed);
        }

        match reply_rx.await {
            Ok(result) => result,
            Err(_) => Err(OffstageError::ChannelClosed),
        }
    }

    /// Requests currently awaiting a reply.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Stop the receive loop and reject every outstanding request with
    /// `ChannelClosed`. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.receive_loop.abort();
        reject_all(&self.pending);
    }
}

impl Drop for RpcChannel {
    fn drop(&mut self) {
        self.close();
    }
}

fn settle(pending: &PendingMap, event: WireEvent) {
    match event {
        WireEvent::Message(message) => {
            let (correlation_id, payload) = message.into_parts();
            match pending.lock().unwrap().remove(&correlation_id) {
                Some(reply_tx) => {
                    let _ = reply_tx.send(Ok(payload));
                }
                // stray or duplicate delivery
                None => debug!("discarding reply with unknown correlation id {}", correlation_id),
            }
        }
        WireEvent::Error {
            correlation_id: Some(correlation_id),
            message,
        } => match pending.lock().unwrap().remove(&correlation_id) {
            Some(reply_tx) => {
                let _ = reply_tx.send(Err(OffstageError::WorkerRuntime(message)));
            }
            None => debug!(
                "discarding error with unknown correlation id {}",
                correlation_id
            ),
        },
        WireEvent::Error {
            correlation_id: None,
            message,
        } => {
            // the error channel carries no id; attribute only when unambiguous
            let mut map = pending.lock().unwrap();
            if map.len() == 1 {
                if let Some(correlation_id) = map.keys().next().cloned() {
                    if let Some(reply_tx) = map.remove(&correlation_id) {
                        let _ = reply_tx.send(Err(OffstageError::WorkerRuntime(message)));
                    }
                }
            } else {
                warn!(
                    "worker error with no correlation id and {} pending requests: {}",
                    map.len(),
                    message
                );
            }
        }
    }
}

fn reject_all(pending: &PendingMap) {
    let drained: Vec<_> = {
        let mut map = pending.lock().unwrap();
        map.drain().collect()
    };
    for (correlation_id, reply_tx) in drained {
        debug!("rejecting pending request {}", correlation_id);
        let _ = reply_tx.send(Err(OffstageError::ChannelClosed));
    }
}

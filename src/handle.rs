use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::artifact::WorkerArtifact;
use crate::context::{ContextHandle, SpawnedContext};
use crate::errors::Result;
use crate::id::SyntheticId;
use crate::rpc::RpcChannel;

/// One live worker: the execution context, its correlation channel, and the
/// artifact backing it. Exclusive owner of all three.
pub struct WorkerHandle {
    id: SyntheticId,
    channel: RpcChannel,
    context: Mutex<ContextHandle>,
    artifact: Mutex<Option<WorkerArtifact>>,
    closed: AtomicBool,
}

impl WorkerHandle {
    pub(crate) fn new(
        id: SyntheticId,
        spawned: SpawnedContext,
        artifact: Option<WorkerArtifact>,
    ) -> Self {
        let SpawnedContext {
            outbound,
            inbound,
            handle,
        } = spawned;
        Self {
            id,
            channel: RpcChannel::new(outbound, inbound),
            context: Mutex::new(handle),
            artifact: Mutex::new(artifact),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &SyntheticId {
        &self.id
    }

    /// Send a message to the worker and await the matching reply.
    ///
    /// Fails with `ChannelClosed` if the handle closes first, or with
    /// `WorkerRuntime` carrying whatever the handler raised.
    pub async fn send(&self, message: Value) -> Result<Value> {
        self.channel.call(message).await
    }

    /// Reject pending requests, terminate the context, release the artifact.
    ///
    /// Idempotent and infallible; artifact release errors are logged, not
    /// surfaced. May be called while sends are in flight; those sends fail
    /// with `ChannelClosed`. Also runs on drop.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.channel.close();
        self.context.lock().unwrap().terminate();
        if let Some(mut artifact) = self.artifact.lock().unwrap().take() {
            if let Err(e) = artifact.release() {
                warn!("failed to release artifact for worker {}: {}", self.id, e);
            }
        }
        debug!("worker {} closed", self.id);
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.close();
    }
}

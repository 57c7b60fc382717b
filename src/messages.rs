use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::CorrelationId;

/// One frame on a worker's message channel, in both directions.
///
/// Serialized as the two-element JSON array `[correlation_id, payload]`, which
/// is also the shape the synthesized dispatch entry point reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage(pub CorrelationId, pub Value);

impl WireMessage {
    pub fn new(correlation_id: CorrelationId, payload: Value) -> Self {
        Self(correlation_id, payload)
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.0
    }

    pub fn payload(&self) -> &Value {
        &self.1
    }

    pub fn into_parts(self) -> (CorrelationId, Value) {
        (self.0, self.1)
    }
}

/// Everything a live execution context can deliver back to the controller.
#[derive(Debug)]
pub enum WireEvent {
    /// A reply frame carrying a correlation id and the handler's return value.
    Message(WireMessage),
    /// An error event. Carries a correlation id when the context attributes
    /// the failure to a specific request; error channels without ids (such as
    /// a worker's stderr) deliver `None`.
    Error {
        correlation_id: Option<CorrelationId>,
        message: String,
    },
}

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OffstageError>;

/// # Offstage Error
///
/// Every failure the runtime surfaces to a caller. Nothing in this crate
/// retries on its own; callers decide whether a failed `create` or `send`
/// is worth another attempt.
#[derive(Error, Debug)]
pub enum OffstageError {
    /// No source file under the resolution directory contains the handler text.
    #[error("handler source not found under {}", searched.display())]
    HandlerNotFound { searched: PathBuf },

    /// More than one source file contains the handler text (strict policy).
    #[error("handler source is ambiguous: {} candidate files", candidates.len())]
    AmbiguousHandler { candidates: Vec<PathBuf> },

    /// Script assembly or bundling failed.
    #[error("script synthesis failed: {0}")]
    SynthesisFailed(String),

    /// Persisting or releasing a worker artifact hit an I/O error other than
    /// not-found.
    #[error("artifact I/O error: {0}")]
    ArtifactIo(#[source] std::io::Error),

    /// The handler raised inside its execution context. Propagated to the
    /// pending request that triggered it, never to the controller itself.
    #[error("worker runtime error: {0}")]
    WorkerRuntime(String),

    /// The handle was closed (or the context went away) while a request was
    /// still outstanding.
    #[error("channel closed before a reply arrived")]
    ChannelClosed,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

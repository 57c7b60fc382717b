//! # offstage
//!
//! Offload a plain handler function into an isolated execution context at
//! runtime, without pre-authoring a worker module.
//!
//! The runtime recovers the handler's originating compiled module by
//! searching the project's resolution directory for its source text,
//! synthesizes a standalone worker script (optionally bundling transitive
//! imports into a single blob), persists it as a uniquely named artifact,
//! spawns an execution context from it, and drives that context as a
//! remote-procedure endpoint with correlation ids.
//!
//! ```ignore
//! let config = ProjectConfig::from_file("gleam.toml")?;
//! let offstage = Offstage::new(
//!     &config,
//!     ScriptSynthesizer::concat(),
//!     Arc::new(ProcessSpawner::new(config.runtime_command.clone(), config.runtime_args.clone())),
//! );
//!
//! let mut worker = offstage.create(&HandlerSource::new("(n) => n * 2")).await?;
//! let answer = worker.send(json!(21)).await?;
//! worker.close();
//! ```
//!
//! Artifacts left behind by handles that were never closed are swept by
//! [`Offstage::shutdown`] (or the [`shutdown::ShutdownController`]
//! broadcast) before the process exits.

pub mod artifact;
pub mod catalog;
pub mod config;
pub mod context;
pub mod errors;
pub mod handle;
pub mod id;
pub mod logging;
pub mod messages;
pub mod resolver;
pub mod rpc;
pub mod runtime;
pub mod shutdown;
pub mod synth;

pub use artifact::{ArtifactRegistry, ArtifactStore, WorkerArtifact};
pub use catalog::{SourceCatalog, SourceMatch};
pub use config::ProjectConfig;
pub use context::{
    ContextHandle, ContextSpawner, InProcessSpawner, LoadableScript, ProcessSpawner, SpawnedContext,
};
pub use errors::{OffstageError, Result};
pub use handle::WorkerHandle;
pub use id::{CorrelationId, SyntheticId};
pub use messages::{WireEvent, WireMessage};
pub use resolver::{HandlerResolver, MatchPolicy};
pub use rpc::RpcChannel;
pub use runtime::Offstage;
pub use shutdown::{ShutdownController, ShutdownReceiver, ShutdownSignal};
pub use synth::{
    BundleRequest, Bundler, DispatchProtocol, HandlerDescriptor, HandlerSource, ScriptSynthesizer,
    SynthesisStrategy, SynthesizedScript,
};

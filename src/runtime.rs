use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::artifact::{ArtifactRegistry, ArtifactStore};
use crate::catalog::SourceCatalog;
use crate::config::ProjectConfig;
use crate::context::{ContextSpawner, LoadableScript};
use crate::errors::Result;
use crate::handle::WorkerHandle;
use crate::resolver::{HandlerResolver, MatchPolicy};
use crate::shutdown::ShutdownReceiver;
use crate::synth::{HandlerDescriptor, HandlerSource, ScriptSynthesizer};

/// The offload runtime: turns handler source text into live workers.
///
/// `create` resolves the handler's originating module, synthesizes a
/// standalone worker script, persists it, and spawns an execution context
/// wired up as a remote-procedure endpoint. Resolution failures abort before
/// anything is persisted or spawned.
pub struct Offstage {
    resolve_dir: PathBuf,
    resolver: HandlerResolver,
    synthesizer: ScriptSynthesizer,
    store: ArtifactStore,
    registry: ArtifactRegistry,
    spawner: Arc<dyn ContextSpawner>,
}

impl Offstage {
    pub fn new(
        config: &ProjectConfig,
        synthesizer: ScriptSynthesizer,
        spawner: Arc<dyn ContextSpawner>,
    ) -> Self {
        Self::with_policy(config, synthesizer, spawner, MatchPolicy::default())
    }

    pub fn with_policy(
        config: &ProjectConfig,
        synthesizer: ScriptSynthesizer,
        spawner: Arc<dyn ContextSpawner>,
        policy: MatchPolicy,
    ) -> Self {
        let resolve_dir = config.resolve_dir();
        let catalog = SourceCatalog::new(&resolve_dir, config.source_extension.clone());
        let registry = ArtifactRegistry::new();
        Self {
            resolve_dir,
            resolver: HandlerResolver::new(catalog, policy),
            synthesizer,
            store: ArtifactStore::new(registry.clone()),
            registry,
            spawner,
        }
    }

    pub fn registry(&self) -> &ArtifactRegistry {
        &self.registry
    }

    /// Offload `handler` into a fresh execution context.
    ///
    /// One context per call; workers are not pooled or reused.
    pub async fn create(&self, handler: &HandlerSource) -> Result<WorkerHandle> {
        let source_path = self.resolver.resolve(handler)?;
        let original_contents = fs::read_to_string(&source_path)?;

        let descriptor = HandlerDescriptor::new(handler.clone());
        let script = self.synthesizer.synthesize(
            &original_contents,
            &descriptor,
            &self.resolve_dir,
            self.spawner.dispatch_protocol(),
        )?;
        let mut artifact = self.store.persist(&script, &descriptor, &source_path)?;

        let loadable = LoadableScript {
            path: Some(artifact.path().to_path_buf()),
            text: script.text.clone(),
        };
        let spawned = match self.spawner.spawn(&loadable).await {
            Ok(spawned) => spawned,
            Err(e) => {
                if let Err(release_err) = artifact.release() {
                    warn!(
                        "failed to release artifact after spawn failure: {}",
                        release_err
                    );
                }
                return Err(e);
            }
        };

        info!(
            "spawned worker {} from {}",
            descriptor.synthetic_id(),
            source_path.display()
        );
        Ok(WorkerHandle::new(
            descriptor.synthetic_id().clone(),
            spawned,
            Some(artifact),
        ))
    }

    /// Release every artifact still outstanding. The deterministic teardown
    /// for process shutdown; handles closed earlier have already removed
    /// their own entries.
    pub fn shutdown(&self) -> Result<()> {
        let outstanding = self.registry.outstanding();
        if outstanding > 0 {
            info!("releasing {} outstanding artifacts", outstanding);
        }
        self.registry.release_all()
    }

    /// Run artifact teardown when the controller broadcasts shutdown.
    pub fn spawn_shutdown_listener(&self, mut receiver: ShutdownReceiver) -> JoinHandle<()> {
        let registry = self.registry.clone();
        tokio::spawn(async move {
            receiver.wait_for_shutdown().await;
            if let Err(e) = registry.release_all() {
                warn!("artifact cleanup on shutdown failed: {}", e);
            }
        })
    }
}

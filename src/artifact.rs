use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::errors::{OffstageError, Result};
use crate::id::SyntheticId;
use crate::synth::{HandlerDescriptor, SynthesizedScript};

struct RegisteredArtifact {
    path: PathBuf,
    created_at: DateTime<Utc>,
}

/// Process-wide record of worker scripts still on disk.
///
/// An explicit, owned object rather than an ambient exit hook: the host's
/// main control flow (or the shutdown broadcast) calls `release_all` as its
/// deterministic teardown, and `close()` on a handle removes its own entry
/// immediately instead of waiting for shutdown. Registration and removal are
/// safe from concurrent tasks.
#[derive(Clone, Default)]
pub struct ArtifactRegistry {
    inner: Arc<Mutex<HashMap<String, RegisteredArtifact>>>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, identifier: String, path: PathBuf) {
        let mut map = self.inner.lock().unwrap();
        map.insert(
            identifier,
            RegisteredArtifact {
                path,
                created_at: Utc::now(),
            },
        );
    }

    fn unregister(&self, identifier: &str) {
        self.inner.lock().unwrap().remove(identifier);
    }

    /// Number of artifacts still registered.
    pub fn outstanding(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Remove every registered artifact from disk.
    ///
    /// Attempts all of them even when some fail; not-found is swallowed, the
    /// first other I/O error is returned after the sweep completes.
    pub fn release_all(&self) -> Result<()> {
        let drained: Vec<(String, RegisteredArtifact)> = {
            let mut map = self.inner.lock().unwrap();
            map.drain().collect()
        };

        let mut first_error = None;
        for (identifier, artifact) in drained {
            match fs::remove_file(&artifact.path) {
                Ok(()) => debug!(
                    "removed artifact {} (registered {})",
                    identifier, artifact.created_at
                ),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("failed to remove artifact {}: {}", identifier, e);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            None => Ok(()),
            Some(e) => Err(OffstageError::ArtifactIo(e)),
        }
    }
}

/// Owner of exactly one persisted worker script. No sharing between handles.
pub struct WorkerArtifact {
    identifier: String,
    path: PathBuf,
    registry: ArtifactRegistry,
    released: bool,
}

impl WorkerArtifact {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the backing script. Idempotent: repeated calls and
    /// already-removed files are fine; any other I/O error is surfaced.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.registry.unregister(&self.identifier);

        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("released artifact {}", self.identifier);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OffstageError::ArtifactIo(e)),
        }
    }
}

/// Persists synthesized scripts and tracks them in the registry.
pub struct ArtifactStore {
    registry: ArtifactRegistry,
}

impl ArtifactStore {
    pub fn new(registry: ArtifactRegistry) -> Self {
        Self { registry }
    }

    /// Write the script next to its originating module under a name derived
    /// from the descriptor's synthetic id, and register it for shutdown
    /// cleanup.
    ///
    /// The script sits beside the module so sibling-relative imports resolve
    /// identically under the concatenation strategy.
    pub fn persist(
        &self,
        script: &SynthesizedScript,
        descriptor: &HandlerDescriptor,
        source_path: &Path,
    ) -> Result<WorkerArtifact> {
        let identifier = artifact_file_name(source_path, descriptor.synthetic_id());
        let path = source_path.with_file_name(&identifier);

        fs::write(&path, &script.text).map_err(OffstageError::ArtifactIo)?;
        self.registry.register(identifier.clone(), path.clone());
        debug!("persisted artifact {}", path.display());

        Ok(WorkerArtifact {
            identifier,
            path,
            registry: self.registry.clone(),
            released: false,
        })
    }
}

fn artifact_file_name(source_path: &Path, id: &SyntheticId) -> String {
    let stem = source_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("handler");
    let extension = source_path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("mjs");
    format!("{}.worker.{}.{}", stem, id, extension)
}

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

use tokio::sync::mpsc;

use offstage::{
    ContextHandle, ContextSpawner, InProcessSpawner, LoadableScript, OffstageError, ProjectConfig,
    SpawnedContext,
};

/// The handler used across tests; its text is unique in the default tree.
pub const DOUBLER_HANDLER: &str = "(n) => n * 2";

/// A compiled-output tree with a root module importing a nested one, the
/// doubler handler living in `app/math.mjs`.
pub fn project_tree() -> TempDir {
    let tree = TempDir::new().expect("tempdir");
    write_module(
        tree.path(),
        "main.mjs",
        "import { double } from \"./app/math.mjs\";\nexport const main = () => double(21);\n",
    );
    write_module(
        &tree.path().join("app"),
        "math.mjs",
        &format!("export const double = {};\n", DOUBLER_HANDLER),
    );
    tree
}

pub fn write_module(dir: &Path, name: &str, contents: &str) -> PathBuf {
    fs::create_dir_all(dir).expect("create module dir");
    let path = dir.join(name);
    fs::write(&path, contents).expect("write module");
    path
}

pub fn config_for(tree: &Path) -> ProjectConfig {
    ProjectConfig {
        name: "demo".to_string(),
        resolve_dir: Some(tree.to_path_buf()),
        source_extension: "mjs".to_string(),
        runtime_command: "deno".to_string(),
        runtime_args: vec!["run".to_string()],
    }
}

/// An in-process spawner whose worker doubles integers, mirroring
/// `DOUBLER_HANDLER`.
pub fn doubler_spawner() -> InProcessSpawner {
    InProcessSpawner::new(|value| {
        let n = value.as_i64().ok_or_else(|| "not a number".to_string())?;
        Ok(json!(n * 2))
    })
}

/// Counts spawn calls before delegating to an inner spawner.
pub struct CountingSpawner {
    inner: InProcessSpawner,
    spawned: AtomicUsize,
}

impl CountingSpawner {
    pub fn new(inner: InProcessSpawner) -> Self {
        Self {
            inner,
            spawned: AtomicUsize::new(0),
        }
    }

    pub fn spawn_count(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContextSpawner for CountingSpawner {
    async fn spawn(&self, script: &LoadableScript) -> offstage::Result<SpawnedContext> {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        self.inner.spawn(script).await
    }
}

/// Always fails to spawn, standing in for a broken runtime.
pub struct FailingSpawner;

#[async_trait]
impl ContextSpawner for FailingSpawner {
    async fn spawn(&self, _script: &LoadableScript) -> offstage::Result<SpawnedContext> {
        Err(OffstageError::WorkerRuntime(
            "runtime unavailable".to_string(),
        ))
    }
}

/// Spawns a context that swallows every request and never replies.
pub struct SilentSpawner;

#[async_trait]
impl ContextSpawner for SilentSpawner {
    async fn spawn(&self, _script: &LoadableScript) -> offstage::Result<SpawnedContext> {
        let (outbound_tx, mut outbound_rx) = mpsc::channel(8);
        let (inbound_tx, inbound_rx) = mpsc::channel(8);
        let worker = tokio::spawn(async move {
            while outbound_rx.recv().await.is_some() {}
            drop(inbound_tx);
        });
        Ok(SpawnedContext {
            outbound: outbound_tx,
            inbound: inbound_rx,
            handle: ContextHandle::new(move || worker.abort()),
        })
    }
}

/// Every persisted worker script under `tree`, recursively.
pub fn worker_files(tree: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    collect_worker_files(tree, &mut found);
    found.sort();
    found
}

fn collect_worker_files(dir: &Path, found: &mut Vec<PathBuf>) {
    for entry in fs::read_dir(dir).expect("read dir") {
        let path = entry.expect("dir entry").path();
        if path.is_dir() {
            collect_worker_files(&path, found);
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.contains(".worker."))
        {
            found.push(path);
        }
    }
}

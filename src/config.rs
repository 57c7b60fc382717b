use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::errors::{OffstageError, Result};

/// Host project configuration, read from the project's TOML file.
///
/// Only `name` is required; everything else defaults to the build-output
/// conventions of the host toolchain (compiled modules under
/// `build/dev/javascript/<name>`, `.mjs` sources, workers run by `deno run`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,

    /// Root directory compiled modules are resolved from. Derived from the
    /// project name when absent.
    #[serde(default)]
    pub resolve_dir: Option<PathBuf>,

    /// File extension (without the dot) of candidate source files.
    #[serde(default = "default_source_extension")]
    pub source_extension: String,

    /// Runtime command used to execute synthesized worker scripts.
    #[serde(default = "default_runtime_command")]
    pub runtime_command: String,

    /// Arguments passed to the runtime command before the script path.
    #[serde(default = "default_runtime_args")]
    pub runtime_args: Vec<String>,
}

fn default_source_extension() -> String {
    "mjs".to_string()
}

fn default_runtime_command() -> String {
    "deno".to_string()
}

fn default_runtime_args() -> Vec<String> {
    vec!["run".to_string()]
}

impl ProjectConfig {
    /// Load a project configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    /// The resolution directory: explicit when set, otherwise the build
    /// output convention for this project.
    pub fn resolve_dir(&self) -> PathBuf {
        match &self.resolve_dir {
            Some(dir) => dir.clone(),
            None => PathBuf::from(format!("build/dev/javascript/{}", self.name)),
        }
    }
}

impl FromStr for ProjectConfig {
    type Err = OffstageError;

    /// Parse a project configuration from a TOML string.
    fn from_str(content: &str) -> Result<Self> {
        let config: ProjectConfig =
            toml::from_str(content).map_err(|e| OffstageError::Config(e.to_string()))?;
        Ok(config)
    }
}

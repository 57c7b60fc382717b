use std::path::PathBuf;
use tracing::{debug, warn};

use crate::catalog::SourceCatalog;
use crate::errors::{OffstageError, Result};
use crate::synth::HandlerSource;

/// How to disambiguate when more than one source file contains the handler
/// text.
///
/// `FirstMatch` is correct only when the handler source is unique within the
/// searched tree: the same text sitting in a comment or an unrelated module
/// is picked up just the same, and the wrong module's surrounding scope would
/// end up in the synthesized script. `Strict` refuses instead of guessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// Fail with `AmbiguousHandler` when more than one file matches.
    #[default]
    Strict,
    /// Take the first match in traversal order.
    FirstMatch,
}

/// Locates the compiled source file a handler originated from.
pub struct HandlerResolver {
    catalog: SourceCatalog,
    policy: MatchPolicy,
}

impl HandlerResolver {
    pub fn new(catalog: SourceCatalog, policy: MatchPolicy) -> Self {
        Self { catalog, policy }
    }

    /// Search the resolution tree for files containing the handler's source
    /// text and apply the disambiguation policy.
    pub fn resolve(&self, handler: &HandlerSource) -> Result<PathBuf> {
        let matches = self.catalog.find_containing(handler.text())?;
        let mut paths: Vec<PathBuf> = matches.into_iter().map(|m| m.path).collect();

        match (paths.len(), self.policy) {
            (0, _) => Err(OffstageError::HandlerNotFound {
                searched: self.catalog.root().to_path_buf(),
            }),
            (1, _) => {
                let path = paths.remove(0);
                debug!("handler resolved to {}", path.display());
                Ok(path)
            }
            (n, MatchPolicy::FirstMatch) => {
                let path = paths.remove(0);
                warn!(
                    "handler text matches {} files, taking the first: {}",
                    n,
                    path.display()
                );
                Ok(path)
            }
            (_, MatchPolicy::Strict) => Err(OffstageError::AmbiguousHandler { candidates: paths }),
        }
    }
}

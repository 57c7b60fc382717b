use std::path::Path;
use std::sync::Arc;

use crate::errors::{OffstageError, Result};
use crate::id::SyntheticId;

/// The exact stringified source text of a handler function.
///
/// Captured values are carried as source text only, so handlers must be
/// lexically self-contained or rely solely on imports their originating
/// module can resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerSource(String);

impl HandlerSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn text(&self) -> &str {
        &self.0
    }
}

/// A handler's source text paired with the process-unique token naming its
/// binding in the synthesized script. Immutable once created.
#[derive(Debug, Clone)]
pub struct HandlerDescriptor {
    source: HandlerSource,
    synthetic_id: SyntheticId,
}

impl HandlerDescriptor {
    pub fn new(source: HandlerSource) -> Self {
        Self {
            source,
            synthetic_id: SyntheticId::generate(),
        }
    }

    pub fn source(&self) -> &HandlerSource {
        &self.source
    }

    pub fn synthetic_id(&self) -> &SyntheticId {
        &self.synthetic_id
    }
}

/// The full text of a loadable worker unit: module contents (or their bundled
/// equivalent), a fresh handler binding, and the dispatch entry point last.
#[derive(Debug, Clone)]
pub struct SynthesizedScript {
    pub text: String,
}

/// How the originating module's dependencies reach the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SynthesisStrategy {
    /// Emit the original file verbatim and let the module loader resolve its
    /// imports from the resolution directory at load time.
    #[default]
    Concat,
    /// Run the module plus handler binding through an external bundler so the
    /// script carries no imports at all.
    Bundle,
}

/// The transport the dispatch entry point speaks.
///
/// Must match the spawned context's transport; the runtime derives it from
/// the spawner so the two cannot drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchProtocol {
    /// Web-worker message events: requests arrive via `onmessage`, replies
    /// leave via `postMessage`.
    #[default]
    WorkerMessage,
    /// JSON lines over the process's standard streams: one
    /// `[correlation_id, payload]` request per stdin line, one
    /// `[correlation_id, result]` reply per stdout line. Targets the Deno
    /// stdin API.
    StdioLines,
}

/// Input handed to the external bundler.
pub struct BundleRequest<'a> {
    pub entry_contents: &'a str,
    pub resolve_dir: &'a Path,
    /// The bundler's output must be a self-invoking namespace bound to this
    /// global name, exposing the entry's exports.
    pub global_name: &'a str,
}

/// Black-box module bundler: entry text in, single self-contained blob out,
/// all transitive imports inlined.
pub trait Bundler: Send + Sync {
    fn bundle(&self, request: BundleRequest<'_>) -> std::result::Result<String, String>;
}

/// Produces the text of a standalone worker script. Never executes anything.
pub struct ScriptSynthesizer {
    strategy: SynthesisStrategy,
    bundler: Option<Arc<dyn Bundler>>,
}

impl ScriptSynthesizer {
    /// Concatenation strategy: original module + binding + entry point.
    pub fn concat() -> Self {
        Self {
            strategy: SynthesisStrategy::Concat,
            bundler: None,
        }
    }

    /// Bundling strategy backed by the given bundler.
    pub fn bundling(bundler: Arc<dyn Bundler>) -> Self {
        Self {
            strategy: SynthesisStrategy::Bundle,
            bundler: Some(bundler),
        }
    }

    pub fn strategy(&self) -> SynthesisStrategy {
        self.strategy
    }

    /// Build the worker script for `descriptor` out of its originating
    /// module's contents.
    ///
    /// The dispatch entry point is always the final statement, so a syntax or
    /// runtime error earlier in the script surfaces before any message is
    /// processed.
    pub fn synthesize(
        &self,
        original_contents: &str,
        descriptor: &HandlerDescriptor,
        resolve_dir: &Path,
        protocol: DispatchProtocol,
    ) -> Result<SynthesizedScript> {
        let id = descriptor.synthetic_id().to_string();
        let handler = descriptor.source().text();

        let text = match self.strategy {
            SynthesisStrategy::Concat => {
                let binding = format!("export const {} = ({});", id, handler);
                format!(
                    "{}\n{}\n{}",
                    original_contents,
                    binding,
                    dispatch_entry_point(&id, protocol)
                )
            }
            SynthesisStrategy::Bundle => {
                let bundler = self.bundler.as_ref().ok_or_else(|| {
                    OffstageError::SynthesisFailed(
                        "bundling strategy selected but no bundler configured".to_string(),
                    )
                })?;
                let entry =
                    format!("{}\nexport const {} = ({});", original_contents, id, handler);
                let global_name = format!("{}_ns", id);
                let bundled = bundler
                    .bundle(BundleRequest {
                        entry_contents: &entry,
                        resolve_dir,
                        global_name: &global_name,
                    })
                    .map_err(OffstageError::SynthesisFailed)?;
                let accessor = format!("{}[\"{}\"]", global_name, id);
                format!("{}\n{}", bundled, dispatch_entry_point(&accessor, protocol))
            }
        };

        Ok(SynthesizedScript { text })
    }
}

/// The message-dispatch tail of every synthesized script: invoke the handler
/// binding with the inbound payload, post `[correlation_id, result]` back.
fn dispatch_entry_point(handler_expr: &str, protocol: DispatchProtocol) -> String {
    match protocol {
        DispatchProtocol::WorkerMessage => format!(
            "onmessage = (e) => {{\n  const result = ({})(e.data[1]);\n  postMessage([e.data[0], result]);\n}};",
            handler_expr
        ),
        DispatchProtocol::StdioLines => format!(
            "{{\n  const decoder = new TextDecoder();\n  let buffered = \"\";\n  for await (const chunk of Deno.stdin.readable) {{\n    buffered += decoder.decode(chunk, {{ stream: true }});\n    let newline;\n    while ((newline = buffered.indexOf(\"\\n\")) >= 0) {{\n      const line = buffered.slice(0, newline).trim();\n      buffered = buffered.slice(newline + 1);\n      if (line === \"\") continue;\n      const request = JSON.parse(line);\n      const result = ({})(request[1]);\n      console.log(JSON.stringify([request[0], result]));\n    }}\n  }}\n}}",
            handler_expr
        ),
    }
}

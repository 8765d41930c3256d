//! Registry of execution contexts, parsed scripts and loaded sources.
//!
//! Identity rules the rest of the breakpoint subsystem leans on:
//! - a [`Script`] is created once, when the target reports `scriptParsed`,
//!   and never mutated; it disappears when its execution context is
//!   destroyed;
//! - at most one [`LoadedSource`] instance exists per canonicalized
//!   identifier (`get_or_add_loaded_source` is idempotent);
//! - script registration is at-most-once even under concurrent calls:
//!   racing registrations for one script id share the same in-flight
//!   factory future, so the factory body runs exactly once.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use vigil_cdp::{ExecutionContextId, ScriptId};
use vigil_core::ResourceIdentifier;

use crate::source_map::SourceMapper;

/// A runtime execution context. The destroyed flag is the only mutable cell
/// in the script model.
pub struct ExecutionContext {
    id: ExecutionContextId,
    destroyed: AtomicBool,
}

impl ExecutionContext {
    fn new(id: ExecutionContextId) -> Self {
        Self {
            id,
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ExecutionContextId {
        self.id
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn mark_destroyed(&self) {
        self.destroyed.store(true, Ordering::Release);
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

/// A source file known to exist, on disk or synthesized by the runtime.
#[derive(Debug)]
pub struct LoadedSource {
    identifier: ResourceIdentifier,
    spans_multiple_scripts: bool,
    text_resolvable: bool,
}

impl LoadedSource {
    fn new(
        identifier: ResourceIdentifier,
        spans_multiple_scripts: bool,
        text_resolvable: bool,
    ) -> Self {
        Self {
            identifier,
            spans_multiple_scripts,
            text_resolvable,
        }
    }

    pub fn identifier(&self) -> &ResourceIdentifier {
        &self.identifier
    }

    /// False when the source corresponds 1:1 to a single script; true for
    /// e.g. an HTML document holding several inline scripts.
    pub fn spans_multiple_scripts(&self) -> bool {
        self.spans_multiple_scripts
    }

    pub fn is_text_resolvable(&self) -> bool {
        self.text_resolvable
    }
}

impl PartialEq for LoadedSource {
    fn eq(&self, other: &Self) -> bool {
        // The registry guarantees one instance per canonical identifier, so
        // identifier equivalence and instance identity coincide.
        self.identifier == other.identifier
    }
}

impl Eq for LoadedSource {}

/// One loaded unit of debuggee code. Immutable after construction; the async
/// factory passed to [`ScriptRegistry::register_new_script`] computes every
/// field (including mapped sources) before the script is exposed.
pub struct Script {
    id: ScriptId,
    url: String,
    context: Arc<ExecutionContext>,
    runtime_source: ResourceIdentifier,
    development_source: Arc<LoadedSource>,
    mapped_sources: Vec<Arc<LoadedSource>>,
    mapper: Arc<dyn SourceMapper>,
}

impl Script {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ScriptId,
        context: Arc<ExecutionContext>,
        url: String,
        runtime_source: ResourceIdentifier,
        development_source: Arc<LoadedSource>,
        mapped_sources: Vec<Arc<LoadedSource>>,
        mapper: Arc<dyn SourceMapper>,
    ) -> Self {
        Self {
            id,
            url,
            context,
            runtime_source,
            development_source,
            mapped_sources,
            mapper,
        }
    }

    pub fn id(&self) -> &ScriptId {
        &self.id
    }

    /// The URL the script was served from, verbatim.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn execution_context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }

    pub fn runtime_source(&self) -> &ResourceIdentifier {
        &self.runtime_source
    }

    /// The on-disk file this script corresponds to. Equals the runtime
    /// source when no path transformation applies.
    pub fn development_source(&self) -> &Arc<LoadedSource> {
        &self.development_source
    }

    /// Pre-compilation originals reached through the source map.
    pub fn mapped_sources(&self) -> &[Arc<LoadedSource>] {
        &self.mapped_sources
    }

    pub fn mapper(&self) -> &Arc<dyn SourceMapper> {
        &self.mapper
    }

    /// Development source plus all mapped sources.
    pub fn sources(&self) -> Vec<Arc<LoadedSource>> {
        let mut out = Vec::with_capacity(1 + self.mapped_sources.len());
        out.push(self.development_source.clone());
        out.extend(self.mapped_sources.iter().cloned());
        out
    }

    pub fn is_mapped_source(&self, source: &Arc<LoadedSource>) -> bool {
        self.mapped_sources
            .iter()
            .any(|mapped| Arc::ptr_eq(mapped, source))
    }
}

impl PartialEq for Script {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Script {}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("context", &self.context.id())
            .finish_non_exhaustive()
    }
}

type InFlightScript = Shared<BoxFuture<'static, Arc<Script>>>;

#[derive(Default)]
struct RegistryState {
    contexts: HashMap<ExecutionContextId, Arc<ExecutionContext>>,
    scripts: HashMap<ScriptId, Arc<Script>>,
    in_flight: HashMap<ScriptId, InFlightScript>,
    loaded_sources: HashMap<String, Arc<LoadedSource>>,
    /// Canonical source identifier → ids of scripts that source participates
    /// in (as runtime, development or mapped source).
    scripts_by_source: HashMap<String, Vec<ScriptId>>,
}

/// Session-scoped script/source registry. Shared by handle; all mutation
/// happens through short critical sections, never across an await point.
#[derive(Default)]
pub struct ScriptRegistry {
    state: Mutex<RegistryState>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_execution_context(&self, id: ExecutionContextId) -> Arc<ExecutionContext> {
        self.state
            .lock()
            .contexts
            .entry(id)
            .or_insert_with(|| Arc::new(ExecutionContext::new(id)))
            .clone()
    }

    /// Mark a context destroyed and unregister its scripts. Returns the
    /// scripts that went away so callers can drop dependent state.
    pub fn destroy_execution_context(&self, id: ExecutionContextId) -> Vec<Arc<Script>> {
        let mut state = self.state.lock();
        let Some(context) = state.contexts.get(&id) else {
            return Vec::new();
        };
        context.mark_destroyed();

        let removed: Vec<Arc<Script>> = state
            .scripts
            .values()
            .filter(|script| script.execution_context().id() == id)
            .cloned()
            .collect();
        for script in &removed {
            state.scripts.remove(script.id());
            for canonical in source_keys(script) {
                if let Some(ids) = state.scripts_by_source.get_mut(&canonical) {
                    ids.retain(|sid| sid != script.id());
                }
            }
        }
        removed
    }

    /// Register a script at most once. If a registration for `id` is already
    /// in flight, the in-flight future is shared and `factory` is dropped
    /// without ever being polled.
    pub async fn register_new_script(
        &self,
        id: ScriptId,
        factory: impl Future<Output = Arc<Script>> + Send + 'static,
    ) -> Arc<Script> {
        let shared = {
            let mut state = self.state.lock();
            if let Some(script) = state.scripts.get(&id) {
                return script.clone();
            }
            match state.in_flight.get(&id) {
                Some(existing) => existing.clone(),
                None => {
                    let shared = factory.boxed().shared();
                    state.in_flight.insert(id.clone(), shared.clone());
                    shared
                }
            }
        };

        let script = shared.await;

        let mut state = self.state.lock();
        // First completer moves the script from in-flight to indexed.
        if state.in_flight.remove(&id).is_some() {
            index_script(&mut state, &script);
        }
        script
    }

    pub fn get_script_by_id(&self, id: &ScriptId) -> Option<Arc<Script>> {
        self.state.lock().scripts.get(id).cloned()
    }

    /// Zero or more scripts: one path may back several scripts (inline
    /// `<script>` tags, cache-busting reloads), and bundling makes authored
    /// sources shared.
    pub fn scripts_by_source(&self, identifier: &ResourceIdentifier) -> Vec<Arc<Script>> {
        let state = self.state.lock();
        let Some(ids) = state.scripts_by_source.get(identifier.canonical()) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| state.scripts.get(id).cloned())
            .collect()
    }

    /// Idempotent: returns the existing instance when the canonical
    /// identifier is already known.
    pub fn get_or_add_loaded_source(
        &self,
        identifier: &ResourceIdentifier,
        spans_multiple_scripts: bool,
        text_resolvable: bool,
    ) -> Arc<LoadedSource> {
        self.state
            .lock()
            .loaded_sources
            .entry(identifier.canonical().to_string())
            .or_insert_with(|| {
                Arc::new(LoadedSource::new(
                    identifier.clone(),
                    spans_multiple_scripts,
                    text_resolvable,
                ))
            })
            .clone()
    }

    /// `Some` iff the identifier refers to a source some script has loaded.
    pub fn resolve_loaded_source(&self, identifier: &ResourceIdentifier) -> Option<Arc<LoadedSource>> {
        self.state
            .lock()
            .loaded_sources
            .get(identifier.canonical())
            .cloned()
    }
}

fn source_keys(script: &Arc<Script>) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    keys.insert(script.runtime_source().canonical().to_string());
    for source in script.sources() {
        keys.insert(source.identifier().canonical().to_string());
    }
    keys
}

fn index_script(state: &mut RegistryState, script: &Arc<Script>) {
    state.scripts.insert(script.id().clone(), script.clone());
    for canonical in source_keys(script) {
        let ids = state.scripts_by_source.entry(canonical).or_default();
        if !ids.contains(script.id()) {
            ids.push(script.id().clone());
        }
    }
}

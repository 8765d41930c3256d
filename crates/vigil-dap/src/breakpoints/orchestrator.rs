//! Drives the target's breakpoint state to match the registered recipes.
//!
//! One orchestrator per session. `update_breakpoints_for_source` reconciles
//! a full-replace client request via the delta calculator; everything that
//! talks to the target for one source runs through the [`SourceQueue`], so
//! adds and removes never interleave.
//!
//! Recipes whose source has no loaded script are parked in a pending table
//! and retried on every later script load; a speculative base-name URL-regex
//! breakpoint is set alongside so the target can bind them even before the
//! adapter sees the script.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;
use tracing::{debug, warn};

use vigil_cdp::{CdpError, CdpLocation, ChromeDebugger, SetBreakpointByUrlResult, UrlSelector};
use vigil_core::{Position, ResourceIdentifier};

use crate::error::DebugResult;
use crate::location::LocationInScript;
use crate::scripts::{Script, ScriptRegistry};
use crate::url_regex::{base_name_regex, exact_url_regex};

use super::delta;
use super::queue::SourceQueue;
use super::recipe::{BPRecipeInLoadedSource, BPRecipeInSource};
use super::registry::{Breakpoint, BreakpointRegistry, BreakpointStatus};

pub struct BreakpointOrchestrator<C: ChromeDebugger> {
    client: C,
    scripts: Arc<ScriptRegistry>,
    registry: Arc<Mutex<BreakpointRegistry>>,
    /// Canonical source identifier → recipes waiting for a script that
    /// provides the source.
    pending: Mutex<HashMap<String, Vec<Arc<BPRecipeInSource>>>>,
    queue: Arc<SourceQueue>,
    /// Latched on the first `Unsupported` reply to
    /// `getPossibleBreakpoints`; refinement is skipped from then on.
    column_refinement_unsupported: AtomicBool,
}

impl<C: ChromeDebugger> BreakpointOrchestrator<C> {
    pub fn new(
        client: C,
        scripts: Arc<ScriptRegistry>,
        registry: Arc<Mutex<BreakpointRegistry>>,
        queue: Arc<SourceQueue>,
    ) -> Self {
        Self {
            client,
            scripts,
            registry,
            pending: Mutex::new(HashMap::new()),
            queue,
            column_refinement_unsupported: AtomicBool::new(false),
        }
    }

    /// Reconcile a full-replace request for one source against what is
    /// already in effect, and apply the difference to the target.
    ///
    /// Returns one `(recipe, status)` pair per requested recipe, in request
    /// order. A per-recipe protocol failure surfaces as an unbound status
    /// with a description, never as a request-level error; only timeouts and
    /// adapter bugs fail the whole call.
    pub async fn update_breakpoints_for_source(
        &self,
        source: &ResourceIdentifier,
        requested: &[Arc<BPRecipeInSource>],
    ) -> DebugResult<Vec<(Arc<BPRecipeInSource>, BreakpointStatus)>> {
        // The whole read-reconcile-apply cycle runs inside the queue, so a
        // concurrent request for the same source sees the finished state of
        // this one, never a half-applied delta.
        let matches = self
            .queue
            .run(source.canonical(), async {
                let current = self.registry.lock().recipes_for_source(source.canonical());
                let delta = delta::calculate(requested, &current)?;
                debug!(
                    source = source.raw(),
                    add = delta.to_add.len(),
                    keep = delta.to_keep.len(),
                    remove = delta.to_remove.len(),
                    "reconciling breakpoints"
                );

                // Register before any protocol call so resolution events
                // arriving mid-update always find their recipe.
                {
                    let mut registry = self.registry.lock();
                    for recipe in &delta.to_add {
                        registry.register_recipe(recipe);
                    }
                }

                for recipe in &delta.to_remove {
                    self.remove_recipe(recipe).await;
                }
                for recipe in &delta.to_add {
                    self.set_recipe(recipe).await;
                }
                Ok(delta.matches_for_requested)
            })
            .await?;

        let registry = self.registry.lock();
        Ok(matches
            .iter()
            .map(|recipe| (recipe.clone(), registry.status(recipe)))
            .collect())
    }

    /// Retry recipes parked for any source the newly-loaded script provides.
    /// Returns the recipes that were attempted, so the session can report
    /// status changes to the client.
    pub async fn resolve_pending_for_script(
        &self,
        script: &Arc<Script>,
    ) -> Vec<Arc<BPRecipeInSource>> {
        let keys = self.pending_keys_for_script(script);

        let mut attempted = Vec::new();
        for key in keys {
            let outcome = self
                .queue
                .run(&key, async {
                    // Drain inside the queue slot: a concurrent update that
                    // removes one of these recipes either scrubs it from the
                    // table before this runs, or runs afterwards and
                    // unregisters whatever the retry set.
                    let drained = self.pending.lock().remove(&key).unwrap_or_default();
                    for recipe in &drained {
                        self.retry_recipe_in_script(recipe, script).await;
                    }
                    Ok(drained)
                })
                .await;
            match outcome {
                Ok(drained) => attempted.extend(drained),
                Err(error) => {
                    // Recipes still parked get another chance on the next
                    // script load; drained ones keep their speculative
                    // target-side breakpoint, which binds via
                    // breakpointResolved.
                    warn!(source = %key, %error, "resolving pending breakpoints failed");
                }
            }
        }
        attempted
    }

    /// Pending-table keys the script can satisfy: the exact canonical
    /// identifiers of its sources, plus any entry whose bare file name
    /// matches the script URL the same way its speculative breakpoint does
    /// (a local path request served over an URL never matches exactly).
    fn pending_keys_for_script(&self, script: &Arc<Script>) -> Vec<String> {
        let mut exact = vec![script.runtime_source().canonical().to_string()];
        for source in script.sources() {
            let key = source.identifier().canonical().to_string();
            if !exact.contains(&key) {
                exact.push(key);
            }
        }

        let pending = self.pending.lock();
        let mut keys = Vec::new();
        for (key, recipes) in pending.iter() {
            if recipes.is_empty() {
                continue;
            }
            if exact.contains(key) {
                keys.push(key.clone());
                continue;
            }
            // Recipes under one key share their source.
            let by_base_name = recipes.first().is_some_and(|recipe| {
                Regex::new(&base_name_regex(recipe.location().source.base_stem()))
                    .map(|re| re.is_match(script.url()))
                    .unwrap_or(false)
            });
            if by_base_name {
                keys.push(key.clone());
            }
        }
        keys
    }

    async fn retry_recipe_in_script(&self, recipe: &Arc<BPRecipeInSource>, script: &Arc<Script>) {
        match recipe.resolve_to_loaded_source(&self.scripts) {
            Some(loaded) => self.set_in_loaded_source(&loaded).await,
            None => {
                // The source still does not unify with any loaded one (a
                // local path served over an URL): bind straight into the
                // script that matched its base name.
                let position = self.refine_column(script, recipe.location().position).await;
                self.set_in_script(recipe, script, position).await;
            }
        }
    }

    pub fn has_pending_recipes(&self) -> bool {
        self.pending.lock().values().any(|recipes| !recipes.is_empty())
    }

    async fn remove_recipe(&self, recipe: &Arc<BPRecipeInSource>) {
        self.pending
            .lock()
            .values_mut()
            .for_each(|recipes| recipes.retain(|p| !Arc::ptr_eq(p, recipe)));

        let cdp_ids = self.registry.lock().unregister_recipe(recipe);
        for cdp_id in cdp_ids {
            // Best effort: a remove that fails (stale id after a reload)
            // must not block the rest of the update.
            if let Err(error) = self.client.remove_breakpoint(&cdp_id).await {
                warn!(%cdp_id, %error, "removeBreakpoint failed");
            }
        }
    }

    async fn set_recipe(&self, recipe: &Arc<BPRecipeInSource>) {
        match recipe.resolve_to_loaded_source(&self.scripts) {
            Some(loaded) => self.set_in_loaded_source(&loaded).await,
            None => self.set_in_unresolved_source(recipe).await,
        }
    }

    async fn set_in_loaded_source(&self, recipe: &BPRecipeInLoadedSource) {
        let in_scripts = match recipe.to_script_recipes(&self.scripts) {
            Ok(in_scripts) => in_scripts,
            Err(error) => {
                // The scripts went away between resolution and mapping
                // (context destroyed mid-update).
                self.registry
                    .lock()
                    .register_resolution_failure(&recipe.unmapped, error.to_string());
                return;
            }
        };
        for in_script in in_scripts {
            let position = self
                .refine_column(&in_script.location.script, in_script.location.position)
                .await;
            self.set_in_script(&in_script.unmapped, &in_script.location.script, position)
                .await;
        }
    }

    /// Set by exact-URL regex rather than script id, so the breakpoint
    /// survives reloads and re-parses of the same URL.
    async fn set_in_script(
        &self,
        recipe: &Arc<BPRecipeInSource>,
        script: &Arc<Script>,
        position: Position,
    ) {
        let selector = UrlSelector::UrlRegex(exact_url_regex(script.url()));
        match self
            .client
            .set_breakpoint_by_url(
                selector,
                position.line,
                position.column,
                recipe.action().cdp_condition(),
            )
            .await
        {
            Ok(result) => self.register_set_result(recipe, result),
            Err(CdpError::BreakpointAlreadyExists) => {
                // The position is already covered (an earlier recipe, or an
                // entry breakpoint). Covered is bound.
                debug!(script = %script.id(), %position, "breakpoint already exists at location");
                self.registry
                    .lock()
                    .register_breakpoint_as_bound(Breakpoint {
                        recipe: recipe.clone(),
                        location: LocationInScript {
                            script: script.clone(),
                            position,
                        },
                    });
            }
            Err(error) => {
                warn!(script = %script.id(), %error, "setBreakpointByUrl failed");
                self.registry
                    .lock()
                    .register_resolution_failure(recipe, error.to_string());
            }
        }
    }

    /// No script for the source yet: park the recipe, and speculate on the
    /// bare file name so the target binds it the moment a matching script
    /// loads.
    async fn set_in_unresolved_source(&self, recipe: &Arc<BPRecipeInSource>) {
        let source = &recipe.location().source;
        self.pending
            .lock()
            .entry(source.canonical().to_string())
            .or_default()
            .push(recipe.clone());

        let position = recipe.location().position;
        match self
            .client
            .set_breakpoint_by_url(
                UrlSelector::UrlRegex(base_name_regex(source.base_stem())),
                position.line,
                position.column,
                recipe.action().cdp_condition(),
            )
            .await
        {
            Ok(result) => self.register_set_result(recipe, result),
            Err(CdpError::BreakpointAlreadyExists) => {
                // Another recipe for a same-named file already speculated on
                // this position. The pending entry will bind it on load.
                debug!(source = source.raw(), "speculative breakpoint already exists");
            }
            Err(error) => {
                warn!(source = source.raw(), %error, "speculative setBreakpointByUrl failed");
                self.registry
                    .lock()
                    .register_resolution_failure(recipe, error.to_string());
            }
        }
    }

    fn register_set_result(
        &self,
        recipe: &Arc<BPRecipeInSource>,
        result: SetBreakpointByUrlResult,
    ) {
        let mut registry = self.registry.lock();
        registry.attach_cdp_id(recipe, result.breakpoint_id);
        for location in result.locations {
            // Locations in scripts the registry has not indexed yet arrive
            // again as breakpointResolved events.
            if let Some(location) = self.script_location(&location) {
                registry.register_breakpoint_as_bound(Breakpoint {
                    recipe: recipe.clone(),
                    location,
                });
            }
        }
    }

    pub fn script_location(&self, location: &CdpLocation) -> Option<LocationInScript> {
        let script = self.scripts.get_script_by_id(&location.script_id)?;
        Some(LocationInScript {
            script,
            position: Position::new(location.line, location.column),
        })
    }

    /// Snap the requested position onto the line's valid breakpoint
    /// positions, preferring the closest candidate at or before the
    /// requested column. Targets without `getPossibleBreakpoints` (and lines
    /// without candidates) keep the requested position.
    async fn refine_column(&self, script: &Arc<Script>, requested: Position) -> Position {
        if self.column_refinement_unsupported.load(Ordering::Relaxed) {
            return requested;
        }
        let candidates = match self
            .client
            .get_possible_breakpoints(script.id(), requested.line, requested.line + 1)
            .await
        {
            Ok(candidates) => candidates,
            Err(CdpError::Unsupported) => {
                debug!("target lacks getPossibleBreakpoints; column refinement disabled");
                self.column_refinement_unsupported
                    .store(true, Ordering::Relaxed);
                return requested;
            }
            Err(error) => {
                warn!(script = %script.id(), %error, "getPossibleBreakpoints failed");
                return requested;
            }
        };
        best_location(&candidates, requested).unwrap_or(requested)
    }
}

/// The candidate matching a requested position best: the last candidate at
/// or before the requested column, else the line's first candidate (a
/// request pointing into the middle of a token still lands on that line).
fn best_location(candidates: &[CdpLocation], requested: Position) -> Option<Position> {
    let on_line: Vec<&CdpLocation> = candidates
        .iter()
        .filter(|candidate| candidate.line == requested.line)
        .collect();
    let wanted = requested.column.unwrap_or(0);
    on_line
        .iter()
        .rev()
        .find(|candidate| candidate.column.unwrap_or(0) <= wanted)
        .or_else(|| on_line.first())
        .map(|candidate| Position::new(candidate.line, candidate.column))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breakpoints::recipe::ActionWhenHit;
    use crate::location::LocationInSource;
    use crate::source_map::IdentityMapper;
    use std::time::Duration;
    use vigil_cdp::{MockCall, MockChromeDebugger, MockScript, ScriptId};
    use vigil_core::PathSensitivity;

    fn identifier(text: &str) -> ResourceIdentifier {
        ResourceIdentifier::parse(text, PathSensitivity::CaseSensitive)
    }

    fn recipe(path: &str, line: u32, column: u32) -> Arc<BPRecipeInSource> {
        Arc::new(BPRecipeInSource::new(
            LocationInSource::new(identifier(path), Position::new(line, Some(column))),
            ActionWhenHit::AlwaysPause,
        ))
    }

    struct Fixture {
        mock: MockChromeDebugger,
        scripts: Arc<ScriptRegistry>,
        orchestrator: BreakpointOrchestrator<MockChromeDebugger>,
    }

    impl Fixture {
        fn new() -> Self {
            let mock = MockChromeDebugger::new();
            let scripts = Arc::new(ScriptRegistry::new());
            let orchestrator = BreakpointOrchestrator::new(
                mock.clone(),
                scripts.clone(),
                Arc::new(Mutex::new(BreakpointRegistry::new())),
                Arc::new(SourceQueue::new(Duration::from_secs(5))),
            );
            Self {
                mock,
                scripts,
                orchestrator,
            }
        }

        /// Register one parsed script in both the mock target and the local
        /// registry, the way `scriptParsed` handling does.
        async fn load_script(&self, id: &str, url: &str, candidates: Vec<(u32, u32)>) {
            self.mock.add_script(MockScript {
                script_id: ScriptId::new(id),
                url: url.to_string(),
                execution_context_id: 1,
                candidates,
            });
            let runtime = identifier(url);
            let development = self.scripts.get_or_add_loaded_source(&runtime, false, true);
            let script = Arc::new(Script::new(
                ScriptId::new(id),
                self.scripts.register_execution_context(1),
                url.to_string(),
                runtime,
                development,
                Vec::new(),
                Arc::new(IdentityMapper),
            ));
            self.scripts
                .register_new_script(ScriptId::new(id), std::future::ready(script))
                .await;
        }
    }

    #[test]
    fn best_location_prefers_the_candidate_at_or_before_the_column() {
        let candidates: Vec<CdpLocation> = [(0, 0), (0, 5), (0, 9)]
            .into_iter()
            .map(|(line, column)| CdpLocation {
                script_id: ScriptId::new("1"),
                line,
                column: Some(column),
            })
            .collect();

        let best = |column| best_location(&candidates, Position::new(0, Some(column)));
        assert_eq!(best(7), Some(Position::new(0, Some(5))));
        assert_eq!(best(5), Some(Position::new(0, Some(5))));
        assert_eq!(best(2), Some(Position::new(0, Some(0))));
        assert_eq!(best(100), Some(Position::new(0, Some(9))));

        // Requested column before every candidate: fall back to the line's
        // first candidate rather than missing the line entirely.
        let late: Vec<CdpLocation> = vec![CdpLocation {
            script_id: ScriptId::new("1"),
            line: 0,
            column: Some(4),
        }];
        assert_eq!(
            best_location(&late, Position::new(0, Some(1))),
            Some(Position::new(0, Some(4)))
        );
        assert_eq!(best_location(&[], Position::new(0, Some(1))), None);
    }

    #[tokio::test]
    async fn binds_in_a_loaded_script_with_column_refinement() {
        let fixture = Fixture::new();
        fixture
            .load_script("7", "file:///srv/app.js", vec![(3, 4), (3, 12)])
            .await;

        let requested = vec![recipe("/srv/app.js", 3, 6)];
        let statuses = fixture
            .orchestrator
            .update_breakpoints_for_source(&identifier("/srv/app.js"), &requested)
            .await
            .unwrap();

        assert_eq!(statuses.len(), 1);
        assert!(statuses[0].1.is_verified());
        match &statuses[0].1 {
            BreakpointStatus::Bound { breakpoints, .. } => {
                assert_eq!(breakpoints[0].location.position, Position::new(3, Some(4)));
            }
            BreakpointStatus::Unbound { description } => panic!("unbound: {description}"),
        }

        let calls = fixture.mock.calls();
        assert!(matches!(
            calls[0],
            MockCall::GetPossibleBreakpoints { start_line: 3, end_line: 4, .. }
        ));
        assert!(matches!(
            &calls[1],
            MockCall::SetBreakpointByUrl { selector: UrlSelector::UrlRegex(r), line: 3, column: Some(4), .. }
                if r == &exact_url_regex("file:///srv/app.js")
        ));
        assert_eq!(fixture.mock.max_concurrent_calls(), 1);
    }

    #[tokio::test]
    async fn already_existing_breakpoint_counts_as_bound() {
        let fixture = Fixture::new();
        fixture
            .load_script("7", "file:///srv/app.js", vec![(3, 4)])
            .await;

        // Occupy the exact selector/position the orchestrator will use.
        fixture
            .mock
            .set_breakpoint_by_url(
                UrlSelector::UrlRegex(exact_url_regex("file:///srv/app.js")),
                3,
                Some(4),
                None,
            )
            .await
            .unwrap();

        let requested = vec![recipe("/srv/app.js", 3, 4)];
        let statuses = fixture
            .orchestrator
            .update_breakpoints_for_source(&identifier("/srv/app.js"), &requested)
            .await
            .unwrap();
        assert!(statuses[0].1.is_verified());
        assert_eq!(fixture.mock.breakpoint_count(), 1, "no second breakpoint");
    }

    #[tokio::test]
    async fn refinement_is_disabled_after_the_first_unsupported_reply() {
        let fixture = Fixture::new();
        fixture.mock.disable_possible_breakpoints();
        fixture
            .load_script("7", "file:///srv/app.js", vec![(3, 4)])
            .await;

        fixture
            .orchestrator
            .update_breakpoints_for_source(&identifier("/srv/app.js"), &[recipe("/srv/app.js", 3, 1)])
            .await
            .unwrap();
        fixture
            .orchestrator
            .update_breakpoints_for_source(
                &identifier("/srv/app.js"),
                &[recipe("/srv/app.js", 3, 1), recipe("/srv/app.js", 5, 0)],
            )
            .await
            .unwrap();

        let probes = fixture
            .mock
            .calls()
            .iter()
            .filter(|call| matches!(call, MockCall::GetPossibleBreakpoints { .. }))
            .count();
        assert_eq!(probes, 1, "one probe latches the capability");

        // Without refinement the requested column goes out verbatim.
        assert!(fixture.mock.calls().iter().any(|call| matches!(
            call,
            MockCall::SetBreakpointByUrl { line: 3, column: Some(1), .. }
        )));
    }

    #[tokio::test]
    async fn unresolved_source_parks_the_recipe_and_speculates_by_base_name() {
        let fixture = Fixture::new();

        let requested = vec![recipe("/web/index.js", 0, 0)];
        let statuses = fixture
            .orchestrator
            .update_breakpoints_for_source(&identifier("/web/index.js"), &requested)
            .await
            .unwrap();

        assert!(!statuses[0].1.is_verified());
        assert!(fixture.orchestrator.has_pending_recipes());
        assert!(matches!(
            &fixture.mock.calls()[0],
            MockCall::SetBreakpointByUrl { selector: UrlSelector::UrlRegex(r), .. }
                if r == &base_name_regex("index")
        ));

        // The script loads later; pending recipes bind on the retry.
        fixture
            .load_script("12", "http://localhost/web/index.js", vec![(0, 0)])
            .await;
        let script = fixture
            .scripts
            .get_script_by_id(&ScriptId::new("12"))
            .unwrap();
        let attempted = fixture.orchestrator.resolve_pending_for_script(&script).await;
        assert_eq!(attempted.len(), 1);
        assert!(!fixture.orchestrator.has_pending_recipes());

        let registry = fixture.orchestrator.registry.lock();
        assert!(registry.status(&requested[0]).is_verified());
    }

    #[tokio::test]
    async fn concurrent_removal_and_pending_retry_leave_no_orphans() {
        let fixture = Fixture::new();
        let requested = vec![recipe("/web/index.js", 0, 0)];
        fixture
            .orchestrator
            .update_breakpoints_for_source(&identifier("/web/index.js"), &requested)
            .await
            .unwrap();
        fixture
            .load_script("12", "http://localhost/web/index.js", vec![(0, 0)])
            .await;
        let script = fixture
            .scripts
            .get_script_by_id(&ScriptId::new("12"))
            .unwrap();

        // A full-replace removal racing the load-time retry: whichever wins
        // the queue slot, nothing stays set on the target and nothing stays
        // parked.
        let source = identifier("/web/index.js");
        let (_attempted, removed) = tokio::join!(
            fixture.orchestrator.resolve_pending_for_script(&script),
            fixture
                .orchestrator
                .update_breakpoints_for_source(&source, &[]),
        );
        removed.unwrap();
        assert!(!fixture.orchestrator.has_pending_recipes());
        assert_eq!(fixture.mock.breakpoint_count(), 0);
        assert_eq!(fixture.mock.max_concurrent_calls(), 1);
    }

    #[tokio::test]
    async fn an_empty_request_removes_everything_from_the_target() {
        let fixture = Fixture::new();
        fixture
            .load_script("7", "file:///srv/app.js", vec![(3, 4)])
            .await;

        let requested = vec![recipe("/srv/app.js", 3, 4)];
        fixture
            .orchestrator
            .update_breakpoints_for_source(&identifier("/srv/app.js"), &requested)
            .await
            .unwrap();
        assert_eq!(fixture.mock.breakpoint_count(), 1);

        fixture
            .orchestrator
            .update_breakpoints_for_source(&identifier("/srv/app.js"), &[])
            .await
            .unwrap();
        assert_eq!(fixture.mock.breakpoint_count(), 0);
        assert!(fixture
            .mock
            .calls()
            .iter()
            .any(|call| matches!(call, MockCall::RemoveBreakpoint(_))));
    }

    #[tokio::test]
    async fn an_unchanged_request_does_not_touch_the_target() {
        let fixture = Fixture::new();
        fixture
            .load_script("7", "file:///srv/app.js", vec![(3, 4)])
            .await;

        let requested = vec![recipe("/srv/app.js", 3, 4)];
        let first = fixture
            .orchestrator
            .update_breakpoints_for_source(&identifier("/srv/app.js"), &requested)
            .await
            .unwrap();
        let calls_after_first = fixture.mock.calls().len();

        // Resend the surviving recipes, as a client re-issuing the same
        // setBreakpoints does.
        let resent: Vec<Arc<BPRecipeInSource>> =
            first.iter().map(|(recipe, _)| recipe.clone()).collect();
        let second = fixture
            .orchestrator
            .update_breakpoints_for_source(&identifier("/srv/app.js"), &resent)
            .await
            .unwrap();

        assert!(second[0].1.is_verified());
        assert_eq!(fixture.mock.calls().len(), calls_after_first);
        assert_eq!(fixture.mock.breakpoint_count(), 1);
    }
}

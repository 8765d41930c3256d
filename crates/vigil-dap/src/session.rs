//! The debug session: the protocol-agnostic core tying the breakpoint
//! subsystem to a [`ChromeDebugger`] target.
//!
//! The embedder owns the transports. It feeds DAP requests into
//! [`DebugSession::set_breakpoints`] / [`DebugSession::breakpoint_locations`],
//! forwards target events into the `on_*` handlers, and drains the
//! [`SessionEvent`] channel for asynchronous client notifications
//! (late-verification `breakpoint` events, log-breakpoint output).

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use vigil_cdp::{
    BreakpointResolvedEvent, CdpError, ChromeDebugger, ExecutionContextId, PausedEvent,
    ScriptParsedEvent,
};
use vigil_core::{PathSensitivity, Position, ResourceIdentifier};

use crate::breakpoints::recipe::{ActionParseError, ActionWhenHit, RecipeHandle};
use crate::breakpoints::{
    BPRecipeInSource, BreakOnLoadMode, BreakOnLoadStrategy, BreakpointOrchestrator,
    BreakpointRegistry, BreakpointStatus, SourceQueue,
};
use crate::dap;
use crate::error::{DebugError, DebugResult};
use crate::location::{LocationInLoadedSource, LocationInSource};
use crate::scripts::{Script, ScriptRegistry};
use crate::source_map::SourceMapResolver;

#[derive(Clone)]
pub struct SessionConfig {
    pub path_sensitivity: PathSensitivity,
    pub break_on_load: BreakOnLoadMode,
    /// Upper bound on one queued per-source breakpoint operation.
    pub set_breakpoints_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path_sensitivity: PathSensitivity::host_default(),
            break_on_load: BreakOnLoadMode::default(),
            set_breakpoints_timeout: Duration::from_millis(5000),
        }
    }
}

/// Asynchronous notifications for the client, drained by the embedder.
#[derive(Debug)]
pub enum SessionEvent {
    /// A breakpoint's status changed outside a request/response cycle
    /// (late binding, unbinding on context destruction).
    BreakpointChanged(dap::BreakpointEventBody),
    /// Output produced by a log-message breakpoint.
    Output { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Breakpoint,
    Pause,
}

impl StopReason {
    pub fn as_dap_reason(&self) -> &'static str {
        match self {
            StopReason::Breakpoint => "breakpoint",
            StopReason::Pause => "pause",
        }
    }
}

/// What the session decided about a `Debugger.paused` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseDisposition {
    /// Execution stays paused; report a stop to the client.
    Stay(StopReason),
    /// The session resumed the target itself (log breakpoint, unmatched hit
    /// count, break-on-load pause with nothing to stop for). The client
    /// never learns a pause happened.
    AutoResumed,
}

pub struct DebugSession<C: ChromeDebugger> {
    client: C,
    config: SessionConfig,
    scripts: Arc<ScriptRegistry>,
    registry: Arc<Mutex<BreakpointRegistry>>,
    orchestrator: BreakpointOrchestrator<C>,
    strategy: BreakOnLoadStrategy,
    source_maps: Arc<dyn SourceMapResolver>,
    /// Hits seen so far per hit-count recipe. Consulted before increment, so
    /// a condition sees `0` on the first hit.
    hit_counts: Mutex<HashMap<RecipeHandle, u64>>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl<C: ChromeDebugger> DebugSession<C> {
    pub fn new(
        client: C,
        config: SessionConfig,
        source_maps: Arc<dyn SourceMapResolver>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let scripts = Arc::new(ScriptRegistry::new());
        let registry = Arc::new(Mutex::new(BreakpointRegistry::new()));
        let queue = Arc::new(SourceQueue::new(config.set_breakpoints_timeout));
        let orchestrator = BreakpointOrchestrator::new(
            client.clone(),
            scripts.clone(),
            registry.clone(),
            queue,
        );
        let strategy = BreakOnLoadStrategy::for_mode(config.break_on_load);
        let (events, receiver) = mpsc::unbounded_channel();
        (
            Self {
                client,
                config,
                scripts,
                registry,
                orchestrator,
                strategy,
                source_maps,
                hit_counts: Mutex::new(HashMap::new()),
                events,
            },
            receiver,
        )
    }

    pub fn scripts(&self) -> &Arc<ScriptRegistry> {
        &self.scripts
    }

    /// Handle a `setBreakpoints` request: full-replace for the source.
    ///
    /// Always returns exactly one result per requested row, in request
    /// order. A row with an unparseable hit condition comes back unverified
    /// with the parse error; it never aborts the other rows.
    pub async fn set_breakpoints(
        &self,
        source: &dap::Source,
        rows: &[dap::SourceBreakpoint],
    ) -> DebugResult<Vec<dap::Breakpoint>> {
        let Some(path) = source.path.as_deref() else {
            return Err(DebugError::InvalidRequest(
                "setBreakpoints requires a source path".to_string(),
            ));
        };
        let identifier = ResourceIdentifier::parse(path, self.config.path_sensitivity);

        let mut requested: Vec<Arc<BPRecipeInSource>> = Vec::with_capacity(rows.len());
        let mut rejected: HashMap<usize, String> = HashMap::new();
        for (index, row) in rows.iter().enumerate() {
            let action = ActionWhenHit::parse(
                row.condition.as_deref(),
                row.hit_condition.as_deref(),
                row.log_message.as_deref(),
            );
            match action {
                Ok(action) => requested.push(Arc::new(BPRecipeInSource::new(
                    LocationInSource::new(identifier.clone(), row.position()),
                    action,
                ))),
                Err(error @ ActionParseError::Ambiguous) => {
                    return Err(DebugError::internal(
                        "ambiguous-action-when-hit",
                        error.to_string(),
                    ));
                }
                Err(error @ ActionParseError::InvalidHitCount { .. }) => {
                    rejected.insert(index, error.to_string());
                }
            }
        }

        let unresolved = self.scripts.resolve_loaded_source(&identifier).is_none();
        let statuses = self
            .orchestrator
            .update_breakpoints_for_source(&identifier, &requested)
            .await?;

        // Break-on-load engages after the user's breakpoints are registered:
        // a user breakpoint already sitting on a script's entry location
        // must win the slot, the entry breakpoint then rides along on it.
        if unresolved && !requested.is_empty() {
            self.strategy
                .on_unresolved_source(&self.client, &identifier)
                .await?;
        }

        let mut reconciled = statuses.into_iter();
        let mut results = Vec::with_capacity(rows.len());
        for index in 0..rows.len() {
            if let Some(message) = rejected.remove(&index) {
                results.push(dap::Breakpoint::unverified(None, message));
                continue;
            }
            match reconciled.next() {
                Some((recipe, status)) => results.push(self.to_dap_breakpoint(&recipe, &status)),
                None => {
                    return Err(DebugError::internal(
                        "set-breakpoints-result-mismatch",
                        format!("fewer reconciled breakpoints than requested rows ({index})"),
                    ));
                }
            }
        }
        Ok(results)
    }

    /// Handle a `breakpointLocations` request: the valid breakpoint
    /// positions within a line range of a source.
    ///
    /// An unknown source yields no locations; a target without
    /// `getPossibleBreakpoints` degrades to echoing the requested line.
    pub async fn breakpoint_locations(
        &self,
        args: &dap::BreakpointLocationsArguments,
    ) -> DebugResult<Vec<dap::BreakpointLocation>> {
        let Some(path) = args.source.path.as_deref() else {
            return Err(DebugError::InvalidRequest(
                "breakpointLocations requires a source path".to_string(),
            ));
        };
        let identifier = ResourceIdentifier::parse(path, self.config.path_sensitivity);
        let Some(source) = self.scripts.resolve_loaded_source(&identifier) else {
            return Ok(Vec::new());
        };

        let start = Position::new(
            args.line.saturating_sub(1),
            Some(args.column.map_or(0, |column| column.saturating_sub(1))),
        );
        let end_line = args.end_line.map_or(start.line, |line| line.saturating_sub(1));
        let line_span = end_line.saturating_sub(start.line);

        let anchor = LocationInLoadedSource {
            source: source.clone(),
            position: Position::line_start(start.line),
        };
        let Ok(in_scripts) = anchor.to_script_locations(&self.scripts) else {
            return Ok(Vec::new());
        };

        let mut positions: BTreeSet<Position> = BTreeSet::new();
        for location in in_scripts {
            let from = location.position.line;
            match self
                .client
                .get_possible_breakpoints(location.script.id(), from, from + line_span + 1)
                .await
            {
                Ok(candidates) => {
                    for candidate in candidates {
                        let in_script = crate::location::LocationInScript {
                            script: location.script.clone(),
                            position: Position::new(candidate.line, candidate.column),
                        };
                        let back = in_script.to_loaded_source_location(&self.scripts);
                        if Arc::ptr_eq(&back.source, &source) {
                            positions.insert(back.position);
                        }
                    }
                }
                Err(CdpError::Unsupported) => {
                    positions.insert(Position::line_start(start.line));
                }
                Err(error) => {
                    warn!(script = %location.script.id(), %error, "getPossibleBreakpoints failed");
                }
            }
        }

        Ok(positions
            .into_iter()
            .filter(|position| position.line >= start.line && position.line <= end_line)
            .map(dap::BreakpointLocation::from_position)
            .collect())
    }

    /// Handle `Debugger.scriptParsed`: build the immutable script model
    /// (mapper and sources included) and retry breakpoints that were waiting
    /// for any source this script provides.
    pub async fn on_script_parsed(&self, event: &ScriptParsedEvent) -> DebugResult<Arc<Script>> {
        let context = self.scripts.register_execution_context(event.execution_context_id);

        let factory = {
            let scripts = self.scripts.clone();
            let source_maps = self.source_maps.clone();
            let sensitivity = self.config.path_sensitivity;
            let event = event.clone();
            async move {
                let mapper = source_maps.resolve(&event.url, event.source_map_url.as_deref());
                let runtime = ResourceIdentifier::parse(&event.url, sensitivity);
                let development = scripts.get_or_add_loaded_source(&runtime, false, true);
                let mapped = mapper
                    .authored_sources()
                    .iter()
                    .map(|source| scripts.get_or_add_loaded_source(source, false, true))
                    .collect();
                Arc::new(Script::new(
                    event.script_id.clone(),
                    context,
                    event.url.clone(),
                    runtime,
                    development,
                    mapped,
                    mapper,
                ))
            }
        };
        let script = self
            .scripts
            .register_new_script(event.script_id.clone(), factory)
            .await;
        debug!(script = %script.id(), url = script.url(), "script parsed");

        let attempted = self.orchestrator.resolve_pending_for_script(&script).await;
        self.notify_breakpoint_changed(attempted);
        Ok(script)
    }

    /// Handle `Debugger.breakpointResolved`: a latent by-URL registration
    /// bound in a newly-parsed script.
    pub fn on_breakpoint_resolved(&self, event: &BreakpointResolvedEvent) {
        let Some(location) = self.orchestrator.script_location(&event.location) else {
            // The script has not gone through on_script_parsed yet; the
            // pending-recipe retry will bind it there instead.
            debug!(breakpoint = %event.breakpoint_id, "resolution for unknown script");
            return;
        };
        let recipe = self
            .registry
            .lock()
            .on_breakpoint_resolved(&event.breakpoint_id, location);
        if let Some(recipe) = recipe {
            self.notify_breakpoint_changed([recipe]);
        }
    }

    /// Handle `Debugger.paused`: decide whether the client sees a stop.
    pub async fn on_paused(&self, event: &PausedEvent) -> DebugResult<PauseDisposition> {
        if event.is_instrumentation_pause() {
            return self.on_break_on_load_pause(event).await;
        }
        if event.hit_breakpoints.is_empty() {
            // Pause, debugger statement, exception: not ours to filter.
            return Ok(PauseDisposition::Stay(StopReason::Pause));
        }

        let mut recipes = Vec::new();
        let mut entry_hits = false;
        {
            let registry = self.registry.lock();
            for id in &event.hit_breakpoints {
                if self.strategy.is_entry_breakpoint(id) {
                    entry_hits = true;
                    continue;
                }
                if let Some(recipe) = registry.recipe_for_cdp_id(id) {
                    // One recipe can own several target breakpoints (exact
                    // and speculative); count the hit once.
                    if !recipes.iter().any(|known| Arc::ptr_eq(known, &recipe)) {
                        recipes.push(recipe);
                    }
                } else {
                    debug!(breakpoint = %id, "pause on unknown breakpoint id");
                }
            }
        }

        if recipes.is_empty() {
            if entry_hits {
                return self.on_break_on_load_pause(event).await;
            }
            // Only stale ids: better a spurious stop than a missed one.
            return Ok(PauseDisposition::Stay(StopReason::Pause));
        }

        let mut stay = false;
        for recipe in &recipes {
            match recipe.action() {
                // Conditions were evaluated natively by the target; hitting
                // means the condition held.
                ActionWhenHit::AlwaysPause | ActionWhenHit::ConditionalPause { .. } => stay = true,
                ActionWhenHit::PauseOnHitCount { condition } => {
                    let hits_before = {
                        let mut counts = self.hit_counts.lock();
                        let count = counts.entry(RecipeHandle(recipe.clone())).or_insert(0);
                        let before = *count;
                        *count += 1;
                        before
                    };
                    if condition.should_pause(hits_before) {
                        stay = true;
                    }
                }
                ActionWhenHit::LogMessage { message } => {
                    let _ = self.events.send(SessionEvent::Output {
                        message: message.clone(),
                    });
                }
            }
        }

        if stay {
            Ok(PauseDisposition::Stay(StopReason::Breakpoint))
        } else {
            self.client.resume().await?;
            Ok(PauseDisposition::AutoResumed)
        }
    }

    /// A break-on-load pause (instrumentation or entry breakpoint): set the
    /// breakpoints that were waiting for this script, then stay paused only
    /// if one of them landed exactly at the pause location.
    async fn on_break_on_load_pause(&self, event: &PausedEvent) -> DebugResult<PauseDisposition> {
        let Some(location) = &event.location else {
            self.client.resume().await?;
            return Ok(PauseDisposition::AutoResumed);
        };

        if let Some(script) = self.scripts.get_script_by_id(&location.script_id) {
            let attempted = self.orchestrator.resolve_pending_for_script(&script).await;
            self.notify_breakpoint_changed(attempted);
        }

        let stays = self.registry.lock().has_bound_breakpoint_at(
            &location.script_id,
            Position::new(location.line, location.column),
        );
        if stays {
            Ok(PauseDisposition::Stay(StopReason::Breakpoint))
        } else {
            self.client.resume().await?;
            Ok(PauseDisposition::AutoResumed)
        }
    }

    /// Handle `Runtime.executionContextDestroyed`: scripts of the context go
    /// away, and breakpoints bound in them revert to unverified.
    pub fn on_execution_context_destroyed(&self, id: ExecutionContextId) {
        let removed = self.scripts.destroy_execution_context(id);
        if removed.is_empty() {
            return;
        }
        debug!(context = id, scripts = removed.len(), "execution context destroyed");
        let affected = self.registry.lock().drop_bindings_for_scripts(&removed);
        self.notify_breakpoint_changed(affected);
    }

    fn notify_breakpoint_changed(
        &self,
        recipes: impl IntoIterator<Item = Arc<BPRecipeInSource>>,
    ) {
        for recipe in recipes {
            let status = self.registry.lock().status(&recipe);
            let breakpoint = self.to_dap_breakpoint(&recipe, &status);
            let _ = self.events.send(SessionEvent::BreakpointChanged(
                dap::BreakpointEventBody {
                    reason: "changed",
                    breakpoint,
                },
            ));
        }
    }

    fn to_dap_breakpoint(
        &self,
        recipe: &Arc<BPRecipeInSource>,
        status: &BreakpointStatus,
    ) -> dap::Breakpoint {
        let Some(id) = self.registry.lock().client_id(recipe) else {
            return dap::Breakpoint::unverified(None, "breakpoint is no longer registered");
        };
        match status {
            BreakpointStatus::Bound { breakpoints, .. } => {
                // First binding is the stable tie-break; report it in the
                // coordinates of the source the client named.
                let location = breakpoints[0].location.to_loaded_source_location(&self.scripts);
                dap::Breakpoint::verified_at(id, location.position)
            }
            BreakpointStatus::Unbound { description } => {
                dap::Breakpoint::unverified(Some(id), description.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_map::NoSourceMaps;
    use vigil_cdp::{CdpLocation, MockChromeDebugger, MockScript, PauseReason, ScriptId};

    fn session(
        mock: &MockChromeDebugger,
        config: SessionConfig,
    ) -> (DebugSession<MockChromeDebugger>, mpsc::UnboundedReceiver<SessionEvent>) {
        DebugSession::new(mock.clone(), config, Arc::new(NoSourceMaps))
    }

    fn config() -> SessionConfig {
        SessionConfig {
            path_sensitivity: PathSensitivity::CaseSensitive,
            ..SessionConfig::default()
        }
    }

    async fn load_script(
        mock: &MockChromeDebugger,
        session: &DebugSession<MockChromeDebugger>,
        id: &str,
        url: &str,
        candidates: Vec<(u32, u32)>,
    ) {
        let (parsed, resolved) = mock.add_script(MockScript {
            script_id: ScriptId::new(id),
            url: url.to_string(),
            execution_context_id: 1,
            candidates,
        });
        session.on_script_parsed(&parsed).await.unwrap();
        for event in resolved {
            session.on_breakpoint_resolved(&event);
        }
    }

    fn row(line: u32) -> dap::SourceBreakpoint {
        dap::SourceBreakpoint {
            line,
            column: Some(1),
            ..Default::default()
        }
    }

    fn paused_at(id: &vigil_cdp::CdpBreakpointId, script: &str, line: u32) -> PausedEvent {
        PausedEvent {
            reason: PauseReason::Breakpoint,
            hit_breakpoints: vec![id.clone()],
            location: Some(CdpLocation {
                script_id: ScriptId::new(script),
                line,
                column: Some(0),
            }),
        }
    }

    #[tokio::test]
    async fn results_keep_request_order_and_count() {
        let mock = MockChromeDebugger::new();
        let (session, _events) = session(&mock, config());
        load_script(&mock, &session, "1", "file:///srv/app.js", vec![(0, 0), (2, 0)]).await;

        let rows = vec![
            row(1),
            dap::SourceBreakpoint {
                line: 3,
                hit_condition: Some(">>nonsense".to_string()),
                ..Default::default()
            },
            row(3),
        ];
        let results = session
            .set_breakpoints(&dap::Source::from_path("/srv/app.js"), &rows)
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(results[0].verified);
        assert!(!results[1].verified, "bad hit condition stays unverified");
        assert!(results[1].message.as_deref().unwrap().contains("hit count"));
        assert!(results[2].verified);
        // 1-based client coordinates on the way out.
        assert_eq!(results[0].line, Some(1));
        assert_eq!(results[2].line, Some(3));
    }

    #[tokio::test]
    async fn ambiguous_rows_are_an_internal_error() {
        let mock = MockChromeDebugger::new();
        let (session, _events) = session(&mock, config());

        let rows = vec![dap::SourceBreakpoint {
            line: 1,
            condition: Some("x".to_string()),
            log_message: Some("m".to_string()),
            ..Default::default()
        }];
        let error = session
            .set_breakpoints(&dap::Source::from_path("/srv/app.js"), &rows)
            .await
            .unwrap_err();
        assert!(error.is_internal());
    }

    #[tokio::test]
    async fn a_missing_path_is_an_invalid_request() {
        let mock = MockChromeDebugger::new();
        let (session, _events) = session(&mock, config());
        let source = dap::Source {
            name: Some("eval".to_string()),
            path: None,
            source_reference: Some(1001),
        };
        let error = session.set_breakpoints(&source, &[row(1)]).await.unwrap_err();
        assert!(matches!(error, DebugError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn hit_count_breakpoints_auto_resume_until_the_condition_matches() {
        let mock = MockChromeDebugger::new();
        let (session, _events) = session(&mock, config());
        load_script(&mock, &session, "1", "file:///srv/app.js", vec![(4, 0)]).await;

        let rows = vec![dap::SourceBreakpoint {
            line: 5,
            hit_condition: Some("> 0".to_string()),
            ..Default::default()
        }];
        session
            .set_breakpoints(&dap::Source::from_path("/srv/app.js"), &rows)
            .await
            .unwrap();
        let id = mock.breakpoint_ids().pop().unwrap();

        // First hit: 0 hits before, `> 0` does not match yet.
        let first = session.on_paused(&paused_at(&id, "1", 4)).await.unwrap();
        assert_eq!(first, PauseDisposition::AutoResumed);
        assert_eq!(mock.resume_count(), 1);

        let second = session.on_paused(&paused_at(&id, "1", 4)).await.unwrap();
        assert_eq!(second, PauseDisposition::Stay(StopReason::Breakpoint));
        assert_eq!(mock.resume_count(), 1);
    }

    #[tokio::test]
    async fn log_breakpoints_emit_output_and_resume() {
        let mock = MockChromeDebugger::new();
        let (session, mut events) = session(&mock, config());
        load_script(&mock, &session, "1", "file:///srv/app.js", vec![(4, 0)]).await;

        let rows = vec![dap::SourceBreakpoint {
            line: 5,
            log_message: Some("reached checkpoint".to_string()),
            ..Default::default()
        }];
        session
            .set_breakpoints(&dap::Source::from_path("/srv/app.js"), &rows)
            .await
            .unwrap();
        let id = mock.breakpoint_ids().pop().unwrap();

        let disposition = session.on_paused(&paused_at(&id, "1", 4)).await.unwrap();
        assert_eq!(disposition, PauseDisposition::AutoResumed);
        assert_eq!(mock.resume_count(), 1);

        match events.try_recv().unwrap() {
            SessionEvent::Output { message } => assert_eq!(message, "reached checkpoint"),
            other => panic!("expected output event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn a_pause_without_hit_breakpoints_is_reported_as_is() {
        let mock = MockChromeDebugger::new();
        let (session, _events) = session(&mock, config());
        let event = PausedEvent {
            reason: PauseReason::Other("debugCommand".to_string()),
            hit_breakpoints: Vec::new(),
            location: None,
        };
        assert_eq!(
            session.on_paused(&event).await.unwrap(),
            PauseDisposition::Stay(StopReason::Pause)
        );
        assert_eq!(mock.resume_count(), 0);
    }

    #[tokio::test]
    async fn context_destruction_unverifies_and_notifies() {
        let mock = MockChromeDebugger::new();
        let (session, mut events) = session(&mock, config());
        load_script(&mock, &session, "1", "file:///srv/app.js", vec![(0, 0)]).await;

        let results = session
            .set_breakpoints(&dap::Source::from_path("/srv/app.js"), &[row(1)])
            .await
            .unwrap();
        assert!(results[0].verified);

        session.on_execution_context_destroyed(1);
        match events.try_recv().unwrap() {
            SessionEvent::BreakpointChanged(body) => {
                assert_eq!(body.reason, "changed");
                assert!(!body.breakpoint.verified);
                assert_eq!(body.breakpoint.id, results[0].id);
            }
            other => panic!("expected breakpoint event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn breakpoint_locations_lists_candidates_one_based() {
        let mock = MockChromeDebugger::new();
        let (session, _events) = session(&mock, config());
        load_script(
            &mock,
            &session,
            "1",
            "file:///srv/app.js",
            vec![(2, 0), (2, 8), (3, 4), (9, 0)],
        )
        .await;

        let args = dap::BreakpointLocationsArguments {
            source: dap::Source::from_path("/srv/app.js"),
            line: 3,
            column: None,
            end_line: Some(4),
            end_column: None,
        };
        let locations = session.breakpoint_locations(&args).await.unwrap();
        assert_eq!(
            locations,
            vec![
                dap::BreakpointLocation { line: 3, column: Some(1) },
                dap::BreakpointLocation { line: 3, column: Some(9) },
                dap::BreakpointLocation { line: 4, column: Some(5) },
            ]
        );

        // Unknown source: nothing to report, not an error.
        let unknown = dap::BreakpointLocationsArguments {
            source: dap::Source::from_path("/srv/other.js"),
            line: 1,
            column: None,
            end_line: None,
            end_column: None,
        };
        assert!(session.breakpoint_locations(&unknown).await.unwrap().is_empty());
    }
}

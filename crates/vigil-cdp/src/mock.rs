//! Deterministic, in-memory CDP test double.
//!
//! The mock keeps a table of "parsed scripts" with per-line candidate
//! breakpoint columns, enforces the real target's duplicate-location error,
//! and records every call so tests can assert on call order and on
//! serialization (two overlapping calls for one source would show up as
//! `max_concurrent_calls() > 1`).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;

use crate::{
    BreakpointResolvedEvent, CdpBreakpointId, CdpError, CdpLocation, ChromeDebugger,
    ExecutionContextId, Result, ScriptId, ScriptParsedEvent, SetBreakpointByUrlResult,
    SetBreakpointResult, UrlSelector,
};

/// One scripted "parsed script" inside the mock target.
#[derive(Debug, Clone)]
pub struct MockScript {
    pub script_id: ScriptId,
    pub url: String,
    pub execution_context_id: ExecutionContextId,
    /// Valid breakpoint positions, i.e. what `getPossibleBreakpoints` would
    /// report. Empty means "no candidate metadata": breakpoints bind exactly
    /// where requested.
    pub candidates: Vec<(u32, u32)>,
}

/// A call observed by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    SetBreakpointByUrl {
        selector: UrlSelector,
        line: u32,
        column: Option<u32>,
        condition: Option<String>,
    },
    SetBreakpoint {
        script_id: ScriptId,
        line: u32,
        column: Option<u32>,
    },
    RemoveBreakpoint(CdpBreakpointId),
    GetPossibleBreakpoints {
        script_id: ScriptId,
        start_line: u32,
        end_line: u32,
    },
    SetInstrumentationBreakpoint(String),
    RemoveInstrumentationBreakpoint(String),
    Resume,
}

#[derive(Debug, Clone)]
struct StoredBreakpoint {
    selector: Option<UrlSelector>,
    line: u32,
    column: Option<u32>,
    #[allow(dead_code)]
    condition: Option<String>,
}

#[derive(Default)]
struct MockState {
    scripts: Vec<MockScript>,
    breakpoints: HashMap<CdpBreakpointId, StoredBreakpoint>,
    instrumentation: Vec<String>,
    calls: Vec<MockCall>,
    next_breakpoint_id: u64,
    possible_breakpoints_supported: bool,
    in_flight: usize,
    max_in_flight: usize,
    resume_count: usize,
}

#[derive(Clone)]
pub struct MockChromeDebugger {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockChromeDebugger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChromeDebugger {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                possible_breakpoints_supported: true,
                ..Default::default()
            })),
        }
    }

    /// Simulate an older target without `Debugger.getPossibleBreakpoints`.
    pub fn disable_possible_breakpoints(&self) {
        self.state.lock().possible_breakpoints_supported = false;
    }

    /// Add a parsed script and report which latent by-URL breakpoints now
    /// bind in it, the way a real target emits `breakpointResolved` right
    /// after `scriptParsed`.
    pub fn add_script(&self, script: MockScript) -> (ScriptParsedEvent, Vec<BreakpointResolvedEvent>) {
        let mut state = self.state.lock();
        let parsed = ScriptParsedEvent {
            script_id: script.script_id.clone(),
            url: script.url.clone(),
            execution_context_id: script.execution_context_id,
            source_map_url: None,
        };

        let mut resolved = Vec::new();
        for (id, bp) in &state.breakpoints {
            let Some(selector) = &bp.selector else { continue };
            if selector_matches(selector, &script.url) {
                resolved.push(BreakpointResolvedEvent {
                    breakpoint_id: id.clone(),
                    location: snap(&script, bp.line, bp.column),
                });
            }
        }
        resolved.sort_by(|a, b| a.breakpoint_id.cmp(&b.breakpoint_id));

        state.scripts.push(script);
        (parsed, resolved)
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    /// Highest number of protocol calls ever in flight at once. Serialized
    /// callers keep this at 1.
    pub fn max_concurrent_calls(&self) -> usize {
        self.state.lock().max_in_flight
    }

    pub fn breakpoint_count(&self) -> usize {
        self.state.lock().breakpoints.len()
    }

    /// Ids of all currently-set breakpoints, in allocation order.
    pub fn breakpoint_ids(&self) -> Vec<CdpBreakpointId> {
        let mut ids: Vec<CdpBreakpointId> = self.state.lock().breakpoints.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn resume_count(&self) -> usize {
        self.state.lock().resume_count
    }

    pub fn instrumentation_breakpoints(&self) -> Vec<String> {
        self.state.lock().instrumentation.clone()
    }

    fn record(&self, call: MockCall) -> CallGuard {
        tracing::debug!(?call, "mock CDP call");
        let mut state = self.state.lock();
        state.calls.push(call);
        state.in_flight += 1;
        state.max_in_flight = state.max_in_flight.max(state.in_flight);
        CallGuard {
            state: self.state.clone(),
        }
    }

    fn alloc_breakpoint_id(state: &mut MockState) -> CdpBreakpointId {
        state.next_breakpoint_id += 1;
        CdpBreakpointId::new(format!("mock-bp-{}", state.next_breakpoint_id))
    }
}

struct CallGuard {
    state: Arc<Mutex<MockState>>,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.state.lock().in_flight -= 1;
    }
}

fn selector_matches(selector: &UrlSelector, url: &str) -> bool {
    match selector {
        UrlSelector::Url(exact) => exact == url,
        UrlSelector::UrlRegex(pattern) => Regex::new(pattern)
            .map(|re| re.is_match(url))
            .unwrap_or(false),
    }
}

/// Bind a requested position to a script's candidate table the way the real
/// target does: the first candidate at-or-after the requested column on the
/// requested line, or exactly the requested position when the script has no
/// candidate metadata for that line.
fn snap(script: &MockScript, line: u32, column: Option<u32>) -> CdpLocation {
    let wanted = column.unwrap_or(0);
    let snapped = script
        .candidates
        .iter()
        .filter(|(l, _)| *l == line)
        .map(|(_, c)| *c)
        .find(|c| *c >= wanted)
        .or_else(|| {
            script
                .candidates
                .iter()
                .filter(|(l, _)| *l == line)
                .map(|(_, c)| *c)
                .last()
        });
    match snapped {
        Some(col) => CdpLocation {
            script_id: script.script_id.clone(),
            line,
            column: Some(col),
        },
        None => CdpLocation {
            script_id: script.script_id.clone(),
            line,
            column,
        },
    }
}

impl ChromeDebugger for MockChromeDebugger {
    async fn set_breakpoint_by_url(
        &self,
        selector: UrlSelector,
        line: u32,
        column: Option<u32>,
        condition: Option<&str>,
    ) -> Result<SetBreakpointByUrlResult> {
        let _guard = self.record(MockCall::SetBreakpointByUrl {
            selector: selector.clone(),
            line,
            column,
            condition: condition.map(str::to_string),
        });
        tokio::task::yield_now().await;

        let mut state = self.state.lock();
        let duplicate = state.breakpoints.values().any(|bp| {
            bp.selector.as_ref() == Some(&selector) && bp.line == line && bp.column == column
        });
        if duplicate {
            return Err(CdpError::BreakpointAlreadyExists);
        }

        let locations: Vec<CdpLocation> = state
            .scripts
            .iter()
            .filter(|script| selector_matches(&selector, &script.url))
            .map(|script| snap(script, line, column))
            .collect();

        let id = Self::alloc_breakpoint_id(&mut state);
        state.breakpoints.insert(
            id.clone(),
            StoredBreakpoint {
                selector: Some(selector),
                line,
                column,
                condition: condition.map(str::to_string),
            },
        );
        Ok(SetBreakpointByUrlResult {
            breakpoint_id: id,
            locations,
        })
    }

    async fn set_breakpoint(
        &self,
        script_id: &ScriptId,
        line: u32,
        column: Option<u32>,
        condition: Option<&str>,
    ) -> Result<SetBreakpointResult> {
        let _guard = self.record(MockCall::SetBreakpoint {
            script_id: script_id.clone(),
            line,
            column,
        });
        tokio::task::yield_now().await;

        let mut state = self.state.lock();
        let Some(script) = state
            .scripts
            .iter()
            .find(|script| &script.script_id == script_id)
            .cloned()
        else {
            return Err(CdpError::Protocol(format!("unknown script {script_id}")));
        };
        let actual = snap(&script, line, column);

        let duplicate = state
            .breakpoints
            .values()
            .any(|bp| bp.selector.is_none() && bp.line == actual.line && bp.column == actual.column);
        if duplicate {
            return Err(CdpError::BreakpointAlreadyExists);
        }

        let id = Self::alloc_breakpoint_id(&mut state);
        state.breakpoints.insert(
            id.clone(),
            StoredBreakpoint {
                selector: None,
                line: actual.line,
                column: actual.column,
                condition: condition.map(str::to_string),
            },
        );
        Ok(SetBreakpointResult {
            breakpoint_id: id,
            actual_location: actual,
        })
    }

    async fn remove_breakpoint(&self, breakpoint_id: &CdpBreakpointId) -> Result<()> {
        let _guard = self.record(MockCall::RemoveBreakpoint(breakpoint_id.clone()));
        tokio::task::yield_now().await;

        // Bind before matching: a lock temporary in the scrutinee would
        // still be held when `_guard` re-locks the state on drop.
        let removed = self.state.lock().breakpoints.remove(breakpoint_id);
        match removed {
            Some(_) => Ok(()),
            None => Err(CdpError::Protocol(format!(
                "unknown breakpoint {breakpoint_id}"
            ))),
        }
    }

    async fn get_possible_breakpoints(
        &self,
        script_id: &ScriptId,
        start_line: u32,
        end_line: u32,
    ) -> Result<Vec<CdpLocation>> {
        let _guard = self.record(MockCall::GetPossibleBreakpoints {
            script_id: script_id.clone(),
            start_line,
            end_line,
        });
        tokio::task::yield_now().await;

        let state = self.state.lock();
        if !state.possible_breakpoints_supported {
            return Err(CdpError::Unsupported);
        }
        let Some(script) = state
            .scripts
            .iter()
            .find(|script| &script.script_id == script_id)
        else {
            return Err(CdpError::Protocol(format!("unknown script {script_id}")));
        };
        Ok(script
            .candidates
            .iter()
            .filter(|(line, _)| *line >= start_line && *line < end_line)
            .map(|(line, column)| CdpLocation {
                script_id: script.script_id.clone(),
                line: *line,
                column: Some(*column),
            })
            .collect())
    }

    async fn set_instrumentation_breakpoint(&self, event_name: &str) -> Result<()> {
        let _guard = self.record(MockCall::SetInstrumentationBreakpoint(
            event_name.to_string(),
        ));
        tokio::task::yield_now().await;

        let mut state = self.state.lock();
        if !state.instrumentation.iter().any(|name| name == event_name) {
            state.instrumentation.push(event_name.to_string());
        }
        Ok(())
    }

    async fn remove_instrumentation_breakpoint(&self, event_name: &str) -> Result<()> {
        let _guard = self.record(MockCall::RemoveInstrumentationBreakpoint(
            event_name.to_string(),
        ));
        tokio::task::yield_now().await;

        self.state.lock().instrumentation.retain(|name| name != event_name);
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        let _guard = self.record(MockCall::Resume);
        tokio::task::yield_now().await;

        self.state.lock().resume_count += 1;
        Ok(())
    }
}

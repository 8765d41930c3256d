//! Break-on-load: guaranteeing that breakpoints in a script that has not
//! loaded yet can still be hit on the very first statement.
//!
//! Two strategies. `RegexEntryBreakpoints` plants a hidden breakpoint at the
//! top of every URL whose base name matches a source with unresolved
//! breakpoints; when it fires, real breakpoints are set and execution either
//! stays paused (a real breakpoint landed on the entry location) or resumes.
//! `InstrumentationPause` asks the target itself to pause before the first
//! statement of every script, which is precise but pauses for scripts the
//! user never asked about.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};

use vigil_cdp::{CdpBreakpointId, CdpError, ChromeDebugger, UrlSelector};
use vigil_core::ResourceIdentifier;

use crate::error::{DebugError, DebugResult};
use crate::url_regex::base_name_regex;

/// Event name for the target's "pause before the first statement of every
/// script" instrumentation breakpoint.
pub const INSTRUMENTATION_EVENT: &str = "scriptFirstStatement";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreakOnLoadMode {
    #[default]
    Disabled,
    RegexEntryBreakpoints,
    InstrumentationPause,
}

impl BreakOnLoadMode {
    /// Build from the two launch-configuration flags. Asking for both at
    /// once is a configuration error, not a silent preference.
    pub fn from_flags(regex_entry: bool, instrumentation: bool) -> DebugResult<Self> {
        match (regex_entry, instrumentation) {
            (false, false) => Ok(BreakOnLoadMode::Disabled),
            (true, false) => Ok(BreakOnLoadMode::RegexEntryBreakpoints),
            (false, true) => Ok(BreakOnLoadMode::InstrumentationPause),
            (true, true) => Err(DebugError::InvalidRequest(
                "at most one break-on-load strategy may be enabled".to_string(),
            )),
        }
    }
}

/// Hidden breakpoints at line 0, column 0 of any URL matching a pending
/// source's base name. One per distinct regex, kept for the whole session.
#[derive(Default)]
pub struct RegexEntryBreakpoints {
    entry_breakpoints: Mutex<HashMap<String, CdpBreakpointId>>,
}

impl RegexEntryBreakpoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called whenever a breakpoint request targets a source with no loaded
    /// script. Best effort: a failure here degrades break-on-load, it never
    /// fails the breakpoint request itself.
    pub async fn on_unresolved_source<C: ChromeDebugger>(
        &self,
        client: &C,
        source: &ResourceIdentifier,
    ) {
        let regex = base_name_regex(source.base_stem());
        if self.entry_breakpoints.lock().contains_key(&regex) {
            return;
        }
        match client
            .set_breakpoint_by_url(UrlSelector::UrlRegex(regex.clone()), 0, Some(0), None)
            .await
        {
            Ok(result) => {
                debug!(source = source.raw(), %regex, "entry breakpoint set");
                self.entry_breakpoints
                    .lock()
                    .insert(regex, result.breakpoint_id);
            }
            Err(CdpError::BreakpointAlreadyExists) => {
                // A user breakpoint at (0, 0) of a same-named file got there
                // first; it pauses the load just as well.
                debug!(source = source.raw(), "entry location already covered");
            }
            Err(error) => {
                warn!(source = source.raw(), %error, "failed to set entry breakpoint");
            }
        }
    }

    pub fn is_entry_breakpoint(&self, id: &CdpBreakpointId) -> bool {
        self.entry_breakpoints
            .lock()
            .values()
            .any(|entry| entry == id)
    }
}

/// The target-side strategy: one instrumentation breakpoint covering every
/// script's first statement. Enabled lazily, at most once.
#[derive(Default)]
pub struct InstrumentationPause {
    enabled: AtomicBool,
}

impl InstrumentationPause {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn ensure_enabled<C: ChromeDebugger>(&self, client: &C) -> DebugResult<()> {
        if self.enabled.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Err(error) = client
            .set_instrumentation_breakpoint(INSTRUMENTATION_EVENT)
            .await
        {
            self.enabled.store(false, Ordering::Release);
            return Err(error.into());
        }
        debug!(event = INSTRUMENTATION_EVENT, "instrumentation pause enabled");
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

/// The session's chosen strategy, dispatched at the two relevant points:
/// when a breakpoint targets an unresolved source, and when classifying a
/// pause.
pub enum BreakOnLoadStrategy {
    Disabled,
    RegexEntryBreakpoints(RegexEntryBreakpoints),
    InstrumentationPause(InstrumentationPause),
}

impl BreakOnLoadStrategy {
    pub fn for_mode(mode: BreakOnLoadMode) -> Self {
        match mode {
            BreakOnLoadMode::Disabled => BreakOnLoadStrategy::Disabled,
            BreakOnLoadMode::RegexEntryBreakpoints => {
                BreakOnLoadStrategy::RegexEntryBreakpoints(RegexEntryBreakpoints::new())
            }
            BreakOnLoadMode::InstrumentationPause => {
                BreakOnLoadStrategy::InstrumentationPause(InstrumentationPause::new())
            }
        }
    }

    pub async fn on_unresolved_source<C: ChromeDebugger>(
        &self,
        client: &C,
        source: &ResourceIdentifier,
    ) -> DebugResult<()> {
        match self {
            BreakOnLoadStrategy::Disabled => Ok(()),
            BreakOnLoadStrategy::RegexEntryBreakpoints(regex) => {
                regex.on_unresolved_source(client, source).await;
                Ok(())
            }
            BreakOnLoadStrategy::InstrumentationPause(instrumentation) => {
                instrumentation.ensure_enabled(client).await
            }
        }
    }

    pub fn is_entry_breakpoint(&self, id: &CdpBreakpointId) -> bool {
        match self {
            BreakOnLoadStrategy::RegexEntryBreakpoints(regex) => regex.is_entry_breakpoint(id),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_cdp::{MockCall, MockChromeDebugger};
    use vigil_core::PathSensitivity;

    fn identifier(text: &str) -> ResourceIdentifier {
        ResourceIdentifier::parse(text, PathSensitivity::CaseSensitive)
    }

    #[test]
    fn at_most_one_strategy_may_be_selected() {
        assert_eq!(
            BreakOnLoadMode::from_flags(false, false).unwrap(),
            BreakOnLoadMode::Disabled
        );
        assert_eq!(
            BreakOnLoadMode::from_flags(true, false).unwrap(),
            BreakOnLoadMode::RegexEntryBreakpoints
        );
        assert_eq!(
            BreakOnLoadMode::from_flags(false, true).unwrap(),
            BreakOnLoadMode::InstrumentationPause
        );
        assert!(matches!(
            BreakOnLoadMode::from_flags(true, true),
            Err(DebugError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn one_entry_breakpoint_per_distinct_base_name() {
        let mock = MockChromeDebugger::new();
        let strategy = RegexEntryBreakpoints::new();

        strategy.on_unresolved_source(&mock, &identifier("/web/index.js")).await;
        strategy.on_unresolved_source(&mock, &identifier("/other/index.ts")).await;
        strategy.on_unresolved_source(&mock, &identifier("/web/util.js")).await;

        let sets = mock
            .calls()
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    MockCall::SetBreakpointByUrl { line: 0, column: Some(0), .. }
                )
            })
            .count();
        // index.js and index.ts share a stem, so two regexes total.
        assert_eq!(sets, 2);
        assert_eq!(mock.breakpoint_count(), 2);
    }

    #[tokio::test]
    async fn entry_breakpoint_ids_are_recognized() {
        let mock = MockChromeDebugger::new();
        let strategy = BreakOnLoadStrategy::for_mode(BreakOnLoadMode::RegexEntryBreakpoints);

        strategy
            .on_unresolved_source(&mock, &identifier("/web/index.js"))
            .await
            .unwrap();

        let id = match &strategy {
            BreakOnLoadStrategy::RegexEntryBreakpoints(regex) => regex
                .entry_breakpoints
                .lock()
                .values()
                .next()
                .cloned()
                .expect("entry breakpoint recorded"),
            _ => unreachable!(),
        };
        assert!(strategy.is_entry_breakpoint(&id));
        assert!(!strategy.is_entry_breakpoint(&CdpBreakpointId::new("someone-else")));
    }

    #[tokio::test]
    async fn instrumentation_is_enabled_once() {
        let mock = MockChromeDebugger::new();
        let pause = InstrumentationPause::new();

        pause.ensure_enabled(&mock).await.unwrap();
        pause.ensure_enabled(&mock).await.unwrap();

        assert!(pause.is_enabled());
        assert_eq!(
            mock.instrumentation_breakpoints(),
            vec![INSTRUMENTATION_EVENT.to_string()]
        );
        let calls = mock
            .calls()
            .iter()
            .filter(|call| matches!(call, MockCall::SetInstrumentationBreakpoint(_)))
            .count();
        assert_eq!(calls, 1);
    }
}

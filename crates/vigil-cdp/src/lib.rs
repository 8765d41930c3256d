//! Chrome DevTools Protocol (CDP) debugger facade for Vigil.
//!
//! `vigil-dap` consumes this crate to control the debug target: set and
//! remove breakpoints, enumerate candidate breakpoint locations, and resume
//! execution. The JSON-RPC wire transport lives outside this workspace; the
//! [`ChromeDebugger`] trait is the seam, and [`MockChromeDebugger`] is the
//! deterministic in-memory double the breakpoint subsystem is tested
//! against.

mod mock;

use std::fmt;

use thiserror::Error;

pub use mock::{MockCall, MockChromeDebugger, MockScript};

/// Identifier of a parsed script, as reported by `Debugger.scriptParsed`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptId(pub String);

impl ScriptId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier the target assigns to a bound breakpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CdpBreakpointId(pub String);

impl CdpBreakpointId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for CdpBreakpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type ExecutionContextId = u32;

/// A concrete position inside a parsed script. Lines and columns are
/// zero-based, matching the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CdpLocation {
    pub script_id: ScriptId,
    pub line: u32,
    pub column: Option<u32>,
}

/// How `Debugger.setBreakpointByUrl` should match scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlSelector {
    /// Exact URL match.
    Url(String),
    /// Regex over script URLs; also matches scripts that load later.
    UrlRegex(String),
}

impl UrlSelector {
    pub fn as_str(&self) -> &str {
        match self {
            UrlSelector::Url(url) => url,
            UrlSelector::UrlRegex(regex) => regex,
        }
    }
}

/// Result of `Debugger.setBreakpointByUrl`.
///
/// `locations` lists where the breakpoint bound in currently-loaded scripts;
/// it is empty when the selector matches no script yet (the registration
/// stays latent and resolves via [`BreakpointResolvedEvent`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetBreakpointByUrlResult {
    pub breakpoint_id: CdpBreakpointId,
    pub locations: Vec<CdpLocation>,
}

/// Result of `Debugger.setBreakpoint` (by script id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetBreakpointResult {
    pub breakpoint_id: CdpBreakpointId,
    pub actual_location: CdpLocation,
}

/// `Debugger.scriptParsed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptParsedEvent {
    pub script_id: ScriptId,
    pub url: String,
    pub execution_context_id: ExecutionContextId,
    pub source_map_url: Option<String>,
}

/// `Debugger.breakpointResolved`: a latent by-URL breakpoint bound in a
/// newly-parsed script. May arrive after the original set call returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointResolvedEvent {
    pub breakpoint_id: CdpBreakpointId,
    pub location: CdpLocation,
}

/// Why the target paused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PauseReason {
    Breakpoint,
    /// `reason: "EventListener"`; instrumentation pauses arrive this way with
    /// an event name of the form `instrumentation:...`.
    EventListener { event_name: String },
    Other(String),
}

/// `Debugger.paused`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PausedEvent {
    pub reason: PauseReason,
    pub hit_breakpoints: Vec<CdpBreakpointId>,
    /// Location of the top call frame.
    pub location: Option<CdpLocation>,
}

impl PausedEvent {
    /// True for the "pause before the first statement of every script"
    /// instrumentation pauses used by break-on-load.
    pub fn is_instrumentation_pause(&self) -> bool {
        matches!(
            &self.reason,
            PauseReason::EventListener { event_name } if event_name.starts_with("instrumentation:")
        )
    }
}

#[derive(Debug, Error)]
pub enum CdpError {
    /// The target refuses to bind two breakpoints at one location. Callers
    /// are expected to treat this as "the location is already covered".
    #[error("breakpoint already exists at this location")]
    BreakpointAlreadyExists,
    /// The command is unknown to this target version (e.g.
    /// `Debugger.getPossibleBreakpoints` on older runtimes).
    #[error("command not supported by this target")]
    Unsupported,
    #[error("CDP protocol error: {0}")]
    Protocol(String),
    #[error("CDP connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, CdpError>;

/// Mock-friendly interface over the `Debugger`/`DOMDebugger` domains.
///
/// Implementations are cheap clonable handles (the wire client shares its
/// connection behind an `Arc`), so independent async flows can each hold one.
#[allow(async_fn_in_trait)]
pub trait ChromeDebugger: Clone + Send + Sync + 'static {
    /// `Debugger.setBreakpointByUrl`. Latent when no loaded script matches.
    async fn set_breakpoint_by_url(
        &self,
        selector: UrlSelector,
        line: u32,
        column: Option<u32>,
        condition: Option<&str>,
    ) -> Result<SetBreakpointByUrlResult>;

    /// `Debugger.setBreakpoint` against an already-parsed script.
    async fn set_breakpoint(
        &self,
        script_id: &ScriptId,
        line: u32,
        column: Option<u32>,
        condition: Option<&str>,
    ) -> Result<SetBreakpointResult>;

    /// `Debugger.removeBreakpoint`.
    async fn remove_breakpoint(&self, breakpoint_id: &CdpBreakpointId) -> Result<()>;

    /// `Debugger.getPossibleBreakpoints` over `[start, end)` of one script.
    ///
    /// May fail with [`CdpError::Unsupported`] on older targets; callers
    /// degrade to the unrefined location.
    async fn get_possible_breakpoints(
        &self,
        script_id: &ScriptId,
        start_line: u32,
        end_line: u32,
    ) -> Result<Vec<CdpLocation>>;

    /// `DOMDebugger.setInstrumentationBreakpoint`.
    async fn set_instrumentation_breakpoint(&self, event_name: &str) -> Result<()>;

    /// `DOMDebugger.removeInstrumentationBreakpoint`.
    async fn remove_instrumentation_breakpoint(&self, event_name: &str) -> Result<()>;

    /// `Debugger.resume`.
    async fn resume(&self) -> Result<()>;
}

//! Vigil Debug Adapter Protocol core (breakpoint subsystem).
//!
//! This crate provides:
//! - The DAP-facing breakpoint model: recipes, per-source reconciliation,
//!   binding state and client reporting.
//! - Script/source bookkeeping for a CDP target, including source-map
//!   position translation at the seams.
//! - Break-on-load strategies so breakpoints in not-yet-loaded scripts are
//!   hit from the very first statement.
//!
//! The wire transports (DAP framing on one side, the CDP socket on the
//! other) live outside this crate; [`DebugSession`] is the protocol-agnostic
//! core the embedder wires between them.

pub mod breakpoints;
pub mod dap;
pub mod error;
pub mod location;
pub mod scripts;
pub mod session;
pub mod source_map;
pub mod url_regex;

/// Re-export the CDP debugger facade used by the session layer.
pub mod cdp {
    pub use vigil_cdp::*;
}

pub use crate::breakpoints::{
    ActionWhenHit, BPRecipeInSource, BreakOnLoadMode, BreakpointStatus, ClientBreakpointId,
};
pub use crate::error::{DebugError, DebugResult};
pub use crate::session::{DebugSession, PauseDisposition, SessionConfig, SessionEvent, StopReason};

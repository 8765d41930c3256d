//! Debug Adapter Protocol wire shapes for the breakpoint surface.

pub mod types;

pub use types::{
    Breakpoint, BreakpointEventBody, BreakpointLocation, BreakpointLocationsArguments,
    SetBreakpointsArguments, Source, SourceBreakpoint,
};

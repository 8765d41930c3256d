//! The breakpoint subsystem: recipes, reconciliation, binding state, and
//! break-on-load.
//!
//! Data flow for a `setBreakpoints` request: the DAP layer parses rows into
//! [`recipe::BPRecipeInSource`]s; [`delta`] reconciles them against the
//! recipes already in effect for the source; the
//! [`orchestrator::BreakpointOrchestrator`] applies the difference to the
//! target (serialized per source by [`queue::SourceQueue`]); and the
//! [`registry::BreakpointRegistry`] tracks what actually bound where, which
//! is what gets reported back to the client.

pub mod break_on_load;
pub mod delta;
pub mod orchestrator;
pub mod queue;
pub mod recipe;
pub mod registry;

pub use break_on_load::{BreakOnLoadMode, BreakOnLoadStrategy, INSTRUMENTATION_EVENT};
pub use orchestrator::BreakpointOrchestrator;
pub use queue::SourceQueue;
pub use recipe::{ActionParseError, ActionWhenHit, BPRecipeInSource, HitCountCondition};
pub use registry::{Breakpoint, BreakpointRegistry, BreakpointStatus, ClientBreakpointId};

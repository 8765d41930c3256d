//! Registry of recipes and of the breakpoints actually bound for them.
//!
//! The recipe table and the CDP-breakpoint-id index are private and only
//! touched by the mutator functions here, so they cannot drift out of sync.
//! Keys are pointer-identity [`RecipeHandle`]s: the unmapped client-level
//! recipe is the identity everything collapses back to.

use std::collections::HashMap;
use std::sync::Arc;

use vigil_cdp::{CdpBreakpointId, ScriptId};
use vigil_core::Position;

use crate::error::{DebugError, DebugResult};
use crate::location::LocationInScript;
use crate::scripts::Script;

use super::recipe::{BPRecipeInSource, RecipeHandle};

/// Client-visible numeric breakpoint id.
pub type ClientBreakpointId = i64;

/// The result of successfully binding a recipe: where it actually landed.
/// One recipe may own several of these (a URL-regexp recipe matching several
/// loaded scripts).
#[derive(Debug, Clone)]
pub struct Breakpoint {
    pub recipe: Arc<BPRecipeInSource>,
    pub location: LocationInScript,
}

/// Bound/unbound state of a recipe, for client reporting.
#[derive(Debug, Clone)]
pub enum BreakpointStatus {
    Bound {
        breakpoints: Vec<Breakpoint>,
        description: String,
    },
    Unbound {
        description: String,
    },
}

impl BreakpointStatus {
    /// A bound status must carry evidence; zero breakpoints is a programmer
    /// error, distinct from being unbound.
    pub fn bound(breakpoints: Vec<Breakpoint>, description: String) -> DebugResult<Self> {
        if breakpoints.is_empty() {
            return Err(DebugError::internal(
                "bound-status-without-breakpoints",
                "a Bound status must reference at least one breakpoint",
            ));
        }
        Ok(BreakpointStatus::Bound {
            breakpoints,
            description,
        })
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, BreakpointStatus::Bound { .. })
    }
}

#[derive(Debug)]
struct RecipeEntry {
    id: ClientBreakpointId,
    recipe: Arc<BPRecipeInSource>,
    bound: Vec<Breakpoint>,
    cdp_ids: Vec<CdpBreakpointId>,
    /// Latest resolution failure, surfaced in the unbound description.
    error: Option<String>,
}

#[derive(Default)]
pub struct BreakpointRegistry {
    next_id: ClientBreakpointId,
    entries: HashMap<RecipeHandle, RecipeEntry>,
    by_cdp_id: HashMap<CdpBreakpointId, RecipeHandle>,
    /// Canonical source path → recipes currently in effect, in registration
    /// order (the "current" set the delta calculator reconciles against).
    by_source: HashMap<String, Vec<RecipeHandle>>,
}

impl BreakpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent. Recipes are registered *before* any protocol call is
    /// issued for them so that status queries and resolution events never
    /// race an unknown recipe.
    pub fn register_recipe(&mut self, recipe: &Arc<BPRecipeInSource>) -> ClientBreakpointId {
        let handle = RecipeHandle(recipe.clone());
        if let Some(entry) = self.entries.get(&handle) {
            return entry.id;
        }
        self.next_id += 1;
        let id = self.next_id;
        self.entries.insert(
            handle.clone(),
            RecipeEntry {
                id,
                recipe: recipe.clone(),
                bound: Vec::new(),
                cdp_ids: Vec::new(),
                error: None,
            },
        );
        self.by_source
            .entry(recipe.location().source.canonical().to_string())
            .or_default()
            .push(handle);
        id
    }

    pub fn client_id(&self, recipe: &Arc<BPRecipeInSource>) -> Option<ClientBreakpointId> {
        self.entries.get(&RecipeHandle(recipe.clone())).map(|e| e.id)
    }

    pub fn recipes_for_source(&self, canonical: &str) -> Vec<Arc<BPRecipeInSource>> {
        self.by_source
            .get(canonical)
            .map(|handles| handles.iter().map(|h| h.0.clone()).collect())
            .unwrap_or_default()
    }

    /// Associate a target-assigned breakpoint id with a recipe, so later
    /// `breakpointResolved` events find their way back.
    pub fn attach_cdp_id(&mut self, recipe: &Arc<BPRecipeInSource>, cdp_id: CdpBreakpointId) {
        let handle = RecipeHandle(recipe.clone());
        let Some(entry) = self.entries.get_mut(&handle) else {
            debug_assert!(false, "attach_cdp_id for unregistered recipe");
            return;
        };
        entry.cdp_ids.push(cdp_id.clone());
        self.by_cdp_id.insert(cdp_id, handle);
    }

    /// Record an actual binding. The breakpoint's recipe reference is the
    /// unmapped ancestor, so bindings reached through any mapped form all
    /// land on one entry.
    pub fn register_breakpoint_as_bound(&mut self, breakpoint: Breakpoint) {
        let handle = RecipeHandle(breakpoint.recipe.clone());
        let Some(entry) = self.entries.get_mut(&handle) else {
            debug_assert!(false, "binding for unregistered recipe");
            return;
        };
        entry.error = None;
        entry.bound.push(breakpoint);
    }

    pub fn register_resolution_failure(
        &mut self,
        recipe: &Arc<BPRecipeInSource>,
        message: String,
    ) {
        if let Some(entry) = self.entries.get_mut(&RecipeHandle(recipe.clone())) {
            if entry.bound.is_empty() {
                entry.error = Some(message);
            }
        }
    }

    /// Handle `Debugger.breakpointResolved`: returns the owning recipe when
    /// the id is known (entry breakpoints and stale ids are not).
    pub fn on_breakpoint_resolved(
        &mut self,
        cdp_id: &CdpBreakpointId,
        location: LocationInScript,
    ) -> Option<Arc<BPRecipeInSource>> {
        let handle = self.by_cdp_id.get(cdp_id)?.clone();
        let entry = self.entries.get_mut(&handle)?;
        let recipe = entry.recipe.clone();
        entry.error = None;
        entry.bound.push(Breakpoint {
            recipe: recipe.clone(),
            location,
        });
        Some(recipe)
    }

    /// Remove a recipe and every index entry pointing at it. Returns the
    /// target breakpoint ids that should now be removed from the debuggee.
    pub fn unregister_recipe(&mut self, recipe: &Arc<BPRecipeInSource>) -> Vec<CdpBreakpointId> {
        let handle = RecipeHandle(recipe.clone());
        let Some(entry) = self.entries.remove(&handle) else {
            return Vec::new();
        };
        for cdp_id in &entry.cdp_ids {
            self.by_cdp_id.remove(cdp_id);
        }
        if let Some(handles) = self
            .by_source
            .get_mut(recipe.location().source.canonical())
        {
            handles.retain(|h| h != &handle);
        }
        entry.cdp_ids
    }

    pub fn status(&self, recipe: &Arc<BPRecipeInSource>) -> BreakpointStatus {
        let Some(entry) = self.entries.get(&RecipeHandle(recipe.clone())) else {
            return BreakpointStatus::Unbound {
                description: "breakpoint is not registered".to_string(),
            };
        };
        if entry.bound.is_empty() {
            let description = entry
                .error
                .clone()
                .unwrap_or_else(|| "breakpoint not yet bound: source not loaded".to_string());
            return BreakpointStatus::Unbound { description };
        }
        // Several bindings may exist; the first is the stable tie-break used
        // for the client-visible location.
        let description = format!("bound at {}", entry.bound[0].location);
        BreakpointStatus::Bound {
            breakpoints: entry.bound.clone(),
            description,
        }
    }

    pub fn recipe_for_cdp_id(&self, cdp_id: &CdpBreakpointId) -> Option<Arc<BPRecipeInSource>> {
        self.by_cdp_id
            .get(cdp_id)
            .and_then(|handle| self.entries.get(handle))
            .map(|entry| entry.recipe.clone())
    }

    /// Whether some recipe is bound at exactly this script position. Columns
    /// are compared with "unspecified" treated as column 0, matching how the
    /// target reports line-start locations.
    pub fn has_bound_breakpoint_at(&self, script_id: &ScriptId, position: Position) -> bool {
        let wanted_column = position.column.unwrap_or(0);
        self.entries.values().any(|entry| {
            entry.bound.iter().any(|bp| {
                bp.location.script.id() == script_id
                    && bp.location.position.line == position.line
                    && bp.location.position.column.unwrap_or(0) == wanted_column
            })
        })
    }

    /// Drop bindings that lived in now-destroyed scripts. The recipes stay
    /// registered (they revert to unbound, pending a future load); the ones
    /// whose binding set shrank are returned so callers can notify the
    /// client.
    pub fn drop_bindings_for_scripts(
        &mut self,
        scripts: &[Arc<Script>],
    ) -> Vec<Arc<BPRecipeInSource>> {
        let mut affected = Vec::new();
        for entry in self.entries.values_mut() {
            let before = entry.bound.len();
            entry
                .bound
                .retain(|bp| !scripts.iter().any(|s| s.id() == bp.location.script.id()));
            if entry.bound.len() != before {
                affected.push(entry.recipe.clone());
            }
        }
        affected
    }
}

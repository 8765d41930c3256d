//! Reconciliation of a `setBreakpoints` request against the recipes already
//! in effect for a source.
//!
//! DAP semantics are full-replace per source: each request is authoritative
//! for *all* breakpoints in that source, so an existing recipe absent from
//! the new request is removed. Matching is by canonicalized
//! (line, column, action) key; a match keeps the existing recipe (and
//! therefore its existing binding and client id) instead of re-adding.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::error::{DebugError, DebugResult};

use super::recipe::{BPRecipeInSource, RecipeKey};

#[derive(Debug, Default)]
pub struct BreakpointDelta {
    /// One entry per requested recipe, in request order: the existing recipe
    /// when one matched, otherwise the requested recipe itself.
    pub matches_for_requested: Vec<Arc<BPRecipeInSource>>,
    pub to_add: Vec<Arc<BPRecipeInSource>>,
    pub to_remove: Vec<Arc<BPRecipeInSource>>,
    pub to_keep: Vec<Arc<BPRecipeInSource>>,
}

pub fn calculate(
    requested: &[Arc<BPRecipeInSource>],
    current: &[Arc<BPRecipeInSource>],
) -> DebugResult<BreakpointDelta> {
    let mut unmatched: HashMap<RecipeKey, VecDeque<Arc<BPRecipeInSource>>> = HashMap::new();
    for recipe in current {
        unmatched
            .entry(recipe.delta_key())
            .or_default()
            .push_back(recipe.clone());
    }

    let mut delta = BreakpointDelta::default();
    for recipe in requested {
        match unmatched.get_mut(&recipe.delta_key()).and_then(VecDeque::pop_front) {
            Some(existing) => {
                delta.to_keep.push(existing.clone());
                delta.matches_for_requested.push(existing);
            }
            None => {
                delta.to_add.push(recipe.clone());
                delta.matches_for_requested.push(recipe.clone());
            }
        }
    }
    for (_, leftovers) in unmatched {
        delta.to_remove.extend(leftovers);
    }

    verify_counts(&delta, requested.len(), current.len())?;
    Ok(delta)
}

/// Self-check of the reconciliation postconditions. A violation is a bug in
/// this module, never a recoverable condition.
fn verify_counts(
    delta: &BreakpointDelta,
    requested: usize,
    current: usize,
) -> DebugResult<()> {
    let checks = [
        (delta.matches_for_requested.len() == requested, "matches == requested"),
        (delta.to_add.len() + delta.to_keep.len() == requested, "add + keep == requested"),
        (delta.to_keep.len() + delta.to_remove.len() == current, "keep + remove == current"),
    ];
    for (holds, law) in checks {
        if !holds {
            return Err(DebugError::internal(
                "delta-count-mismatch",
                format!(
                    "{law} violated (requested={requested}, current={current}, add={}, keep={}, remove={})",
                    delta.to_add.len(),
                    delta.to_keep.len(),
                    delta.to_remove.len()
                ),
            ));
        }
    }
    Ok(())
}

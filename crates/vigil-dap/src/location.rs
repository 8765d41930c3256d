//! Locations: a position tied to one of five resource kinds.
//!
//! The kinds mirror the lifecycle of a breakpoint request: the client names
//! an *unresolved source*; once the registry knows the file it becomes a
//! *loaded source*; binding happens in a *script* (through the source map
//! when one applies); and the target is addressed by *URL* or *URL regexp*.

use std::fmt;
use std::sync::Arc;

use vigil_core::{Position, ResourceIdentifier};

use crate::error::{DebugError, DebugResult};
use crate::scripts::{LoadedSource, Script, ScriptRegistry};
use crate::url_regex::exact_url_regex;

/// A position in a source the client named but that may not be loaded yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationInSource {
    pub source: ResourceIdentifier,
    pub position: Position,
}

impl LocationInSource {
    pub fn new(source: ResourceIdentifier, position: Position) -> Self {
        Self { source, position }
    }

    /// `None` when no script has loaded this source yet. That is an expected
    /// outcome, not an error: callers park the work until the source loads.
    pub fn resolve_to_loaded_source(
        &self,
        registry: &ScriptRegistry,
    ) -> Option<LocationInLoadedSource> {
        let source = registry.resolve_loaded_source(&self.source)?;
        Some(LocationInLoadedSource {
            source,
            position: self.position,
        })
    }
}

impl fmt::Display for LocationInSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.source, self.position)
    }
}

/// A position in a source known to be loaded.
#[derive(Clone)]
pub struct LocationInLoadedSource {
    pub source: Arc<LoadedSource>,
    pub position: Position,
}

impl LocationInLoadedSource {
    /// Map into every script this source participates in: identity for the
    /// script's own (runtime/development) source, through the source map for
    /// authored sources.
    ///
    /// Erroring when nothing maps is deliberate: this conversion is only
    /// invoked once a script for the source is assumed present.
    pub fn to_script_locations(
        &self,
        registry: &ScriptRegistry,
    ) -> DebugResult<Vec<LocationInScript>> {
        let scripts = registry.scripts_by_source(self.source.identifier());
        let mut out = Vec::new();
        for script in scripts {
            if script.is_mapped_source(&self.source) {
                let mapped = script
                    .mapper()
                    .authored_to_script(self.source.identifier(), self.position);
                if let Some(position) = mapped {
                    out.push(LocationInScript { script, position });
                }
            } else {
                out.push(LocationInScript {
                    script,
                    position: self.position,
                });
            }
        }
        if out.is_empty() {
            return Err(DebugError::NoScriptForSource(
                self.source.identifier().to_string(),
            ));
        }
        Ok(out)
    }
}

impl PartialEq for LocationInLoadedSource {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.source, &other.source) && self.position == other.position
    }
}

impl Eq for LocationInLoadedSource {}

impl fmt::Debug for LocationInLoadedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationInLoadedSource")
            .field("source", &self.source.identifier().raw())
            .field("position", &self.position)
            .finish()
    }
}

/// A position in one specific parsed script.
#[derive(Clone)]
pub struct LocationInScript {
    pub script: Arc<Script>,
    pub position: Position,
}

impl LocationInScript {
    /// Back-map through the source map; falls back to the development
    /// source at the same position when the source map has no entry.
    pub fn to_loaded_source_location(&self, registry: &ScriptRegistry) -> LocationInLoadedSource {
        if let Some((identifier, position)) = self.script.mapper().script_to_authored(self.position)
        {
            if let Some(source) = registry.resolve_loaded_source(&identifier) {
                return LocationInLoadedSource { source, position };
            }
        }
        LocationInLoadedSource {
            source: self.script.development_source().clone(),
            position: self.position,
        }
    }

    pub fn to_url_location(&self) -> LocationInUrl {
        LocationInUrl {
            url: self.script.runtime_source().clone(),
            position: self.position,
        }
    }

    pub fn to_url_regexp_location(&self) -> LocationInUrlRegexp {
        LocationInUrlRegexp {
            url_regexp: exact_url_regex(self.script.url()),
            position: self.position,
        }
    }
}

impl PartialEq for LocationInScript {
    fn eq(&self, other: &Self) -> bool {
        self.script.id() == other.script.id() && self.position == other.position
    }
}

impl Eq for LocationInScript {}

impl fmt::Debug for LocationInScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationInScript")
            .field("script", &self.script.id())
            .field("position", &self.position)
            .finish()
    }
}

impl fmt::Display for LocationInScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "script {} @ {}", self.script.id(), self.position)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationInUrl {
    pub url: ResourceIdentifier,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationInUrlRegexp {
    pub url_regexp: String,
    pub position: Position,
}

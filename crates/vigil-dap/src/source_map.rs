//! Source-map seam.
//!
//! Source-map parsing is not this crate's business: the adapter only needs
//! position mappings between a compiled script and its authored sources. The
//! embedder supplies a [`SourceMapResolver`] that turns a `scriptParsed`
//! event's source-map URL into a [`SourceMapper`]; everything downstream
//! treats the mapper as a black box.

use std::collections::HashMap;
use std::sync::Arc;

use vigil_core::{Position, ResourceIdentifier};

/// Position mapping for one script.
pub trait SourceMapper: Send + Sync {
    /// Authored (pre-compilation) sources this script was built from.
    fn authored_sources(&self) -> Vec<ResourceIdentifier>;

    /// Map a script position back to an authored source position.
    fn script_to_authored(&self, position: Position) -> Option<(ResourceIdentifier, Position)>;

    /// Map an authored-source position into this script.
    fn authored_to_script(&self, source: &ResourceIdentifier, position: Position)
        -> Option<Position>;
}

/// Mapper for scripts without a source map: no authored sources, no
/// translations.
pub struct IdentityMapper;

impl SourceMapper for IdentityMapper {
    fn authored_sources(&self) -> Vec<ResourceIdentifier> {
        Vec::new()
    }

    fn script_to_authored(&self, _position: Position) -> Option<(ResourceIdentifier, Position)> {
        None
    }

    fn authored_to_script(
        &self,
        _source: &ResourceIdentifier,
        _position: Position,
    ) -> Option<Position> {
        None
    }
}

/// A whole-file line-shift mapping: authored line `n` corresponds to script
/// line `n + line_offset`. Enough to model simple transpilation in tests and
/// in embedders that only prepend preludes.
pub struct LineOffsetMapper {
    source: ResourceIdentifier,
    line_offset: i64,
}

impl LineOffsetMapper {
    pub fn new(source: ResourceIdentifier, line_offset: i64) -> Self {
        Self {
            source,
            line_offset,
        }
    }
}

impl SourceMapper for LineOffsetMapper {
    fn authored_sources(&self) -> Vec<ResourceIdentifier> {
        vec![self.source.clone()]
    }

    fn script_to_authored(&self, position: Position) -> Option<(ResourceIdentifier, Position)> {
        let line = i64::from(position.line) - self.line_offset;
        let line = u32::try_from(line).ok()?;
        Some((
            self.source.clone(),
            Position::new(line, position.column),
        ))
    }

    fn authored_to_script(
        &self,
        source: &ResourceIdentifier,
        position: Position,
    ) -> Option<Position> {
        if source != &self.source {
            return None;
        }
        let line = i64::from(position.line) + self.line_offset;
        let line = u32::try_from(line).ok()?;
        Some(Position::new(line, position.column))
    }
}

/// Produces the [`SourceMapper`] for a newly-parsed script.
pub trait SourceMapResolver: Send + Sync {
    fn resolve(&self, script_url: &str, source_map_url: Option<&str>) -> Arc<dyn SourceMapper>;
}

/// Resolver for sessions without source-map support.
pub struct NoSourceMaps;

impl SourceMapResolver for NoSourceMaps {
    fn resolve(&self, _script_url: &str, _source_map_url: Option<&str>) -> Arc<dyn SourceMapper> {
        Arc::new(IdentityMapper)
    }
}

/// Fixed script-URL → mapper table; the test suites use this in place of a
/// real source-map fetch.
#[derive(Default)]
pub struct StaticSourceMapResolver {
    by_script_url: HashMap<String, Arc<dyn SourceMapper>>,
}

impl StaticSourceMapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, script_url: impl Into<String>, mapper: Arc<dyn SourceMapper>) {
        self.by_script_url.insert(script_url.into(), mapper);
    }
}

impl SourceMapResolver for StaticSourceMapResolver {
    fn resolve(&self, script_url: &str, _source_map_url: Option<&str>) -> Arc<dyn SourceMapper> {
        self.by_script_url
            .get(script_url)
            .cloned()
            .unwrap_or_else(|| Arc::new(IdentityMapper))
    }
}

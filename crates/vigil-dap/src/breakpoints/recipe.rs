//! Breakpoint recipes: the declarative request (location + action when hit).
//!
//! Recipes are immutable. A recipe starts life in unresolved-source form;
//! mapped forms (loaded source, script, URL regexp) always carry a
//! non-owning back-reference to that originating recipe so status collapses
//! back to one client-visible identity no matter how many ways it got
//! mapped.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::location::{
    LocationInLoadedSource, LocationInScript, LocationInSource, LocationInUrlRegexp,
};
use crate::scripts::ScriptRegistry;

/// What the debugger should do when the breakpoint is hit. Closed set:
/// exactly one variant per recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionWhenHit {
    AlwaysPause,
    /// Pause only when `expression` evaluates truthy (evaluated natively by
    /// the target via the CDP `condition` parameter).
    ConditionalPause { expression: String },
    /// Pause depending on how many times the breakpoint was hit before.
    PauseOnHitCount { condition: HitCountCondition },
    /// Never pause; log `message` and continue.
    LogMessage { message: String },
}

/// Failure modes of [`ActionWhenHit::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionParseError {
    /// More than one of condition/hitCondition/logMessage was supplied.
    /// Upstream validation should have prevented this; it is reported as an
    /// internal error.
    Ambiguous,
    /// The hit-count condition string did not parse. Recoverable: the
    /// breakpoint is reported unverified with this message.
    InvalidHitCount { text: String, reason: String },
}

impl fmt::Display for ActionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionParseError::Ambiguous => f.write_str(
                "ambiguous action when hit: more than one of condition, hitCondition and logMessage is set",
            ),
            ActionParseError::InvalidHitCount { text, reason } => {
                write!(f, "invalid hit count condition {text:?}: {reason}")
            }
        }
    }
}

impl ActionWhenHit {
    /// Build from the client's breakpoint fields. Zero populated fields mean
    /// "always pause"; exactly one selects its variant; two or more is an
    /// ambiguity error.
    pub fn parse(
        condition: Option<&str>,
        hit_condition: Option<&str>,
        log_message: Option<&str>,
    ) -> Result<Self, ActionParseError> {
        // DAP clients routinely send empty strings for "unset".
        let condition = condition.map(str::trim).filter(|s| !s.is_empty());
        let hit_condition = hit_condition.map(str::trim).filter(|s| !s.is_empty());
        let log_message = log_message.filter(|s| !s.trim().is_empty());

        let populated =
            usize::from(condition.is_some()) + usize::from(hit_condition.is_some())
                + usize::from(log_message.is_some());
        if populated > 1 {
            return Err(ActionParseError::Ambiguous);
        }

        if let Some(expression) = condition {
            return Ok(ActionWhenHit::ConditionalPause {
                expression: expression.to_string(),
            });
        }
        if let Some(text) = hit_condition {
            let condition =
                HitCountCondition::parse(text).map_err(|reason| ActionParseError::InvalidHitCount {
                    text: text.to_string(),
                    reason,
                })?;
            return Ok(ActionWhenHit::PauseOnHitCount { condition });
        }
        if let Some(message) = log_message {
            return Ok(ActionWhenHit::LogMessage {
                message: message.to_string(),
            });
        }
        Ok(ActionWhenHit::AlwaysPause)
    }

    /// Stable textual form used as part of the delta-calculation key.
    pub fn description(&self) -> String {
        match self {
            ActionWhenHit::AlwaysPause => "always pause".to_string(),
            ActionWhenHit::ConditionalPause { expression } => format!("pause if: {expression}"),
            ActionWhenHit::PauseOnHitCount { condition } => format!("pause on hit count {condition}"),
            ActionWhenHit::LogMessage { message } => format!("log: {message}"),
        }
    }

    /// The expression to hand to CDP's native `condition` parameter, when
    /// the target can evaluate the action itself.
    pub fn cdp_condition(&self) -> Option<&str> {
        match self {
            ActionWhenHit::ConditionalPause { expression } => Some(expression),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitCountOp {
    Greater,
    GreaterOrEqual,
    Equal,
    Less,
    LessOrEqual,
    /// `%n`: every n-th hit.
    Multiple,
}

/// Parsed `hitCondition` string: an optional comparison operator followed by
/// a non-negative integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitCountCondition {
    pub op: HitCountOp,
    pub operand: u64,
}

impl HitCountCondition {
    pub fn parse(text: &str) -> Result<Self, String> {
        let trimmed = text.trim();
        let (op, rest) = if let Some(rest) = trimmed.strip_prefix(">=") {
            (HitCountOp::GreaterOrEqual, rest)
        } else if let Some(rest) = trimmed.strip_prefix("<=") {
            (HitCountOp::LessOrEqual, rest)
        } else if let Some(rest) = trimmed.strip_prefix("==") {
            (HitCountOp::Equal, rest)
        } else if let Some(rest) = trimmed.strip_prefix('>') {
            (HitCountOp::Greater, rest)
        } else if let Some(rest) = trimmed.strip_prefix('<') {
            (HitCountOp::Less, rest)
        } else if let Some(rest) = trimmed.strip_prefix('=') {
            (HitCountOp::Equal, rest)
        } else if let Some(rest) = trimmed.strip_prefix('%') {
            (HitCountOp::Multiple, rest)
        } else {
            (HitCountOp::Equal, trimmed)
        };

        let operand: u64 = rest
            .trim()
            .parse()
            .map_err(|_| format!("expected a non-negative integer, got {:?}", rest.trim()))?;
        if op == HitCountOp::Multiple && operand == 0 {
            return Err("%0 would divide by zero".to_string());
        }
        Ok(Self { op, operand })
    }

    /// Whether to pause given the number of hits *before* this one. The
    /// caller increments its counter after consulting this, so the very
    /// first hit is evaluated with `hit_count == 0`.
    pub fn should_pause(&self, hit_count: u64) -> bool {
        match self.op {
            HitCountOp::Greater => hit_count > self.operand,
            HitCountOp::GreaterOrEqual => hit_count >= self.operand,
            HitCountOp::Equal => hit_count == self.operand,
            HitCountOp::Less => hit_count < self.operand,
            HitCountOp::LessOrEqual => hit_count <= self.operand,
            HitCountOp::Multiple => hit_count % self.operand == 0,
        }
    }
}

impl fmt::Display for HitCountCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            HitCountOp::Greater => ">",
            HitCountOp::GreaterOrEqual => ">=",
            HitCountOp::Equal => "==",
            HitCountOp::Less => "<",
            HitCountOp::LessOrEqual => "<=",
            HitCountOp::Multiple => "%",
        };
        write!(f, "{op} {}", self.operand)
    }
}

/// A requested breakpoint in client-level (unresolved source) form. This is
/// the identity every mapped form collapses back to.
#[derive(Debug, PartialEq, Eq)]
pub struct BPRecipeInSource {
    location: LocationInSource,
    action: ActionWhenHit,
}

impl BPRecipeInSource {
    pub fn new(location: LocationInSource, action: ActionWhenHit) -> Self {
        Self { location, action }
    }

    pub fn location(&self) -> &LocationInSource {
        &self.location
    }

    pub fn action(&self) -> &ActionWhenHit {
        &self.action
    }

    /// Recipes are immutable; changing the action means a new recipe.
    pub fn with_always_pause(&self) -> Self {
        Self {
            location: self.location.clone(),
            action: ActionWhenHit::AlwaysPause,
        }
    }

    /// Key for reconciling a new client request against the recipes already
    /// in effect for a source.
    pub fn delta_key(&self) -> RecipeKey {
        RecipeKey {
            line: self.location.position.line,
            column: self.location.position.column,
            action: self.action.description(),
        }
    }

    pub fn resolve_to_loaded_source(
        self: &Arc<Self>,
        registry: &ScriptRegistry,
    ) -> Option<BPRecipeInLoadedSource> {
        let location = self.location.resolve_to_loaded_source(registry)?;
        Some(BPRecipeInLoadedSource {
            unmapped: self.clone(),
            location,
        })
    }
}

/// Canonicalized (line, column, action) identity of a recipe within one
/// source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecipeKey {
    pub line: u32,
    pub column: Option<u32>,
    pub action: String,
}

/// A recipe mapped into a loaded source.
#[derive(Debug, Clone)]
pub struct BPRecipeInLoadedSource {
    pub unmapped: Arc<BPRecipeInSource>,
    pub location: LocationInLoadedSource,
}

impl BPRecipeInLoadedSource {
    pub fn to_script_recipes(&self, registry: &ScriptRegistry) -> crate::error::DebugResult<Vec<BPRecipeInScript>> {
        Ok(self
            .location
            .to_script_locations(registry)?
            .into_iter()
            .map(|location| BPRecipeInScript {
                unmapped: self.unmapped.clone(),
                location,
            })
            .collect())
    }
}

/// A recipe mapped into one concrete script.
#[derive(Debug, Clone)]
pub struct BPRecipeInScript {
    pub unmapped: Arc<BPRecipeInSource>,
    pub location: LocationInScript,
}

/// A recipe expressed as a URL regexp, for binding against scripts that have
/// not loaded yet.
#[derive(Debug, Clone)]
pub struct BPRecipeInUrlRegexp {
    pub unmapped: Arc<BPRecipeInSource>,
    pub location: LocationInUrlRegexp,
}

/// Pointer-identity handle for using recipes as map keys. Two textually
/// identical recipes from different requests stay distinct.
#[derive(Clone)]
pub struct RecipeHandle(pub Arc<BPRecipeInSource>);

impl PartialEq for RecipeHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for RecipeHandle {}

impl Hash for RecipeHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for RecipeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn zero_fields_means_always_pause() {
        assert_eq!(
            ActionWhenHit::parse(None, None, None).unwrap(),
            ActionWhenHit::AlwaysPause
        );
        assert_eq!(
            ActionWhenHit::parse(Some(""), Some("  "), None).unwrap(),
            ActionWhenHit::AlwaysPause
        );
    }

    #[test]
    fn one_field_selects_its_variant() {
        assert_eq!(
            ActionWhenHit::parse(Some("x > 3"), None, None).unwrap(),
            ActionWhenHit::ConditionalPause {
                expression: "x > 3".to_string()
            }
        );
        assert_eq!(
            ActionWhenHit::parse(None, None, Some("value is {x}")).unwrap(),
            ActionWhenHit::LogMessage {
                message: "value is {x}".to_string()
            }
        );
        assert!(matches!(
            ActionWhenHit::parse(None, Some("%2"), None).unwrap(),
            ActionWhenHit::PauseOnHitCount { .. }
        ));
    }

    #[test]
    fn two_fields_is_ambiguous() {
        assert_eq!(
            ActionWhenHit::parse(Some("x"), Some(">1"), None).unwrap_err(),
            ActionParseError::Ambiguous
        );
        assert_eq!(
            ActionWhenHit::parse(Some("x"), Some(">1"), Some("m")).unwrap_err(),
            ActionParseError::Ambiguous
        );
    }

    #[test]
    fn invalid_hit_count_is_a_recoverable_parse_error() {
        let err = ActionWhenHit::parse(None, Some(">> 2"), None).unwrap_err();
        assert!(matches!(err, ActionParseError::InvalidHitCount { .. }));
        let err = ActionWhenHit::parse(None, Some("%0"), None).unwrap_err();
        assert!(matches!(err, ActionParseError::InvalidHitCount { .. }));
    }

    #[test]
    fn hit_count_grammar() {
        let gt = HitCountCondition::parse(">5").unwrap();
        for count in 0..=5u64 {
            assert!(!gt.should_pause(count), "must not pause at {count}");
        }
        assert!(gt.should_pause(6));
        assert!(gt.should_pause(100));

        let eq = HitCountCondition::parse("= 3").unwrap();
        assert_eq!(eq.op, HitCountOp::Equal);
        assert!(eq.should_pause(3));
        assert!(!eq.should_pause(4));

        let bare = HitCountCondition::parse("7").unwrap();
        assert_eq!(bare.op, HitCountOp::Equal);

        let le = HitCountCondition::parse("<=1").unwrap();
        assert!(le.should_pause(0));
        assert!(le.should_pause(1));
        assert!(!le.should_pause(2));
    }

    #[test]
    fn modulo_pauses_with_the_pre_increment_count() {
        // The counter is consulted before it is incremented, so the first
        // hit sees count 0 and a %3 condition pauses immediately.
        let modulo = HitCountCondition::parse("%3").unwrap();
        let pauses: Vec<u64> = (0..8).filter(|&count| modulo.should_pause(count)).collect();
        assert_eq!(pauses, vec![0, 3, 6]);
    }

    #[test]
    fn delta_key_distinguishes_actions_at_one_position() {
        use vigil_core::{PathSensitivity, Position, ResourceIdentifier};
        let source = ResourceIdentifier::parse("/srv/a.js", PathSensitivity::CaseSensitive);
        let at = |action: ActionWhenHit| {
            BPRecipeInSource::new(
                LocationInSource::new(source.clone(), Position::new(3, Some(0))),
                action,
            )
        };
        let always = at(ActionWhenHit::AlwaysPause);
        let logging = at(ActionWhenHit::LogMessage {
            message: "hi".to_string(),
        });
        assert_ne!(always.delta_key(), logging.delta_key());
        assert_eq!(always.delta_key(), at(ActionWhenHit::AlwaysPause).delta_key());
    }
}

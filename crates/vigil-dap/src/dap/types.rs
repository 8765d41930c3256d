//! serde types for the breakpoint-related DAP requests and events.
//!
//! DAP lines and columns are 1-based on the wire; the internal model is
//! 0-based. The conversion happens in this module and nowhere else.

use serde::{Deserialize, Serialize};

use vigil_core::Position;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_reference: Option<i64>,
}

impl Source {
    pub fn from_path(path: impl Into<String>) -> Self {
        Self {
            name: None,
            path: Some(path.into()),
            source_reference: None,
        }
    }
}

/// One row of a `setBreakpoints` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBreakpoint {
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hit_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_message: Option<String>,
}

impl SourceBreakpoint {
    /// The 0-based internal position. An omitted column means the start of
    /// the line; 0 is out of spec but some clients send it, so both clamp.
    pub fn position(&self) -> Position {
        Position::new(
            self.line.saturating_sub(1),
            Some(self.column.map_or(0, |column| column.saturating_sub(1))),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointsArguments {
    pub source: Source,
    #[serde(default)]
    pub breakpoints: Vec<SourceBreakpoint>,
}

/// A breakpoint as reported to the client, in responses and in `breakpoint`
/// events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl Breakpoint {
    pub fn verified_at(id: i64, position: Position) -> Self {
        Self {
            id: Some(id),
            verified: true,
            message: None,
            line: Some(position.line + 1),
            column: position.column.map(|column| column + 1),
        }
    }

    pub fn unverified(id: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            id,
            verified: false,
            message: Some(message.into()),
            line: None,
            column: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointEventBody {
    /// `"new"`, `"changed"` or `"removed"`.
    pub reason: &'static str,
    pub breakpoint: Breakpoint,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointLocationsArguments {
    pub source: Source,
    pub line: u32,
    #[serde(default)]
    pub column: Option<u32>,
    #[serde(default)]
    pub end_line: Option<u32>,
    #[serde(default)]
    pub end_column: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointLocation {
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl BreakpointLocation {
    pub fn from_position(position: Position) -> Self {
        Self {
            line: position.line + 1,
            column: position.column.map(|column| column + 1),
        }
    }
}

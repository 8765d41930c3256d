//! Core shared types for Vigil.
//!
//! This crate is intentionally small: source identifiers and text positions,
//! nothing that needs a runtime.

mod identifier;
mod position;

pub use identifier::{IdentifierKind, PathKind, PathSensitivity, ResourceIdentifier};
pub use position::Position;

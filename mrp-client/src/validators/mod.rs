//! Schema validation layer
//!
//! Pure, synchronous validation of observation payloads against declarative
//! per-kind rule tables, plus the status-advancing entry point used by the
//! submission pipeline.
//!
//! - `rules`: rule tables (required markers, reference ranges, rating
//!   scales, text caps, format patterns) and per-protocol safety parameters
//! - `schema_validator`: applies the tables to a payload

pub mod rules;
pub mod schema_validator;

pub use rules::{MarkerRange, ProtocolSafetyParameters, SafetyThreshold};
pub use schema_validator::{apply_validation, validate};

//! Field mapping engine.
//!
//! This module turns decoded attribute trees into campaign-API records:
//! - `rules`: rule, profile, and derivation definitions
//! - `engine`: rule resolution, type coercion, and record assembly
//!
//! ## Usage Flow
//!
//! ```text
//! decode → RawRecord → engine::map_record(raw, profile) → TargetRecord
//!                                                       ↘ MappingFailure
//! ```

pub mod engine;
pub mod rules;

// Re-exports for convenience
pub use engine::{map_record, resolve_path};
pub use rules::{
    example_profile, Derivation, MappingProfile, MappingRule, ProfileSet, RuleSource, TargetType,
};

//! Shared types for the updraft update client: the appcast document model,
//! the feed version ordering and localized string resolution.
//!
//! This crate is pure data plus validation. Parsing, selection, crypto and
//! transport live in `updraft-core`.

pub mod appcast;
pub mod lang;
pub mod version;

// Re-exports
pub use appcast::{
    Appcast, Enclosure, ReleaseItem, SelectedUpdate, SignatureAlgorithm, ValidationError,
};
pub use lang::{LangKey, LocalizedText, resolve_localized};
pub use version::{Version, compare_ignore_case, compare_versions};

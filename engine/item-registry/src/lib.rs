//! Item Registry - Item identity and applicability filters
//!
//! This crate describes what an item is for pricing purposes and which
//! tracker a given item belongs to. The pricing engine never inspects items
//! itself: it asks an [`ApplicabilityFilter`] whether an item matches, and
//! asks a [`FilterLookup`] service to turn configuration keys such as
//! `minecraft:diamond`, `minecraft:wool:14` or `$shiny_sword` into filters.

pub mod definitions;
pub mod error;
pub mod filter;
pub mod registry;
pub mod types;

pub use definitions::{FilterKind, ItemDefinition};
pub use error::RegistryError;
pub use filter::ApplicabilityFilter;
pub use registry::{FilterLookup, ItemRegistry};
pub use types::{ItemInstance, ItemType};

// Result type alias
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Namespace assumed for specifiers that omit one
pub const DEFAULT_NAMESPACE: &str = "minecraft";

/// Prefix that marks a named item definition
pub const DEFINITION_PREFIX: char = '$';

/// Variant token meaning "any variant"
pub const VARIANT_WILDCARD: &str = "*";

//! Error types for the item registry

use thiserror::Error;

/// Errors raised while parsing specifiers or loading item definitions
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Unknown item type: {0}")]
    UnknownItemType(String),

    #[error("Invalid item specifier '{0}'")]
    InvalidSpecifier(String),

    #[error("Invalid variant '{variant}' in specifier '{specifier}'")]
    InvalidVariant { specifier: String, variant: String },

    #[error("Invalid item definition '{name}': {reason}")]
    InvalidDefinition { name: String, reason: String },

    #[error("Unknown item definition: {0}")]
    UnknownDefinition(String),
}

//! Error types for the pricing engine

use std::fmt::Display;
use thiserror::Error;

/// Errors that can occur while configuring or operating the pricing engine
#[derive(Error, Debug)]
pub enum PricingError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("{what} out of range: {value} not within [{min}, {max}]")]
    OutOfRange { what: &'static str, value: String, min: String, max: String },

    #[error("Invariant violation: {message}")]
    InvariantViolation { message: String },

    #[error("Preview is stale: the {tier} tracker for {item} changed since it was computed")]
    StalePreview { tier: String, item: String },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl PricingError {
    pub fn configuration(message: impl Into<String>) -> Self {
        PricingError::Configuration { message: message.into() }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        PricingError::InvariantViolation { message: message.into() }
    }

    pub fn out_of_range(
        what: &'static str,
        value: impl Display,
        min: impl Display,
        max: impl Display,
    ) -> Self {
        PricingError::OutOfRange {
            what,
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }
}

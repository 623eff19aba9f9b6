//! Named item definitions (`$name` keys)

use crate::{ItemInstance, RegistryError, Result};
use serde::{Deserialize, Serialize};

/// Which kind of filter a definition produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Match by item type
    Type,
    /// Match by item type and variant (`*` degrades to [`FilterKind::Type`])
    TypeVariant,
    /// Match exact content
    Exact,
}

/// One entry of the `[items]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub filter: FilterKind,

    /// Type specifier, used by `type` and `type_variant`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub specifier: Option<String>,

    /// Template item, used by `exact`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<ItemInstance>,
}

impl ItemDefinition {
    pub fn by_specifier(filter: FilterKind, specifier: impl Into<String>) -> Self {
        Self { filter, specifier: Some(specifier.into()), item: None }
    }

    pub fn exact(item: ItemInstance) -> Self {
        Self { filter: FilterKind::Exact, specifier: None, item: Some(item) }
    }

    /// Check that the fields required by the filter kind are present
    pub fn validate(&self, name: &str) -> Result<()> {
        let invalid = |reason: &str| RegistryError::InvalidDefinition {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if !name.starts_with(crate::DEFINITION_PREFIX) || name.len() < 2 {
            return Err(invalid("definition names must start with '$'"));
        }

        match self.filter {
            FilterKind::Type | FilterKind::TypeVariant if self.specifier.is_none() => {
                Err(invalid("missing 'type'"))
            }
            FilterKind::Exact if self.item.is_none() => Err(invalid("missing 'item'")),
            _ => Ok(()),
        }
    }
}

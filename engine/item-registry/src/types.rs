use crate::{RegistryError, Result, DEFAULT_NAMESPACE};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespaced item type identifier, e.g. `minecraft:diamond`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemType {
    namespace: String,
    path: String,
}

impl ItemType {
    /// Create an item type from its two segments
    pub fn new(namespace: impl Into<String>, path: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        let path = path.into();
        if !is_valid_segment(&namespace) || !is_valid_segment(&path) {
            return Err(RegistryError::InvalidSpecifier(format!("{namespace}:{path}")));
        }
        Ok(Self { namespace, path })
    }

    /// Parse `namespace:path` or a bare `path` (which gets the default namespace)
    pub fn parse(id: &str) -> Result<Self> {
        match id.split_once(':') {
            Some((namespace, path)) => Self::new(namespace, path),
            None => Self::new(DEFAULT_NAMESPACE, id),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Segments are lowercase identifiers as used by resource locations
fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '.' | '/'))
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

impl TryFrom<String> for ItemType {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ItemType> for String {
    fn from(value: ItemType) -> Self {
        value.to_string()
    }
}

/// A concrete stack of items offered in a transaction
///
/// `quantity` is carried for the host's convenience but never takes part in
/// identity: two stacks of the same item with different sizes are the same
/// item for pricing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemInstance {
    #[serde(rename = "type")]
    pub item_type: ItemType,

    /// Variant / damage value
    #[serde(default)]
    pub variant: u16,

    #[serde(default = "default_quantity")]
    pub quantity: u32,

    /// Opaque extra content (enchantments, names, ...)
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
}

fn default_quantity() -> u32 {
    1
}

impl ItemInstance {
    /// Create a plain single item of the given type
    pub fn new(item_type: ItemType) -> Self {
        Self { item_type, variant: 0, quantity: 1, data: serde_json::Value::Null }
    }

    pub fn with_variant(mut self, variant: u16) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Compare everything except the quantity
    pub fn same_content(&self, other: &ItemInstance) -> bool {
        self.item_type == other.item_type && self.variant == other.variant && self.data == other.data
    }
}

impl fmt::Display for ItemInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.variant == 0 {
            write!(f, "{}", self.item_type)
        } else {
            write!(f, "{}:{}", self.item_type, self.variant)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_item_type() {
        let diamond = ItemType::parse("minecraft:diamond").unwrap();
        assert_eq!(diamond.namespace(), "minecraft");
        assert_eq!(diamond.path(), "diamond");
        assert_eq!(diamond.to_string(), "minecraft:diamond");

        let bare = ItemType::parse("stone").unwrap();
        assert_eq!(bare.to_string(), "minecraft:stone");
    }

    #[test]
    fn test_reject_malformed_type() {
        assert!(ItemType::parse("").is_err());
        assert!(ItemType::parse("minecraft:").is_err());
        assert!(ItemType::parse("Minecraft:Stone").is_err());
    }

    #[test]
    fn test_same_content_ignores_quantity() {
        let sword = ItemType::parse("minecraft:iron_sword").unwrap();
        let a = ItemInstance::new(sword.clone()).with_data(json!({"name": "Biter"})).with_quantity(1);
        let b = ItemInstance::new(sword.clone()).with_data(json!({"name": "Biter"})).with_quantity(7);
        let c = ItemInstance::new(sword).with_data(json!({"name": "Nibbler"}));

        assert!(a.same_content(&b));
        assert!(!a.same_content(&c));
    }

    #[test]
    fn test_item_instance_deserialize_defaults() {
        let item: ItemInstance = serde_json::from_value(json!({"type": "minecraft:wool"})).unwrap();
        assert_eq!(item.variant, 0);
        assert_eq!(item.quantity, 1);
        assert!(item.data.is_null());
    }
}

use crate::definitions::{FilterKind, ItemDefinition};
use crate::{
    ApplicabilityFilter, ItemType, RegistryError, Result, DEFAULT_NAMESPACE, DEFINITION_PREFIX,
    VARIANT_WILDCARD,
};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// Turns configuration keys into applicability filters
///
/// Pricing configuration names its groups by item specifier or by `$name`;
/// anything able to resolve those keys can back a configuration load.
pub trait FilterLookup {
    fn filter_for(&self, key: &str) -> Result<ApplicabilityFilter>;
}

/// Item Registry - Known item types and named definitions
///
/// With an empty catalog every well-formed type is accepted, which is what
/// hosts without a fixed item list want. Registering at least one type turns
/// on strict checking.
#[derive(Debug, Clone)]
pub struct ItemRegistry {
    /// Namespace used by specifiers that omit one
    default_namespace: String,

    /// Catalog of known item types
    known_types: HashSet<ItemType>,

    /// `$name` definitions with their resolved filters
    definitions: BTreeMap<String, (ItemDefinition, ApplicabilityFilter)>,
}

impl ItemRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            default_namespace: DEFAULT_NAMESPACE.to_string(),
            known_types: HashSet::new(),
            definitions: BTreeMap::new(),
        }
    }

    pub fn with_default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = namespace.into();
        self
    }

    /// Add a type to the catalog
    pub fn register_type(&mut self, item_type: ItemType) {
        self.known_types.insert(item_type);
    }

    pub fn register_types<I: IntoIterator<Item = ItemType>>(&mut self, types: I) {
        self.known_types.extend(types);
    }

    pub fn is_known(&self, item_type: &ItemType) -> bool {
        self.known_types.is_empty() || self.known_types.contains(item_type)
    }

    /// Parse `namespace:type`, `namespace:type:variant`, `namespace:type:*`
    /// or the same forms without a namespace
    pub fn parse_specifier(&self, specifier: &str) -> Result<ApplicabilityFilter> {
        let parts: Vec<&str> = specifier.split(':').collect();
        let (namespace, path, variant) = match parts.as_slice() {
            [path] => (self.default_namespace.as_str(), *path, None),
            [path, variant] if is_variant_token(variant) => {
                (self.default_namespace.as_str(), *path, Some(*variant))
            }
            [namespace, path] => (*namespace, *path, None),
            [namespace, path, variant] => (*namespace, *path, Some(*variant)),
            _ => return Err(RegistryError::InvalidSpecifier(specifier.to_string())),
        };

        let item_type = ItemType::new(namespace, path)
            .map_err(|_| RegistryError::InvalidSpecifier(specifier.to_string()))?;
        if !self.is_known(&item_type) {
            return Err(RegistryError::UnknownItemType(item_type.to_string()));
        }

        match variant {
            None | Some(VARIANT_WILDCARD) => Ok(ApplicabilityFilter::ByType(item_type)),
            Some(raw) => {
                let variant = raw.parse::<u16>().map_err(|_| RegistryError::InvalidVariant {
                    specifier: specifier.to_string(),
                    variant: raw.to_string(),
                })?;
                Ok(ApplicabilityFilter::ByTypeAndVariant { item_type, variant })
            }
        }
    }

    /// Add or replace a named definition
    pub fn define(&mut self, name: &str, definition: ItemDefinition) -> Result<()> {
        definition.validate(name)?;
        let filter = self.resolve_definition(name, &definition)?;
        debug!("Defined item {} as {}", name, filter);
        self.definitions.insert(name.to_string(), (definition, filter));
        Ok(())
    }

    /// Load a whole `[items]` table, all or nothing
    pub fn load_definitions(&mut self, definitions: &BTreeMap<String, ItemDefinition>) -> Result<()> {
        let mut staged = self.definitions.clone();
        for (name, definition) in definitions {
            definition.validate(name)?;
            let filter = self.resolve_definition(name, definition)?;
            staged.insert(name.clone(), (definition.clone(), filter));
        }
        self.definitions = staged;
        info!("Loaded {} item definitions", definitions.len());
        Ok(())
    }

    pub fn definition(&self, name: &str) -> Option<&ApplicabilityFilter> {
        self.definitions.get(name).map(|(_, filter)| filter)
    }

    /// Definitions as they were written, for dumping configuration back out
    pub fn definitions(&self) -> BTreeMap<String, ItemDefinition> {
        self.definitions.iter().map(|(name, (definition, _))| (name.clone(), definition.clone())).collect()
    }

    fn resolve_definition(&self, name: &str, definition: &ItemDefinition) -> Result<ApplicabilityFilter> {
        let missing = || RegistryError::InvalidDefinition {
            name: name.to_string(),
            reason: "incomplete definition".to_string(),
        };

        match definition.filter {
            FilterKind::Type => {
                let specifier = definition.specifier.as_deref().ok_or_else(missing)?;
                Ok(match self.parse_specifier(specifier)? {
                    ApplicabilityFilter::ByTypeAndVariant { item_type, .. } => {
                        ApplicabilityFilter::ByType(item_type)
                    }
                    filter => filter,
                })
            }
            FilterKind::TypeVariant => {
                let specifier = definition.specifier.as_deref().ok_or_else(missing)?;
                self.parse_specifier(specifier)
            }
            FilterKind::Exact => {
                let item = definition.item.as_ref().ok_or_else(missing)?;
                if !self.is_known(&item.item_type) {
                    return Err(RegistryError::UnknownItemType(item.item_type.to_string()));
                }
                Ok(ApplicabilityFilter::ExactContent(item.clone()))
            }
        }
    }
}

fn is_variant_token(token: &str) -> bool {
    token == VARIANT_WILDCARD || (!token.is_empty() && token.chars().all(|c| c.is_ascii_digit()))
}

impl Default for ItemRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterLookup for ItemRegistry {
    fn filter_for(&self, key: &str) -> Result<ApplicabilityFilter> {
        if key.starts_with(DEFINITION_PREFIX) {
            self.definition(key).cloned().ok_or_else(|| RegistryError::UnknownDefinition(key.to_string()))
        } else {
            self.parse_specifier(key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ItemInstance;
    use serde_json::json;

    fn item_type(id: &str) -> ItemType {
        ItemType::parse(id).unwrap()
    }

    #[test]
    fn test_parse_specifier_forms() {
        let registry = ItemRegistry::new();

        assert_eq!(
            registry.parse_specifier("minecraft:stone").unwrap(),
            ApplicabilityFilter::ByType(item_type("minecraft:stone"))
        );
        assert_eq!(
            registry.parse_specifier("stone").unwrap(),
            ApplicabilityFilter::ByType(item_type("minecraft:stone"))
        );
        assert_eq!(
            registry.parse_specifier("minecraft:wool:14").unwrap(),
            ApplicabilityFilter::ByTypeAndVariant { item_type: item_type("minecraft:wool"), variant: 14 }
        );
        assert_eq!(
            registry.parse_specifier("wool:14").unwrap(),
            ApplicabilityFilter::ByTypeAndVariant { item_type: item_type("minecraft:wool"), variant: 14 }
        );
        assert_eq!(
            registry.parse_specifier("minecraft:wool:*").unwrap(),
            ApplicabilityFilter::ByType(item_type("minecraft:wool"))
        );
    }

    #[test]
    fn test_parse_specifier_errors() {
        let registry = ItemRegistry::new();

        assert!(matches!(registry.parse_specifier("a:b:c:d"), Err(RegistryError::InvalidSpecifier(_))));
        assert!(matches!(
            registry.parse_specifier("minecraft:wool:red"),
            Err(RegistryError::InvalidVariant { .. })
        ));
        assert!(matches!(registry.parse_specifier(":stone"), Err(RegistryError::InvalidSpecifier(_))));
    }

    #[test]
    fn test_catalog_enables_strict_checking() {
        let mut registry = ItemRegistry::new();
        registry.register_type(item_type("minecraft:diamond"));

        assert!(registry.parse_specifier("minecraft:diamond").is_ok());
        assert_eq!(
            registry.parse_specifier("minecraft:dirt"),
            Err(RegistryError::UnknownItemType("minecraft:dirt".to_string()))
        );
    }

    #[test]
    fn test_custom_default_namespace() {
        let registry = ItemRegistry::new().with_default_namespace("market");
        assert_eq!(
            registry.parse_specifier("apple").unwrap(),
            ApplicabilityFilter::ByType(item_type("market:apple"))
        );
    }

    #[test]
    fn test_definitions_resolve_through_lookup() {
        let mut registry = ItemRegistry::new();
        let template = ItemInstance::new(item_type("minecraft:iron_sword")).with_data(json!({"name": "Biter"}));
        registry.define("$biter", ItemDefinition::exact(template.clone())).unwrap();
        registry
            .define("$any_wool", ItemDefinition::by_specifier(FilterKind::Type, "minecraft:wool:3"))
            .unwrap();

        assert_eq!(registry.filter_for("$biter").unwrap(), ApplicabilityFilter::ExactContent(template));
        assert_eq!(
            registry.filter_for("$any_wool").unwrap(),
            ApplicabilityFilter::ByType(item_type("minecraft:wool"))
        );
        assert_eq!(
            registry.filter_for("$missing"),
            Err(RegistryError::UnknownDefinition("$missing".to_string()))
        );
        assert_eq!(registry.definitions().len(), 2);
    }

    #[test]
    fn test_load_definitions_is_all_or_nothing() {
        let mut registry = ItemRegistry::new();
        let mut table = BTreeMap::new();
        table.insert("$good".to_string(), ItemDefinition::by_specifier(FilterKind::Type, "minecraft:stone"));
        table.insert("bad".to_string(), ItemDefinition::by_specifier(FilterKind::Type, "minecraft:stone"));

        assert!(registry.load_definitions(&table).is_err());
        assert!(registry.definition("$good").is_none());
    }
}

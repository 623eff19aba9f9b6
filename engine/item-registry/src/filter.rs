use crate::{ItemInstance, ItemType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Predicate deciding whether an item belongs to a tracker
///
/// Two filters are equal when they are the same kind with the same template.
/// Exact templates compare by content, so stack quantity is ignored. Reloads
/// rely on this to line trackers up with their replacements.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "template", rename_all = "snake_case")]
pub enum ApplicabilityFilter {
    /// Matches every item
    Any,

    /// Matches items of one type regardless of variant or content
    ByType(ItemType),

    /// Matches items of one type with one exact variant
    ByTypeAndVariant { item_type: ItemType, variant: u16 },

    /// Matches items whose content equals the template, quantity excluded
    ExactContent(ItemInstance),
}

impl PartialEq for ApplicabilityFilter {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ApplicabilityFilter::Any, ApplicabilityFilter::Any) => true,
            (ApplicabilityFilter::ByType(a), ApplicabilityFilter::ByType(b)) => a == b,
            (
                ApplicabilityFilter::ByTypeAndVariant { item_type: a, variant: av },
                ApplicabilityFilter::ByTypeAndVariant { item_type: b, variant: bv },
            ) => a == b && av == bv,
            (ApplicabilityFilter::ExactContent(a), ApplicabilityFilter::ExactContent(b)) => a.same_content(b),
            _ => false,
        }
    }
}

impl ApplicabilityFilter {
    pub fn matches(&self, item: &ItemInstance) -> bool {
        match self {
            ApplicabilityFilter::Any => true,
            ApplicabilityFilter::ByType(item_type) => &item.item_type == item_type,
            ApplicabilityFilter::ByTypeAndVariant { item_type, variant } => {
                &item.item_type == item_type && item.variant == *variant
            }
            ApplicabilityFilter::ExactContent(template) => template.same_content(item),
        }
    }

    /// Filter used for trackers derived on demand for an untracked item
    pub fn derived_for(item: &ItemInstance) -> Self {
        ApplicabilityFilter::ByType(item.item_type.clone())
    }
}

impl fmt::Display for ApplicabilityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicabilityFilter::Any => write!(f, "*"),
            ApplicabilityFilter::ByType(item_type) => write!(f, "{item_type}"),
            ApplicabilityFilter::ByTypeAndVariant { item_type, variant } => {
                write!(f, "{item_type}:{variant}")
            }
            ApplicabilityFilter::ExactContent(template) => write!(f, "exact({template})"),
        }
    }
}

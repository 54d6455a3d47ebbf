// ── Tag catalog ──
//
// The fixed set of monitored data points. Built once at startup and
// shared read-only; the link owns the values, not the catalog.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::CoreError;

/// Labels of the reference deployment's 12-word input assembly, in word order.
const DEFAULT_LABELS: [&str; 12] = [
    "North Head Bearing",
    "South Head Bearing",
    "North Boot Bearing",
    "South Boot Bearing",
    "North Head Rub Block",
    "South Head Rub Block",
    "North Boot Rub Block",
    "South Boot Rub Block",
    "West Bearing",
    "East Bearing",
    "Rpm",
    "Inventory Placeholder",
];

/// One monitored data point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    name: String,
    label: Option<String>,
}

impl Tag {
    pub fn new(name: impl Into<String>, label: Option<impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            label: label.map(Into::into),
        }
    }

    /// Device-side identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable alias, if one is mapped.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The label, falling back to the device name.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// Ordered, duplicate-free list of tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCatalog {
    tags: Vec<Tag>,
}

impl TagCatalog {
    /// Build a catalog, rejecting empty catalogs and duplicate names.
    pub fn new(tags: Vec<Tag>) -> Result<Self, CoreError> {
        if tags.is_empty() {
            return Err(CoreError::Config {
                message: "tag catalog is empty".into(),
            });
        }
        let mut seen = HashSet::with_capacity(tags.len());
        for tag in &tags {
            if tag.name.trim().is_empty() {
                return Err(CoreError::Config {
                    message: "tag name must not be empty".into(),
                });
            }
            if !seen.insert(tag.name.as_str()) {
                return Err(CoreError::Config {
                    message: format!("duplicate tag name '{}'", tag.name),
                });
            }
        }
        Ok(Self { tags })
    }

    /// The reference 12-word catalog: `Data[0]` … `Data[11]`.
    pub fn reference() -> Self {
        let tags = DEFAULT_LABELS
            .iter()
            .enumerate()
            .map(|(idx, label)| Tag::new(format!("Data[{idx}]"), Some(*label)))
            .collect();
        Self { tags }
    }

    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.tags.iter().map(|t| t.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl<'a> IntoIterator for &'a TagCatalog {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

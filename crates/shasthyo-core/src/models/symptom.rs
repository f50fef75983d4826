//! Symptom reference data

use serde::{Deserialize, Serialize};

/// A selectable symptom from the master catalog.
///
/// Immutable reference data fetched from the backend once and cached
/// read-only in the local store so the picker works without a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symptom {
    /// Stable symptom identifier (e.g. `fever`, `chest_pain`)
    pub id: String,
    /// English display name
    pub name_en: String,
    /// Bangla display name
    pub name_bn: String,
    /// Icon hint for the UI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Catalog category (e.g. `respiratory`, `digestive`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Display-level severity hint from the catalog
    #[serde(default)]
    pub severity_weight: u32,
}

impl Symptom {
    /// Reduce to the wire reference shape used in triage requests
    pub fn to_ref(&self) -> SymptomRef {
        SymptomRef {
            id: self.id.clone(),
            name_en: self.name_en.clone(),
            name_bn: self.name_bn.clone(),
        }
    }
}

/// The symptom reference carried in a [`crate::models::TriageRequest`].
///
/// Matches the backend wire shape: id plus both display names, so the
/// server can echo them back without a catalog lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomRef {
    pub id: String,
    pub name_en: String,
    pub name_bn: String,
}

impl SymptomRef {
    pub fn new(
        id: impl Into<String>,
        name_en: impl Into<String>,
        name_bn: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name_en: name_en.into(),
            name_bn: name_bn.into(),
        }
    }
}

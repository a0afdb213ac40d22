//! Autocomplete and suggestion data derived from the schema registry.

use super::schema::{
    DurationUnit, FieldSpec, OperatorSpec, PresetSpec, SchemaRegistry, SpecialFilter, StageSpec,
    FIELDS,
};
use super::suggest;
use crate::config::EngineConfig;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// A catalog that can be completed or searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Field names.
    Field,
    /// Severity names.
    Severity,
    /// Subsystems seen in the dataset.
    Subsystem,
    /// Labels seen in the dataset.
    Label,
    /// Preset names.
    Preset,
}

impl Category {
    /// All categories.
    pub const ALL: [Category; 5] = [
        Self::Field,
        Self::Severity,
        Self::Subsystem,
        Self::Label,
        Self::Preset,
    ];

    /// Returns the category name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Field => "field",
            Self::Severity => "severity",
            Self::Subsystem => "subsystem",
            Self::Label => "label",
            Self::Preset => "preset",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognised category name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown category '{0}', expected one of: field, severity, subsystem, label, preset")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// One snapshot of every catalog, for building reference UIs.
#[derive(Debug, Clone, Serialize)]
pub struct AutocompleteData {
    /// Severity names, least severe first.
    pub severities: Vec<&'static str>,
    /// Known subsystems; empty until the dataset is loaded.
    pub subsystems: Vec<String>,
    /// Known labels; empty until the dataset is loaded.
    pub labels: Vec<String>,
    /// Field metadata.
    pub fields: Vec<FieldSpec>,
    /// Operator metadata.
    pub operators: Vec<OperatorSpec>,
    /// Pipeline stage metadata.
    pub pipeline_stages: Vec<StageSpec>,
    /// Duration units.
    pub duration_units: Vec<DurationUnit>,
    /// Presets.
    pub presets: Vec<PresetSpec>,
    /// Special filter forms.
    pub special_filters: Vec<SpecialFilter>,
}

impl SchemaRegistry {
    /// Builds an [`AutocompleteData`] snapshot.
    #[must_use]
    pub fn autocomplete_data(&self) -> AutocompleteData {
        AutocompleteData {
            severities: self.severities(),
            subsystems: self.subsystems().to_vec(),
            labels: self.labels().to_vec(),
            fields: self.fields().to_vec(),
            operators: self.operators().to_vec(),
            pipeline_stages: self.pipeline_stages().to_vec(),
            duration_units: self.duration_units().to_vec(),
            presets: self.presets().iter().map(|p| *p.spec).collect(),
            special_filters: self.special_filters().to_vec(),
        }
    }

    /// Names in a category, in declaration order.
    #[must_use]
    pub fn names(&self, category: Category) -> Vec<&str> {
        match category {
            Category::Field => self.fields().iter().map(|f| f.name).collect(),
            Category::Severity => self.severities(),
            Category::Subsystem => self.subsystems().iter().map(String::as_str).collect(),
            Category::Label => self.labels().iter().map(String::as_str).collect(),
            Category::Preset => self.presets().iter().map(|p| p.spec.name).collect(),
        }
    }

    /// Completes a partially typed name.
    #[must_use]
    pub fn complete(&self, category: Category, prefix: &str) -> Vec<String> {
        suggest::complete(prefix, self.names(category))
    }

    /// Near matches for a fully typed but possibly misspelled name.
    ///
    /// Field suggestions also consider aliases; canonical names win ties.
    #[must_use]
    pub fn suggest(&self, category: Category, term: &str, config: &EngineConfig) -> Vec<String> {
        match category {
            Category::Field => suggest::rank_preferring(
                term,
                FIELDS.iter().map(|f| f.name),
                FIELDS.iter().flat_map(|f| f.aliases.iter().copied()),
                config,
            ),
            _ => suggest::rank(term, self.names(category), config),
        }
    }
}

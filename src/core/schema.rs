use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use super::error::ConfigError;
use super::types::Dataset;

const RECORDS_VARIABLES_JSON: &str = include_str!("../../data/records_variables.json");

#[derive(Debug, Clone, Deserialize)]
pub struct VariableInfo {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub availability: String,
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    read: BTreeMap<String, VariableInfo>,
}

/// Input variables recognized by the downstream tax-calculation engine.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    read: BTreeMap<String, VariableInfo>,
}

/// Result of cross-checking a dataset header against registry availability.
#[derive(Debug, Default, PartialEq)]
pub struct AvailabilityMismatch {
    /// In the dataset, not marked available for the source.
    pub unexpected: BTreeSet<String>,
    /// Marked available for the source, absent from the dataset.
    pub missing: BTreeSet<String>,
}

impl SchemaRegistry {
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_json(RECORDS_VARIABLES_JSON)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let file: RegistryFile =
            serde_json::from_str(json).map_err(|e| ConfigError::Registry(e.to_string()))?;
        Ok(Self { read: file.read })
    }

    pub fn is_usable(&self, name: &str) -> bool {
        self.read.contains_key(name)
    }

    pub fn usable_names(&self) -> impl Iterator<Item = &str> {
        self.read.keys().map(String::as_str)
    }

    /// Names whose availability lists `source` (e.g. `taxdata_puf`).
    pub fn available_in(&self, source: &str) -> BTreeSet<String> {
        self.read
            .iter()
            .filter(|(_, info)| info.availability.split(',').any(|s| s.trim() == source))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn availability_mismatch(&self, dataset: &Dataset, source: &str) -> AvailabilityMismatch {
        let expected = self.available_in(source);
        let present: BTreeSet<String> = dataset.column_names().map(str::to_string).collect();
        AvailabilityMismatch {
            unexpected: present.difference(&expected).cloned().collect(),
            missing: expected.difference(&present).cloned().collect(),
        }
    }

    /// Dataset columns the registry does not recognize at all.
    pub fn unknown_columns<'a>(&self, dataset: &'a Dataset) -> Vec<&'a str> {
        dataset
            .column_names()
            .filter(|name| !self.is_usable(name))
            .collect()
    }
}

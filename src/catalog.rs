//! The validated, in-memory form of the per-OTA scraping specification.

use crate::error::ConfigurationError;
use crate::models::{OutputFieldSpec, PropertySpec};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Input names a URL template may ask for
pub const KNOWN_INPUTS: [&str; 5] = ["location", "destination_id", "checkin", "checkout", "page"];

/// Raw shape of one OTA entry in the JSON document
#[derive(Debug, Deserialize)]
struct RawEntry {
    url: Option<String>,
    inputs: Option<Vec<String>>,
    outputs: Option<Vec<OutputFieldSpec>>,
}

/// All OTA specifications, in document order
#[derive(Debug, Clone, Default)]
pub struct ParameterCatalog {
    specs: Vec<PropertySpec>,
}

impl ParameterCatalog {
    /// Parse and validate a property specification document
    pub fn load(source: &str) -> Result<Self, ConfigurationError> {
        if source.trim().is_empty() {
            return Err(ConfigurationError::Empty);
        }

        let document: Value = serde_json::from_str(source)?;
        let Value::Object(otas) = document else {
            return Err(ConfigurationError::NotAnObject);
        };
        if otas.is_empty() {
            return Err(ConfigurationError::Empty);
        }

        let specs = otas
            .into_iter()
            .map(|(ota_id, entries)| parse_ota(ota_id, entries))
            .collect::<Result<Vec<_>, _>>()?;

        info!("Loaded {} OTA properties to begin scraping", specs.len());
        Ok(Self { specs })
    }

    /// Read and validate a property specification file
    pub async fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read property specification {}", path.display()))?;
        let catalog = Self::load(&source)
            .with_context(|| format!("Invalid property specification {}", path.display()))?;
        Ok(catalog)
    }

    pub fn from_specs(specs: Vec<PropertySpec>) -> Self {
        Self { specs }
    }

    pub fn get(&self, ota_id: &str) -> Option<&PropertySpec> {
        self.specs.iter().find(|spec| spec.ota_id == ota_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertySpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl<'a> IntoIterator for &'a ParameterCatalog {
    type Item = &'a PropertySpec;
    type IntoIter = std::slice::Iter<'a, PropertySpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.specs.iter()
    }
}

fn parse_ota(ota_id: String, entries: Value) -> Result<PropertySpec, ConfigurationError> {
    let mut entries: Vec<RawEntry> = serde_json::from_value(entries)
        .map_err(|e| ConfigurationError::entry(&ota_id, e.to_string()))?;

    let entry = match entries.len() {
        1 => entries.remove(0),
        0 => return Err(ConfigurationError::entry(&ota_id, "has no entries")),
        n => {
            return Err(ConfigurationError::entry(
                &ota_id,
                format!("expected exactly one entry, found {}", n),
            ))
        }
    };

    let url_template = entry
        .url
        .ok_or_else(|| ConfigurationError::entry(&ota_id, "missing url"))?;
    let inputs = entry
        .inputs
        .ok_or_else(|| ConfigurationError::entry(&ota_id, "missing inputs"))?;
    let output_fields = entry
        .outputs
        .ok_or_else(|| ConfigurationError::entry(&ota_id, "missing outputs"))?;

    let required_inputs: BTreeSet<String> = inputs.into_iter().collect();
    for input in required_inputs.iter().filter(|i| !KNOWN_INPUTS.contains(&i.as_str())) {
        warn!("OTA {}: unrecognized input {}", ota_id, input);
    }

    let mut seen = HashSet::new();
    for field in &output_fields {
        if !seen.insert(field.variable_name.as_str()) {
            return Err(ConfigurationError::DuplicateVariable {
                ota: ota_id,
                variable: field.variable_name.clone(),
            });
        }
    }

    debug!(
        "OTA {}: {} inputs, {} output fields",
        ota_id,
        required_inputs.len(),
        output_fields.len()
    );

    Ok(PropertySpec {
        ota_id,
        url_template,
        required_inputs,
        output_fields,
    })
}

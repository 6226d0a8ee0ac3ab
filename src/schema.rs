//! Per-OTA lookup of output fields to compiled HTML selectors.

use crate::catalog::ParameterCatalog;
use crate::models::OutputFieldSpec;
use scraper::Selector;
use tracing::{debug, warn};

/// One output field with its compiled selector
#[derive(Debug, Clone)]
pub struct FieldSelector {
    pub variable_name: String,
    pub tag: String,
    pub selector_code: String,
    /// The CSS the (tag, selector_code) pair compiled to
    pub css: String,
    pub selector: Selector,
}

impl FieldSelector {
    fn compile(field: &OutputFieldSpec) -> Result<Self, String> {
        let css = css_selector(&field.tag, &field.selector_code);
        let selector = Selector::parse(&css).map_err(|e| format!("invalid selector {}: {}", css, e))?;
        Ok(Self {
            variable_name: field.variable_name.clone(),
            tag: field.tag.clone(),
            selector_code: field.selector_code.clone(),
            css,
            selector,
        })
    }
}

/// Extraction schema for a single OTA
#[derive(Debug, Clone)]
pub struct OtaSchema {
    pub ota_id: String,
    /// Selector for the repeating block, `None` when the OTA declares none
    pub content_block: Option<FieldSelector>,
    /// Leaf fields in declaration order
    pub fields: Vec<FieldSelector>,
}

/// Something left out of the schema while building it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    pub ota_id: String,
    /// `None` when the whole OTA was left out
    pub variable_name: Option<String>,
    pub reason: String,
}

/// Output field selectors for every OTA with at least one output
#[derive(Debug, Clone, Default)]
pub struct ExtractionSchema {
    otas: Vec<OtaSchema>,
}

impl ExtractionSchema {
    /// Flatten every OTA's outputs into a per-OTA lookup.
    ///
    /// An OTA with no outputs is left out; a field whose selector does not
    /// compile is dropped from its OTA. Both are reported, neither is fatal.
    pub fn build(catalog: &ParameterCatalog) -> (Self, Vec<SchemaIssue>) {
        let mut otas = Vec::with_capacity(catalog.len());
        let mut issues = Vec::new();

        for spec in catalog {
            if spec.output_fields.is_empty() {
                warn!("OTA {}: no output fields, leaving it out of the schema", spec.ota_id);
                issues.push(SchemaIssue {
                    ota_id: spec.ota_id.clone(),
                    variable_name: None,
                    reason: "no output fields".to_string(),
                });
                continue;
            }

            let mut schema = OtaSchema {
                ota_id: spec.ota_id.clone(),
                content_block: None,
                fields: Vec::with_capacity(spec.output_fields.len()),
            };

            for field in &spec.output_fields {
                match FieldSelector::compile(field) {
                    Ok(selector) if field.is_content_block() => schema.content_block = Some(selector),
                    Ok(selector) => schema.fields.push(selector),
                    Err(reason) => {
                        warn!("OTA {} field {}: {}", spec.ota_id, field.variable_name, reason);
                        issues.push(SchemaIssue {
                            ota_id: spec.ota_id.clone(),
                            variable_name: Some(field.variable_name.clone()),
                            reason,
                        });
                    }
                }
            }

            debug!(
                "OTA {}: {} leaf fields, content block {}",
                spec.ota_id,
                schema.fields.len(),
                schema
                    .content_block
                    .as_ref()
                    .map(|c| c.css.as_str())
                    .unwrap_or("missing")
            );
            otas.push(schema);
        }

        (Self { otas }, issues)
    }

    pub fn get(&self, ota_id: &str) -> Option<&OtaSchema> {
        self.otas.iter().find(|schema| schema.ota_id == ota_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OtaSchema> {
        self.otas.iter()
    }

    /// The flattened table: (ota_id, variable_name, tag, selector_code)
    pub fn rows(&self) -> impl Iterator<Item = (&str, &str, &str, &str)> {
        self.otas.iter().flat_map(|schema| {
            schema
                .content_block
                .iter()
                .chain(schema.fields.iter())
                .map(move |field| {
                    (
                        schema.ota_id.as_str(),
                        field.variable_name.as_str(),
                        field.tag.as_str(),
                        field.selector_code.as_str(),
                    )
                })
        })
    }

    /// Leaf field names across all OTAs, first appearance wins the position
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for field in self.otas.iter().flat_map(|schema| schema.fields.iter()) {
            if !names.contains(&field.variable_name) {
                names.push(field.variable_name.clone());
            }
        }
        names
    }

    pub fn len(&self) -> usize {
        self.otas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.otas.is_empty()
    }
}

/// Turn a (tag, selector_code) pair into CSS.
///
/// A code starting with `.`, `#`, `[` or `:` is already CSS and is appended to
/// the tag. Otherwise it is a class attribute value: every whitespace
/// separated class must be present on the element.
pub fn css_selector(tag: &str, selector_code: &str) -> String {
    let tag = tag.trim();
    let code = selector_code.trim();

    if code.starts_with(['.', '#', '[', ':']) {
        let tag = if tag.is_empty() { "*" } else { tag };
        return format!("{}{}", tag, code);
    }

    let mut css = if tag.is_empty() { "*".to_string() } else { tag.to_string() };
    for class in code.split_whitespace() {
        let escaped = class.replace('\\', "\\\\").replace('"', "\\\"");
        css.push_str(&format!("[class~=\"{}\"]", escaped));
    }
    css
}

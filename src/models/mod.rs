use chrono::{DateTime, NaiveDate, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeSet;

/// Reserved output variable that marks the repeating-block selector
pub const CONTENT_BLOCK: &str = "content_block";

/// Scraping specification for one online travel agency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySpec {
    pub ota_id: String,
    pub url_template: String,
    pub required_inputs: BTreeSet<String>,
    pub output_fields: Vec<OutputFieldSpec>,
}

impl PropertySpec {
    /// Whether the URL template consumes the named input
    pub fn requires(&self, input: &str) -> bool {
        self.required_inputs.contains(input)
    }
}

/// One extractable field: the element name and the class/attribute matcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFieldSpec {
    #[serde(rename = "variable")]
    pub variable_name: String,
    pub tag: String,
    #[serde(rename = "code")]
    pub selector_code: String,
}

impl OutputFieldSpec {
    pub fn is_content_block(&self) -> bool {
        self.variable_name == CONTENT_BLOCK
    }
}

/// The concrete values a request URL was generated from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestParams {
    pub identifier: String,
    pub checkin: Option<NaiveDate>,
    pub checkout: Option<NaiveDate>,
    pub page: Option<u32>,
}

/// A fully resolved, ready-to-fetch URL plus its generating parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub ota_id: String,
    pub resolved_url: String,
    pub params: RequestParams,
}

/// Fields pulled out of one repeating block, in schema order.
///
/// Fields whose lookup failed are absent rather than empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedRecord {
    fields: Vec<(String, String)>,
}

impl ExtractedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl Serialize for ExtractedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// An extracted record joined with the request it came from
#[derive(Debug, Clone, Serialize)]
pub struct ScrapedRow {
    pub ota_id: String,
    pub url: String,
    #[serde(flatten)]
    pub params: RequestParams,
    pub record: ExtractedRecord,
    pub scraped_at: DateTime<Utc>,
}

impl ScrapedRow {
    pub fn new(descriptor: &RequestDescriptor, record: ExtractedRecord) -> Self {
        Self {
            ota_id: descriptor.ota_id.clone(),
            url: descriptor.resolved_url.clone(),
            params: descriptor.params.clone(),
            record,
            scraped_at: Utc::now(),
        }
    }
}

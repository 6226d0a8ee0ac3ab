use thiserror::Error;

/// Malformed or missing scraping specification. Fatal to a run.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("property specification is empty")]
    Empty,
    #[error("property specification is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("scrape options document is invalid: {0}")]
    MalformedOptions(#[source] serde_json::Error),
    #[error("property specification must be an object keyed by OTA id")]
    NotAnObject,
    #[error("OTA {ota}: {reason}")]
    InvalidEntry { ota: String, reason: String },
    #[error("OTA {ota}: output variable {variable} is declared more than once")]
    DuplicateVariable { ota: String, variable: String },
    #[error("invalid scrape option {name}: {reason}")]
    InvalidOption { name: &'static str, reason: String },
}

impl ConfigurationError {
    pub(crate) fn entry(ota: &str, reason: impl Into<String>) -> Self {
        Self::InvalidEntry {
            ota: ota.to_string(),
            reason: reason.into(),
        }
    }
}

/// A URL template that cannot be expanded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("URL template is empty")]
    InvalidTemplate,
}

/// Schema or document defects for a single fetched page
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("OTA {0} has no content_block selector")]
    MissingContentBlock(String),
    #[error("no content blocks matched {selector} for OTA {ota}")]
    NoContent { ota: String, selector: String },
}

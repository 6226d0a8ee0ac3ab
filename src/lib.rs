//! URL generation and schema-driven record extraction for online travel
//! agency (OTA) listing pages.
//!
//! - [`catalog`]: per-OTA scraping specification
//! - [`template`]: placeholder substitution in URL templates
//! - [`plan`]: cross-product of identifiers, checkin dates and pages
//! - [`schema`] / [`extract`]: tag and class driven extraction of records
//! - [`scrapers`]: fetching pages and running a whole plan

pub mod catalog;
pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod output;
pub mod plan;
pub mod schema;
pub mod scrapers;
pub mod template;

pub use catalog::ParameterCatalog;
pub use error::{ConfigurationError, ExtractionError, TemplateError};
pub use models::{ExtractedRecord, OutputFieldSpec, PropertySpec, RequestDescriptor, ScrapedRow};
pub use plan::{GenerationParams, PlanEntry, RequestPlanGenerator};
pub use schema::ExtractionSchema;

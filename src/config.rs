//! Run configuration: command-line arguments layered over an optional
//! scrape-options document, layered over built-in defaults.

use crate::error::ConfigurationError;
use crate::output::OutputFormat;
use crate::plan::{GenerationParams, IdentifierDomain};
use crate::scrapers::runner::DEFAULT_CONCURRENCY;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_LOCATIONS: [&str; 3] = ["Las Vegas", "New York", "Orlando"];

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "ota-scout")]
#[command(about = "Generate OTA listing URLs and extract property, room and rate data", long_about = None)]
pub struct Args {
    /// JSON property specification keyed by OTA id
    #[arg(short, long, default_value = "data/properties.json")]
    pub properties: PathBuf,

    /// JSON scrape options (pageOffset, pageUpperLimit, startDate, ...)
    #[arg(short, long)]
    pub options: Option<PathBuf>,

    /// Location or destination id to search (repeatable)
    #[arg(short, long = "location")]
    pub locations: Vec<String>,

    /// Placeholder the identifiers bind to: location or destination_id
    #[arg(long)]
    pub identifier_field: Option<IdentifierDomain>,

    /// First checkin date (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Exclusive end of the checkin range (YYYY-MM-DD)
    #[arg(long)]
    pub end_date: Option<NaiveDate>,

    /// Pagination step size
    #[arg(long)]
    pub page_offset: Option<u32>,

    /// Largest page value, inclusive
    #[arg(long)]
    pub page_upper_limit: Option<u32>,

    /// Nights per stay
    #[arg(long)]
    pub checkout_offset: Option<i64>,

    /// Pages fetched concurrently
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Directory for the run's output file
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,

    /// Print the generated URLs instead of fetching them
    #[arg(long)]
    pub dry_run: bool,
}

impl Args {
    /// The scrape options given on the command line
    pub fn scrape_options(&self) -> ScrapeOptions {
        ScrapeOptions {
            page_offset: self.page_offset,
            page_upper_limit: self.page_upper_limit,
            start_date: self.start_date,
            end_date: self.end_date,
            checkout_offset: self.checkout_offset,
            locations: (!self.locations.is_empty()).then(|| self.locations.clone()),
            identifier_field: self.identifier_field,
            concurrency: self.concurrency,
        }
    }
}

/// Optional scrape settings; anything unset falls back to a default
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScrapeOptions {
    pub page_offset: Option<u32>,
    pub page_upper_limit: Option<u32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub checkout_offset: Option<i64>,
    pub locations: Option<Vec<String>>,
    pub identifier_field: Option<IdentifierDomain>,
    pub concurrency: Option<usize>,
}

/// Everything a run needs once all layers are resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub params: GenerationParams,
    pub identifiers: Vec<String>,
    pub concurrency: usize,
}

impl ScrapeOptions {
    pub fn load(source: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(source).map_err(ConfigurationError::MalformedOptions)
    }

    pub async fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read scrape options {}", path.display()))?;
        let options = Self::load(&source)
            .with_context(|| format!("Invalid scrape options {}", path.display()))?;
        Ok(options)
    }

    /// Layer `overrides` on top of `self`
    pub fn merge(self, overrides: ScrapeOptions) -> Self {
        Self {
            page_offset: overrides.page_offset.or(self.page_offset),
            page_upper_limit: overrides.page_upper_limit.or(self.page_upper_limit),
            start_date: overrides.start_date.or(self.start_date),
            end_date: overrides.end_date.or(self.end_date),
            checkout_offset: overrides.checkout_offset.or(self.checkout_offset),
            locations: overrides.locations.or(self.locations),
            identifier_field: overrides.identifier_field.or(self.identifier_field),
            concurrency: overrides.concurrency.or(self.concurrency),
        }
    }

    /// Fill in defaults, taking `today` as the default start date
    pub fn resolve(self, today: NaiveDate) -> RunSettings {
        let start_date = self.start_date.unwrap_or_else(|| {
            info!("No scrape start date given. Setting start date to today {}", today);
            today
        });
        let mut params = GenerationParams::starting(start_date);
        if let Some(end_date) = self.end_date {
            params.end_date = end_date;
        }
        if let Some(page_offset) = self.page_offset {
            params.page_offset = page_offset;
        }
        if let Some(page_upper_limit) = self.page_upper_limit {
            params.page_upper_limit = page_upper_limit;
        }
        if let Some(checkout_offset) = self.checkout_offset {
            params.checkout_offset = checkout_offset;
        }
        if let Some(identifier_field) = self.identifier_field {
            params.identifier_domain = identifier_field;
        }

        let identifiers = self
            .locations
            .unwrap_or_else(|| DEFAULT_LOCATIONS.iter().map(|l| l.to_string()).collect());

        RunSettings {
            params,
            identifiers,
            concurrency: self.concurrency.unwrap_or(DEFAULT_CONCURRENCY),
        }
    }
}

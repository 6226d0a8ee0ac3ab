use crate::error::ExtractionError;
use crate::extract;
use crate::models::{RequestDescriptor, ScrapedRow};
use crate::output::RowSink;
use crate::plan::{OtaSkip, PlanEntry};
use crate::schema::ExtractionSchema;
use crate::scrapers::traits::PageFetcher;
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

pub const DEFAULT_CONCURRENCY: usize = 4;

/// A request whose page could not be retrieved
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub ota_id: String,
    pub url: String,
    pub error: String,
}

/// What a scrape run produced and what it had to leave out
#[derive(Debug, Default)]
pub struct RunReport {
    /// Rows handed to the sink
    pub records: usize,
    /// Requests attempted
    pub requests: usize,
    /// Pages fetched and handed to extraction
    pub pages: usize,
    pub skipped_otas: Vec<OtaSkip>,
    pub failed_fetches: Vec<FetchFailure>,
    /// Pages where no content block matched
    pub empty_pages: usize,
    /// Pages whose OTA has no usable extraction schema
    pub unextractable_pages: usize,
}

enum Outcome {
    Skipped(OtaSkip),
    Fetched(RequestDescriptor, anyhow::Result<String>),
}

/// Fetches every request of a plan and extracts records from the pages
pub struct ScrapeRunner<F> {
    fetcher: F,
    concurrency: usize,
}

impl<F: PageFetcher> ScrapeRunner<F> {
    pub fn new(fetcher: F) -> Self {
        Self::with_concurrency(fetcher, DEFAULT_CONCURRENCY)
    }

    pub fn with_concurrency(fetcher: F, concurrency: usize) -> Self {
        Self {
            fetcher,
            concurrency: concurrency.max(1),
        }
    }

    /// Run the plan to completion, passing each page's rows to `sink`.
    ///
    /// Up to `concurrency` pages are in flight at once; results are handled
    /// in plan order. Fetch and extraction failures are counted in the
    /// report, only a failing sink stops the run.
    pub async fn run<I, S>(&self, plan: I, schema: &ExtractionSchema, sink: &mut S) -> Result<RunReport>
    where
        I: IntoIterator<Item = PlanEntry>,
        S: RowSink,
    {
        info!(
            "Scraping with {} fetcher, {} requests in flight",
            self.fetcher.name(),
            self.concurrency
        );

        let fetcher = &self.fetcher;
        let mut outcomes = stream::iter(plan)
            .map(|entry| async move {
                match entry {
                    PlanEntry::Skipped(skip) => Outcome::Skipped(skip),
                    PlanEntry::Request(request) => {
                        let body = fetcher.fetch(&request.resolved_url).await;
                        Outcome::Fetched(request, body)
                    }
                }
            })
            .buffered(self.concurrency);

        let mut report = RunReport::default();
        while let Some(outcome) = outcomes.next().await {
            match outcome {
                Outcome::Skipped(skip) => report.skipped_otas.push(skip),
                Outcome::Fetched(request, Ok(html)) => {
                    report.requests += 1;
                    report.pages += 1;
                    let rows = extract_page(schema, &request, &html, &mut report);
                    if !rows.is_empty() {
                        report.records += rows.len();
                        sink.write_rows(rows)
                            .with_context(|| format!("Failed to save rows from {}", request.resolved_url))?;
                    }
                }
                Outcome::Fetched(request, Err(err)) => {
                    report.requests += 1;
                    warn!("OTA {}: {:#}", request.ota_id, err);
                    report.failed_fetches.push(FetchFailure {
                        ota_id: request.ota_id,
                        url: request.resolved_url,
                        error: format!("{:#}", err),
                    });
                }
            }
        }

        info!(
            "Scraped {} records from {} of {} requests",
            report.records,
            report.pages,
            report.requests
        );
        Ok(report)
    }
}

fn extract_page(
    schema: &ExtractionSchema,
    request: &RequestDescriptor,
    html: &str,
    report: &mut RunReport,
) -> Vec<ScrapedRow> {
    let Some(ota_schema) = schema.get(&request.ota_id) else {
        warn!(
            "OTA {}: no extraction schema, skipping {}",
            request.ota_id, request.resolved_url
        );
        report.unextractable_pages += 1;
        return Vec::new();
    };

    match extract::extract(html, ota_schema) {
        Ok(records) => {
            debug!(
                "OTA {}: {} records from {}",
                request.ota_id,
                records.len(),
                request.resolved_url
            );
            records
                .into_iter()
                .map(|record| ScrapedRow::new(request, record))
                .collect()
        }
        Err(err @ ExtractionError::NoContent { .. }) => {
            warn!("{} at {}", err, request.resolved_url);
            report.empty_pages += 1;
            Vec::new()
        }
        Err(err @ ExtractionError::MissingContentBlock(_)) => {
            warn!("{}, skipping {}", err, request.resolved_url);
            report.unextractable_pages += 1;
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ParameterCatalog;
    use crate::plan::{GenerationParams, IdentifierDomain, RequestPlanGenerator, SkipReason};
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    struct FakeFetcher {
        pages: HashMap<String, String>,
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("404 for {}", url))
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    const PROPERTIES: &str = r#"{
        "booking.com": [{
            "url": "https://www.booking.com/searchresults.html?ss={location}&checkin={checkin}&checkout={checkout}&offset={page}",
            "inputs": ["location", "checkin", "checkout", "page"],
            "outputs": [
                {"variable": "content_block", "tag": "div", "code": "d20f4628d0"},
                {"variable": "hotel", "tag": "div", "code": "fcab3ed991 a23c043802"},
                {"variable": "rate", "tag": "span", "code": "fcab3ed991 bd73d13072"}
            ]
        }],
        "hotels.com": [{
            "url": "https://www.hotels.com/Hotel-Search?destination={location}&page={page}",
            "inputs": ["location", "page"],
            "outputs": [
                {"variable": "content_block", "tag": "li", "code": "uitk-card"}
            ]
        }],
        "expedia": [{
            "url": "https://www.expedia.com/Hotel-Search?destination={location}&d1={checkin}&start={page}",
            "inputs": ["location", "checkin", "page"],
            "outputs": [
                {"variable": "hotel", "tag": "h3", "code": "uitk-heading"}
            ]
        }]
    }"#;

    const LISTING: &str = r#"<html><body>
        <div class="d20f4628d0">
            <div class="fcab3ed991 a23c043802">Bellagio</div>
            <span class="fcab3ed991 bd73d13072">$210</span>
        </div>
        <div class="d20f4628d0">
            <div class="fcab3ed991 a23c043802">Aria</div>
        </div>
    </body></html>"#;

    fn params() -> GenerationParams {
        GenerationParams {
            identifier_domain: IdentifierDomain::Location,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            page_offset: 50,
            page_upper_limit: 100,
            checkout_offset: 1,
        }
    }

    #[tokio::test]
    async fn test_run_tolerates_partial_failures() {
        let catalog = ParameterCatalog::load(PROPERTIES).unwrap();
        let (schema, _) = ExtractionSchema::build(&catalog);
        let generator = RequestPlanGenerator::new(params()).unwrap();
        let locations = vec!["Las Vegas".to_string()];

        let booking = |page: u32| {
            format!(
                "https://www.booking.com/searchresults.html?ss=Las%20Vegas&checkin=2024-01-01&checkout=2024-01-02&offset={}",
                page
            )
        };
        let mut pages = HashMap::new();
        pages.insert(booking(0), LISTING.to_string());
        pages.insert(booking(50), "<html><body>No results</body></html>".to_string());
        pages.insert(
            "https://www.expedia.com/Hotel-Search?destination=Las%20Vegas&d1=2024-01-01&start=0".to_string(),
            LISTING.to_string(),
        );

        let runner = ScrapeRunner::with_concurrency(FakeFetcher { pages }, 2);
        let mut rows: Vec<ScrapedRow> = Vec::new();
        let report = runner
            .run(generator.generate(&catalog, &locations), &schema, &mut rows)
            .await
            .unwrap();

        // booking.com: 3 pages, expedia: 3 pages, hotels.com gated out
        assert_eq!(report.requests, 6);
        assert_eq!(report.pages, 3);
        assert_eq!(report.empty_pages, 1);
        assert_eq!(report.unextractable_pages, 1);
        assert_eq!(report.failed_fetches.len(), 3);
        assert_eq!(report.skipped_otas.len(), 1);
        assert_eq!(report.skipped_otas[0].ota_id, "hotels.com");
        assert_eq!(report.skipped_otas[0].reason, SkipReason::MissingInput("checkin"));

        assert_eq!(report.records, 2);
        assert_eq!(rows.len(), 2);
        let first = &rows[0];
        assert_eq!(first.ota_id, "booking.com");
        assert_eq!(first.params.identifier, "Las Vegas");
        assert_eq!(first.params.page, Some(0));
        assert_eq!(first.record.get("rate"), Some("$210"));
        assert_eq!(rows[1].record.get("hotel"), Some("Aria"));
        assert!(!rows[1].record.contains("rate"));
    }

    #[tokio::test]
    async fn test_rows_follow_plan_order() {
        let catalog = ParameterCatalog::load(PROPERTIES).unwrap();
        let (schema, _) = ExtractionSchema::build(&catalog);
        let generator = RequestPlanGenerator::new(params()).unwrap();
        let locations = vec!["Las Vegas".to_string()];

        let report = generator.generate(&catalog, &locations).into_report();
        let pages: HashMap<String, String> = report
            .requests
            .iter()
            .filter(|r| r.ota_id == "booking.com")
            .map(|r| (r.resolved_url.clone(), LISTING.to_string()))
            .collect();

        let runner = ScrapeRunner::with_concurrency(FakeFetcher { pages }, 8);
        let mut rows: Vec<ScrapedRow> = Vec::new();
        runner
            .run(generator.generate(&catalog, &locations), &schema, &mut rows)
            .await
            .unwrap();

        let row_pages: Vec<_> = rows.iter().map(|row| row.params.page.unwrap()).collect();
        assert_eq!(row_pages, vec![0, 0, 50, 50, 100, 100]);
    }

    /// Records the size of every batch and refuses the one after `limit`
    struct BatchLog {
        batches: Vec<usize>,
        limit: usize,
    }

    impl RowSink for BatchLog {
        fn write_rows(&mut self, rows: Vec<ScrapedRow>) -> Result<()> {
            if self.batches.len() == self.limit {
                anyhow::bail!("disk full");
            }
            self.batches.push(rows.len());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_rows_reach_the_sink_page_by_page() {
        let catalog = ParameterCatalog::load(PROPERTIES).unwrap();
        let (schema, _) = ExtractionSchema::build(&catalog);
        let generator = RequestPlanGenerator::new(params()).unwrap();
        let locations = vec!["Las Vegas".to_string()];

        let pages: HashMap<String, String> = generator
            .generate(&catalog, &locations)
            .into_report()
            .requests
            .iter()
            .filter(|r| r.ota_id == "booking.com")
            .map(|r| (r.resolved_url.clone(), LISTING.to_string()))
            .collect();
        let runner = ScrapeRunner::with_concurrency(FakeFetcher { pages }, 2);

        let mut sink = BatchLog { batches: vec![], limit: usize::MAX };
        let report = runner
            .run(generator.generate(&catalog, &locations), &schema, &mut sink)
            .await
            .unwrap();
        // three booking.com pages, then three expedia pages that failed to fetch
        assert_eq!(sink.batches, vec![2, 2, 2]);
        assert_eq!(report.records, 6);

        let mut sink = BatchLog { batches: vec![], limit: 1 };
        let err = runner
            .run(generator.generate(&catalog, &locations), &schema, &mut sink)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("disk full"));
        assert_eq!(sink.batches, vec![2]);
    }
}

use chrono::Local;
use clap::Parser;
use ota_scout::config::{Args, ScrapeOptions};
use ota_scout::output::{self, CsvAppender, OutputFormat};
use ota_scout::scrapers::{HttpFetcher, ScrapeRunner};
use ota_scout::{ExtractionSchema, ParameterCatalog, RequestPlanGenerator, ScrapedRow};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let started = Local::now();

    info!("🏨 OTA Scout");
    info!("==========================================");

    // Configuration errors are fatal to the whole run
    let catalog = ParameterCatalog::load_from_path(&args.properties).await?;
    let file_options = match &args.options {
        Some(path) => ScrapeOptions::load_from_path(path).await?,
        None => ScrapeOptions::default(),
    };
    let settings = file_options
        .merge(args.scrape_options())
        .resolve(started.date_naive());

    let generator = RequestPlanGenerator::new(settings.params.clone())?;
    let params = generator.params();
    info!(
        "Checkin {} through {}, pages 0..={} step {}, {} identifiers",
        params.start_date,
        params.last_checkin(),
        params.page_upper_limit,
        params.page_offset,
        settings.identifiers.len()
    );

    if args.dry_run {
        let report = generator.generate(&catalog, &settings.identifiers).into_report();
        for request in &report.requests {
            println!("{}\t{}", request.ota_id, request.resolved_url);
        }
        info!(
            "Generated {} URLs, skipped {} OTAs",
            report.requests.len(),
            report.skipped.len()
        );
        if report.requests.is_empty() {
            anyhow::bail!("No request URLs could be generated from {}", args.properties.display());
        }
        return Ok(());
    }

    let (schema, schema_issues) = ExtractionSchema::build(&catalog);
    for issue in &schema_issues {
        warn!(
            "Schema: OTA {} {}: {}",
            issue.ota_id,
            issue.variable_name.as_deref().unwrap_or("(all fields)"),
            issue.reason
        );
    }

    tokio::fs::create_dir_all(&args.output_dir).await?;
    let path = output::run_file_path(&args.output_dir, started, args.format);
    let runner = ScrapeRunner::with_concurrency(HttpFetcher::new()?, settings.concurrency);
    let plan = generator.generate(&catalog, &settings.identifiers);

    // CSV rows are appended page by page; JSON is one array written at the end
    let report = match args.format {
        OutputFormat::Csv => {
            let mut sink = CsvAppender::new(path.clone(), schema.field_names());
            let report = runner.run(plan, &schema, &mut sink).await?;
            info!("💾 Appended {} rows to {}", sink.written(), sink.path().display());
            report
        }
        OutputFormat::Json => {
            let mut rows: Vec<ScrapedRow> = Vec::new();
            let report = runner.run(plan, &schema, &mut rows).await?;
            if report.requests > 0 {
                output::write_json(&path, &rows).await?;
            }
            report
        }
    };
    if report.requests == 0 {
        anyhow::bail!("No request URLs could be generated from {}", args.properties.display());
    }

    info!("\n✅ Scraped {} records\n", report.records);
    info!(
        "Requests: {}, pages: {}, failed fetches: {}, empty pages: {}, unextractable pages: {}",
        report.requests,
        report.pages,
        report.failed_fetches.len(),
        report.empty_pages,
        report.unextractable_pages
    );
    info!(
        "OTAs skipped: {} while generating, {} while building the schema",
        report.skipped_otas.len(),
        schema_issues.iter().filter(|i| i.variable_name.is_none()).count()
    );

    Ok(())
}

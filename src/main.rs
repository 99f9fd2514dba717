use anyhow::{Context, Result};
use avitofinder::currency::CbrRateSource;
use avitofinder::extractor::RatePolicy;
use avitofinder::models::Currency;
use avitofinder::pipeline::{run_pipeline, PipelineOptions, DEFAULT_URL};
use avitofinder::sources::{HttpPage, PageSource, SavedPage};
use avitofinder::store::SqliteStore;
use avitofinder::tui::RunTUI;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Avitofinder - Car listing scraper for avito.ru")]
struct Args {
    /// Search results page to scrape
    #[clap(short, long, default_value = DEFAULT_URL)]
    url: String,

    /// Read a previously saved search page instead of fetching it
    #[clap(long, conflicts_with = "url")]
    html_file: Option<PathBuf>,

    /// Path to the SQLite database
    #[clap(short, long, default_value = "avito.db")]
    database: PathBuf,

    /// Export file; .csv and .json are recognised, anything else is written as xlsx
    #[clap(short, long, default_value = "avito_cars.xlsx")]
    output: PathBuf,

    /// Currency prices are listed in
    #[clap(long, value_enum, default_value = "rub")]
    source_currency: Currency,

    /// Currency for the converted reference price
    #[clap(long, value_enum, default_value = "eur")]
    reference_currency: Currency,

    /// Skip listings whose price cannot be converted instead of storing them without a reference price
    #[clap(long)]
    strict_rates: bool,

    /// Maximum number of listings to process (if not set, process the whole page)
    #[clap(short = 'i', long)]
    max_items: Option<usize>,

    /// Only update the database, do not write the export file
    #[clap(long)]
    no_export: bool,

    /// Enable debug logging
    #[clap(long)]
    debug: bool,
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    println!("Avitofinder - Car listing scraper for avito.ru");
    println!("==============================================");

    let page_source: Box<dyn PageSource> = match &args.html_file {
        Some(path) => Box::new(SavedPage { path: path.clone() }),
        None => Box::new(HttpPage { url: args.url.clone() }),
    };
    let rate_source = CbrRateSource::new().context("Failed to create exchange rate client")?;
    let mut store = SqliteStore::open(&args.database)
        .context(format!("Failed to open database: {}", args.database.display()))?;

    let options = PipelineOptions {
        output_file: if args.no_export { None } else { Some(args.output.clone()) },
        source_currency: args.source_currency,
        reference_currency: args.reference_currency,
        rate_policy: if args.strict_rates {
            RatePolicy::DropListing
        } else {
            RatePolicy::KeepWithoutReference
        },
        max_items: args.max_items,
    };

    let mut tui = RunTUI::new();
    let report = run_pipeline(page_source.as_ref(), &rate_source, &mut store, &options, Some(&mut tui))?;

    println!("\n=== Summary ===");
    println!("Listings on page: {}", report.listings_seen);
    println!("Extracted: {} (skipped {})", report.extracted, report.skipped);
    println!(
        "New: {}, replaced: {}, duplicates in batch: {}",
        report.reconcile.inserted, report.reconcile.replaced, report.reconcile.duplicates_in_batch
    );
    println!("Total listings in database: {}", report.stored_total);
    match &report.exported {
        Some(path) => println!("Saved to: {}", path.display()),
        None => println!("Export skipped"),
    }

    Ok(())
}

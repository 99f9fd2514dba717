use crate::currency::{CurrencyConverter, RateSource};
use crate::extractor::{ListingExtractor, ListingLayout, RatePolicy};
use crate::element::ListingElement;
use crate::export;
use crate::models::Currency;
use crate::page;
use crate::reconciler::{self, ReconcileSummary};
use crate::sources::PageSource;
use crate::store::RecordStore;
use crate::tui::RunTUI;
use anyhow::{Context, Result};
use chrono::Local;
use scraper::Html;
use std::path::PathBuf;
use tracing::{info, warn};

pub const DEFAULT_URL: &str = "https://www.avito.ru/rossiya/avtomobili/jeep/cherokee/iii_restayling-ASgBAgICA0Tgtg3EmCjitg3AoSjqtg2K1Cg?cd=1";

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub output_file: Option<PathBuf>,
    pub source_currency: Currency,
    pub reference_currency: Currency,
    pub rate_policy: RatePolicy,
    pub max_items: Option<usize>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            output_file: Some(PathBuf::from("avito_cars.xlsx")),
            source_currency: Currency::Rub,
            reference_currency: Currency::Eur,
            rate_policy: RatePolicy::default(),
            max_items: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub listings_seen: usize,
    pub extracted: usize,
    pub skipped: usize,
    pub reconcile: ReconcileSummary,
    pub stored_total: usize,
    pub exported: Option<PathBuf>,
}

/// One run: fetch the page, extract every listing, reconcile the batch into
/// the store and export the whole store. Listing failures are skipped; store
/// and export failures end the run.
pub fn run_pipeline<P, R, S>(
    page_source: &P,
    rate_source: &R,
    store: &mut S,
    options: &PipelineOptions,
    mut tui: Option<&mut RunTUI>,
) -> Result<RunReport>
where
    P: PageSource + ?Sized,
    R: RateSource + ?Sized,
    S: RecordStore + ?Sized,
{
    let stored_before = store.count().context("Failed to read record store")?;
    info!("Store holds {} listings", stored_before);
    if let Some(tui) = tui.as_mut() {
        tui.show_summary(stored_before)?;
    }

    let html = page_source
        .fetch_page()
        .context(format!("Failed to load page {}", page_source.name()))?;
    let document = Html::parse_document(&html);
    let mut elements = page::listing_elements(&document)?;
    if let Some(max) = options.max_items {
        if elements.len() > max {
            info!("Limiting run to the first {} of {} listings", max, elements.len());
            elements.truncate(max);
        }
    }
    if elements.is_empty() {
        warn!("No listings found on {}", page_source.name());
    }
    if let Some(tui) = tui.as_mut() {
        tui.start_listings(&page_source.name(), elements.len())?;
    }

    let converter = CurrencyConverter::prefetch(rate_source, options.source_currency, options.reference_currency);
    let layout = ListingLayout::avito()?;
    let extractor = ListingExtractor::new(
        &layout,
        &converter,
        options.source_currency,
        options.reference_currency,
        options.rate_policy,
    );

    let mut report = RunReport {
        listings_seen: elements.len(),
        ..RunReport::default()
    };
    let mut batch = Vec::with_capacity(elements.len());

    for (index, element) in elements.iter().enumerate() {
        match extractor.extract(element, Local::now().naive_local()) {
            Ok(record) => {
                if let Some(tui) = tui.as_mut() {
                    tui.listing_extracted(record.id.as_str())?;
                }
                batch.push(record);
            }
            Err(e) => {
                let label = element
                    .attribute(&layout.id_attribute)
                    .unwrap_or_else(|| format!("#{}", index));
                warn!("Skipping listing {}: {}", label, e);
                if let Some(tui) = tui.as_mut() {
                    tui.listing_skipped(&label, &e.to_string())?;
                }
                report.skipped += 1;
            }
        }
    }
    report.extracted = batch.len();

    report.reconcile = reconciler::reconcile(batch, store).context("Failed to reconcile listings")?;

    let records = store.all().context("Failed to read record store")?;
    report.stored_total = records.len();

    if let Some(path) = &options.output_file {
        export::export_records(&records, path)?;
        report.exported = Some(path.clone());
    }

    if let Some(tui) = tui.as_mut() {
        tui.show_final_summary(report.reconcile.inserted, report.reconcile.replaced, report.stored_total)?;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::FixedRates;
    use crate::error::StoreError;
    use crate::extractor::tests::{listing_html, page_html};
    use crate::models::{sample_record, ListingId, ListingRecord};
    use crate::store::MemoryStore;

    struct StaticPage(String);

    impl PageSource for StaticPage {
        fn name(&self) -> String {
            "static".to_string()
        }

        fn fetch_page(&self) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    struct FailingPage;

    impl PageSource for FailingPage {
        fn name(&self) -> String {
            "failing".to_string()
        }

        fn fetch_page(&self) -> Result<String> {
            Err(anyhow::anyhow!("connection refused"))
        }
    }

    /// Store that serves reads from memory but fails the chosen operation.
    struct BrokenStore {
        inner: MemoryStore,
        fail_get: bool,
    }

    impl BrokenStore {
        fn unavailable() -> StoreError {
            StoreError::Unavailable(rusqlite::Error::QueryReturnedNoRows)
        }
    }

    impl RecordStore for BrokenStore {
        fn get(&self, id: &ListingId) -> Result<Option<ListingRecord>, StoreError> {
            if self.fail_get {
                return Err(Self::unavailable());
            }
            self.inner.get(id)
        }

        fn delete(&mut self, id: &ListingId) -> Result<(), StoreError> {
            self.inner.delete(id)
        }

        fn bulk_insert(&mut self, records: &[ListingRecord]) -> Result<(), StoreError> {
            self.inner.bulk_insert(records)
        }

        fn all(&self) -> Result<Vec<ListingRecord>, StoreError> {
            self.inner.all()
        }

        fn replace_batch(&mut self, _records: &[ListingRecord]) -> Result<(), StoreError> {
            Err(Self::unavailable())
        }
    }

    const PLAIN: &str = "150 000 км, 2.4 MT (170 л.с.), white, передний, бензин";

    fn options() -> PipelineOptions {
        PipelineOptions {
            output_file: None,
            ..PipelineOptions::default()
        }
    }

    fn rates() -> FixedRates {
        FixedRates::new(&[(Currency::Eur, Currency::Rub, 100.0)])
    }

    #[test]
    fn skips_bad_listings_and_stores_the_rest() {
        let page = StaticPage(page_html(&[
            listing_html("", PLAIN, &[]),
            listing_html("2", PLAIN, &["Рыночная цена"]),
            listing_html("3", "broken", &[]),
            listing_html("4", PLAIN, &[]),
        ]));
        let mut store = MemoryStore::new();

        let report = run_pipeline(&page, &rates(), &mut store, &options(), None).unwrap();
        assert_eq!(report.listings_seen, 4);
        assert_eq!(report.extracted, 2);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.reconcile.inserted, 2);
        assert_eq!(report.stored_total, 2);
        assert!(store.all().unwrap()[0].flags.is_market_price);
    }

    #[test]
    fn max_items_limits_the_batch() {
        let page = StaticPage(page_html(&[
            listing_html("1", PLAIN, &[]),
            listing_html("2", PLAIN, &[]),
        ]));
        let mut store = MemoryStore::new();
        let options = PipelineOptions {
            max_items: Some(1),
            ..options()
        };

        let report = run_pipeline(&page, &rates(), &mut store, &options, None).unwrap();
        assert_eq!(report.listings_seen, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn page_failure_aborts_without_touching_store() {
        let mut store = MemoryStore::new();
        assert!(run_pipeline(&FailingPage, &rates(), &mut store, &options(), None).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn rerun_replaces_instead_of_duplicating() {
        let page = StaticPage(page_html(&[listing_html("7", PLAIN, &[])]));
        let mut store = MemoryStore::new();

        run_pipeline(&page, &rates(), &mut store, &options(), None).unwrap();
        let second = run_pipeline(&page, &rates(), &mut store, &options(), None).unwrap();
        assert_eq!(second.reconcile.replaced, 1);
        assert_eq!(second.reconcile.inserted, 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn listing_without_id_attribute_is_skipped() {
        let no_id = listing_html("9", PLAIN, &[]).replace(r#" data-item-id="9""#, "");
        assert!(!no_id.contains("data-item-id"));
        let page = StaticPage(page_html(&[no_id, listing_html("10", PLAIN, &[])]));
        let mut store = MemoryStore::new();

        let report = run_pipeline(&page, &rates(), &mut store, &options(), None).unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.extracted, 1);
        assert_eq!(store.all().unwrap()[0].id.as_str(), "10");
    }

    #[test]
    fn unstorable_price_only_skips_that_listing() {
        let huge = listing_html("21", PLAIN, &[])
            .replace(r#"content="1250000""#, r#"content="18000000000000000000""#);
        let page = StaticPage(page_html(&[listing_html("20", PLAIN, &[]), huge]));
        let mut store = crate::store::SqliteStore::open_in_memory().unwrap();

        let report = run_pipeline(&page, &rates(), &mut store, &options(), None).unwrap();
        assert_eq!(report.extracted, 1);
        assert_eq!(report.skipped, 1);
        let ids: Vec<String> = store.all().unwrap().iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, vec!["20"]);
    }

    #[test]
    fn store_failure_on_replace_aborts_and_keeps_stored_records() {
        let mut inner = MemoryStore::new();
        inner.bulk_insert(&[sample_record("1")]).unwrap();
        let mut store = BrokenStore { inner, fail_get: false };
        let page = StaticPage(page_html(&[listing_html("1", PLAIN, &[]), listing_html("2", PLAIN, &[])]));

        let err = run_pipeline(&page, &rates(), &mut store, &options(), None).unwrap_err();
        assert!(err
            .chain()
            .any(|cause| matches!(cause.downcast_ref::<StoreError>(), Some(StoreError::Unavailable(_)))));
        assert_eq!(store.all().unwrap(), vec![sample_record("1")]);
    }

    #[test]
    fn store_failure_on_lookup_aborts_before_writing() {
        let mut inner = MemoryStore::new();
        inner.bulk_insert(&[sample_record("1")]).unwrap();
        let mut store = BrokenStore { inner, fail_get: true };
        let page = StaticPage(page_html(&[listing_html("2", PLAIN, &[])]));

        assert!(run_pipeline(&page, &rates(), &mut store, &options(), None).is_err());
        assert_eq!(store.all().unwrap(), vec![sample_record("1")]);
    }
}

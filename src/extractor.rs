use crate::currency::CurrencyConverter;
use crate::element::{ListingElement, Locator};
use crate::error::{ExtractionError, Field, FieldError};
use crate::models::{BadgeFlags, Currency, ListingId, ListingRecord};
use crate::parser;
use anyhow::Result;
use chrono::{Datelike, NaiveDateTime};
use tracing::debug;

pub const BASE_URL: &str = "https://www.avito.ru";
pub const DAMAGED_MARKER: &str = "Битый";

/// Where each field lives inside one listing element.
#[derive(Debug, Clone)]
pub struct ListingLayout {
    pub id_attribute: String,
    pub price: Locator,
    pub price_attribute: String,
    pub title: Locator,
    pub characteristics: Locator,
    pub description: Locator,
    pub location: Locator,
    pub link: Locator,
    pub date: Locator,
    pub market_price_badge: Locator,
    pub only_on_source_badge: Locator,
    pub owner_badge: Locator,
    pub damaged_badge: Locator,
    /// Literal repeated as the first characteristics token on damaged cars.
    pub damaged_marker: String,
    pub base_url: String,
}

impl ListingLayout {
    pub fn avito() -> Result<Self> {
        Ok(Self {
            id_attribute: "data-item-id".to_string(),
            price: Locator::css("[itemprop='price']")?,
            price_attribute: "content".to_string(),
            title: Locator::css("[data-marker='item-title']")?,
            characteristics: Locator::css("[data-marker='item-specific-params']")?,
            description: Locator::css("[class*='iva-item-description']")?,
            location: Locator::css("[class*='geo-address']")?,
            link: Locator::css("[data-marker='item-title']")?,
            date: Locator::css("[data-marker='item-date']")?,
            market_price_badge: Locator::text("Рыночная цена"),
            only_on_source_badge: Locator::text("Только на Авито"),
            owner_badge: Locator::text("Собственник"),
            damaged_badge: Locator::text(DAMAGED_MARKER),
            damaged_marker: DAMAGED_MARKER.to_string(),
            base_url: BASE_URL.to_string(),
        })
    }
}

/// What to do with a listing when no exchange rate is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RatePolicy {
    /// Keep the listing with an empty reference price.
    #[default]
    KeepWithoutReference,
    /// Skip the listing.
    DropListing,
}

pub struct ListingExtractor<'a> {
    layout: &'a ListingLayout,
    converter: &'a CurrencyConverter,
    source_currency: Currency,
    reference_currency: Currency,
    rate_policy: RatePolicy,
}

impl<'a> ListingExtractor<'a> {
    pub fn new(
        layout: &'a ListingLayout,
        converter: &'a CurrencyConverter,
        source_currency: Currency,
        reference_currency: Currency,
        rate_policy: RatePolicy,
    ) -> Self {
        Self {
            layout,
            converter,
            source_currency,
            reference_currency,
            rate_policy,
        }
    }

    /// Builds one record from a listing element. Any failing required field
    /// discards the whole listing.
    pub fn extract<E: ListingElement>(
        &self,
        element: &E,
        observed: NaiveDateTime,
    ) -> Result<ListingRecord, ExtractionError> {
        let id = element
            .attribute(&self.layout.id_attribute)
            .and_then(|raw| ListingId::new(&raw))
            .ok_or(ExtractionError::MissingIdentity)?;

        let price_local = self.extract_price(element)?;
        let price_reference = self.convert_price(&id, price_local)?;

        let title = required_text(element, &self.layout.title, Field::Year)?;
        let year = parser::parse_year(&title, observed.year() + 1)
            .map_err(|cause| ExtractionError::field(Field::Year, cause))?;

        let characteristics =
            required_text(element, &self.layout.characteristics, Field::Characteristics)?;
        let characteristics =
            parser::parse_characteristics(&characteristics, &self.layout.damaged_marker)
                .map_err(|cause| ExtractionError::field(Field::Characteristics, cause))?;

        let flags = self.probe_badges(element);

        let description = required_text(element, &self.layout.description, Field::Description)?;
        let location = required_text(element, &self.layout.location, Field::Location)?;
        let source_url = self.extract_source_url(element)?;
        let site_date = required_text(element, &self.layout.date, Field::Date)?;

        Ok(ListingRecord {
            id,
            price_local,
            price_reference,
            year,
            mileage: characteristics.mileage,
            engine_volume: characteristics.engine.volume,
            horsepower: characteristics.engine.horsepower,
            transmission_code: characteristics.engine.transmission,
            drive_wheels: characteristics.drive_wheels,
            fuel_type: characteristics.fuel_type,
            flags,
            description: parser::bound_description(&description),
            location,
            source_url,
            observed_at: parser::compose_observed_at(&site_date, observed),
        })
    }

    fn extract_price<E: ListingElement>(&self, element: &E) -> Result<u64, ExtractionError> {
        let price = required_element(element, &self.layout.price, Field::Price)?;
        let raw = price.attribute(&self.layout.price_attribute).ok_or_else(|| {
            ExtractionError::field(
                Field::Price,
                FieldError::MissingAttribute {
                    name: self.layout.price_attribute.clone(),
                },
            )
        })?;
        parser::parse_price(&raw).map_err(|cause| ExtractionError::field(Field::Price, cause))
    }

    fn convert_price(&self, id: &ListingId, price_local: u64) -> Result<Option<f64>, ExtractionError> {
        match self
            .converter
            .convert(price_local, self.source_currency, self.reference_currency)
        {
            Ok(converted) => Ok(Some(converted)),
            Err(e) => match self.rate_policy {
                RatePolicy::KeepWithoutReference => {
                    debug!("Listing {} kept without reference price: {}", id, e);
                    Ok(None)
                }
                RatePolicy::DropListing => Err(e.into()),
            },
        }
    }

    /// A badge that is not on the page is simply false.
    fn probe_badges<E: ListingElement>(&self, element: &E) -> BadgeFlags {
        BadgeFlags {
            is_market_price: probe(element, &self.layout.market_price_badge),
            is_only_on_source: probe(element, &self.layout.only_on_source_badge),
            is_owner_listed: probe(element, &self.layout.owner_badge),
            is_damaged: probe(element, &self.layout.damaged_badge),
        }
    }

    fn extract_source_url<E: ListingElement>(&self, element: &E) -> Result<String, ExtractionError> {
        let link = required_element(element, &self.layout.link, Field::SourceUrl)?;
        let href = link.attribute("href").ok_or_else(|| {
            ExtractionError::field(
                Field::SourceUrl,
                FieldError::MissingAttribute {
                    name: "href".to_string(),
                },
            )
        })?;

        // Ensure we have absolute URLs
        if href.starts_with("http") {
            Ok(href)
        } else {
            Ok(format!("{}{}", self.layout.base_url, href))
        }
    }
}

fn probe<E: ListingElement>(element: &E, locator: &Locator) -> bool {
    let found = element.exists(locator);
    if !found {
        debug!("Badge {} not present", locator);
    }
    found
}

fn required_element<E: ListingElement>(
    element: &E,
    locator: &Locator,
    field: Field,
) -> Result<E, ExtractionError> {
    element.find_one(locator).ok_or_else(|| {
        ExtractionError::field(
            field,
            FieldError::NotFound {
                locator: locator.to_string(),
            },
        )
    })
}

fn required_text<E: ListingElement>(
    element: &E,
    locator: &Locator,
    field: Field,
) -> Result<String, ExtractionError> {
    let found = required_element(element, locator, field)?;
    Ok(parser::normalize_text(&found.text_content()))
}

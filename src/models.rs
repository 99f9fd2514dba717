use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;

/// Export and storage column order.
pub const COLUMNS: [&str; 18] = [
    "id",
    "price_local",
    "price_reference",
    "year",
    "mileage",
    "engine_volume",
    "horsepower",
    "transmission_code",
    "drive_wheels",
    "fuel_type",
    "is_market_price",
    "is_only_on_source",
    "is_owner_listed",
    "is_damaged",
    "description",
    "location",
    "source_url",
    "observed_at",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Currency {
    Rub,
    Eur,
    Usd,
    Cny,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Rub => "RUB",
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Cny => "CNY",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Identifier assigned by the listing site. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListingId(String);

impl ListingId {
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BadgeFlags {
    pub is_market_price: bool,
    pub is_only_on_source: bool,
    pub is_owner_listed: bool,
    pub is_damaged: bool,
}

/// One normalized listing. Records are never edited in place; a newer
/// extraction of the same id replaces the stored one as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRecord {
    pub id: ListingId,
    pub price_local: u64,
    /// `None` when no exchange rate was available for the run.
    pub price_reference: Option<f64>,
    pub year: u16,
    pub mileage: u32,
    pub engine_volume: f64,
    pub horsepower: u32,
    pub transmission_code: String,
    pub drive_wheels: String,
    pub fuel_type: String,
    pub flags: BadgeFlags,
    pub description: String,
    pub location: String,
    pub source_url: String,
    pub observed_at: String,
}

impl ListingRecord {
    /// Renders every column in `COLUMNS` order as plain text.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.price_local.to_string(),
            self.price_reference.map(|p| p.to_string()).unwrap_or_default(),
            self.year.to_string(),
            self.mileage.to_string(),
            self.engine_volume.to_string(),
            self.horsepower.to_string(),
            self.transmission_code.clone(),
            self.drive_wheels.clone(),
            self.fuel_type.clone(),
            self.flags.is_market_price.to_string(),
            self.flags.is_only_on_source.to_string(),
            self.flags.is_owner_listed.to_string(),
            self.flags.is_damaged.to_string(),
            self.description.clone(),
            self.location.clone(),
            self.source_url.clone(),
            self.observed_at.clone(),
        ]
    }
}

// Flags are flattened so every serialized record has the same shape as a row
impl Serialize for ListingRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("ListingRecord", COLUMNS.len())?;
        state.serialize_field("id", self.id.as_str())?;
        state.serialize_field("price_local", &self.price_local)?;
        state.serialize_field("price_reference", &self.price_reference)?;
        state.serialize_field("year", &self.year)?;
        state.serialize_field("mileage", &self.mileage)?;
        state.serialize_field("engine_volume", &self.engine_volume)?;
        state.serialize_field("horsepower", &self.horsepower)?;
        state.serialize_field("transmission_code", &self.transmission_code)?;
        state.serialize_field("drive_wheels", &self.drive_wheels)?;
        state.serialize_field("fuel_type", &self.fuel_type)?;
        state.serialize_field("is_market_price", &self.flags.is_market_price)?;
        state.serialize_field("is_only_on_source", &self.flags.is_only_on_source)?;
        state.serialize_field("is_owner_listed", &self.flags.is_owner_listed)?;
        state.serialize_field("is_damaged", &self.flags.is_damaged)?;
        state.serialize_field("description", &self.description)?;
        state.serialize_field("location", &self.location)?;
        state.serialize_field("source_url", &self.source_url)?;
        state.serialize_field("observed_at", &self.observed_at)?;
        state.end()
    }
}

#[cfg(test)]
pub(crate) fn sample_record(id: &str) -> ListingRecord {
    ListingRecord {
        id: ListingId::new(id).unwrap(),
        price_local: 1_250_000,
        price_reference: Some(12_500.0),
        year: 2004,
        mileage: 150_000,
        engine_volume: 2.4,
        horsepower: 170,
        transmission_code: "MT".to_string(),
        drive_wheels: "передний".to_string(),
        fuel_type: "бензин".to_string(),
        flags: BadgeFlags::default(),
        description: "Jeep in good condition".to_string(),
        location: "Москва".to_string(),
        source_url: format!("https://www.avito.ru/moskva/avtomobili/{}", id),
        observed_at: "2 дня назад от 18/10/2026 10:00:00".to_string(),
    }
}

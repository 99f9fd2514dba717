use crate::error::{ConversionError, RateError};
use crate::models::Currency;
use regex::Regex;
use reqwest::blocking::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const CBR_DAILY_URL: &str = "http://www.cbr.ru/scripts/XML_daily.asp";

/// Source of exchange rates.
pub trait RateSource {
    /// Units of `quote` for one unit of `base`.
    fn fetch_rate(&self, base: Currency, quote: Currency) -> Result<f64, RateError>;
}

/// Daily rates published by the Central Bank of Russia. All quotes are in
/// rubles, so cross rates go through RUB.
pub struct CbrRateSource {
    client: Client,
    url: String,
}

impl CbrRateSource {
    pub fn new() -> Result<Self, RateError> {
        Self::with_url(CBR_DAILY_URL)
    }

    pub fn with_url(url: &str) -> Result<Self, RateError> {
        let client = Client::builder()
            .user_agent("AvitoFinder/1.0 (Car Listing Scraper)")
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl RateSource for CbrRateSource {
    fn fetch_rate(&self, base: Currency, quote: Currency) -> Result<f64, RateError> {
        debug!("Fetching daily rates from {}", self.url);
        let body = self.client.get(&self.url).send()?.error_for_status()?.text()?;
        let rubles = parse_daily_rates(&body)?;

        let rub_per = |currency: Currency| -> Result<f64, RateError> {
            if currency == Currency::Rub {
                return Ok(1.0);
            }
            rubles
                .get(currency.code())
                .copied()
                .ok_or(RateError::UnknownCurrency(currency))
        };

        Ok(rub_per(base)? / rub_per(quote)?)
    }
}

/// Parses the daily XML into rubles per one unit of each currency code.
pub fn parse_daily_rates(body: &str) -> Result<HashMap<String, f64>, RateError> {
    let valute = Regex::new(
        r"(?s)<Valute[^>]*>.*?<CharCode>([A-Z]{3})</CharCode>.*?<Nominal>(\d+)</Nominal>.*?<Value>([\d.,]+)</Value>",
    )
    .map_err(|e| RateError::Malformed(e.to_string()))?;

    let mut rates = HashMap::new();
    for captures in valute.captures_iter(body) {
        let code = &captures[1];
        let nominal: f64 = captures[2]
            .parse()
            .map_err(|_| RateError::Malformed(format!("nominal '{}' for {}", &captures[2], code)))?;
        let value: f64 = captures[3]
            .replace(',', ".")
            .parse()
            .map_err(|_| RateError::Malformed(format!("value '{}' for {}", &captures[3], code)))?;

        if nominal <= 0.0 || value <= 0.0 {
            return Err(RateError::Malformed(format!("non-positive quote for {}", code)));
        }
        rates.insert(code.to_string(), value / nominal);
    }

    if rates.is_empty() {
        return Err(RateError::Malformed("no <Valute> entries".to_string()));
    }
    Ok(rates)
}

/// Fixed table of rates, for offline runs.
#[derive(Debug, Clone, Default)]
pub struct FixedRates {
    rates: HashMap<(Currency, Currency), f64>,
}

impl FixedRates {
    /// Entries are `(base, quote, units of quote per base)`.
    pub fn new(entries: &[(Currency, Currency, f64)]) -> Self {
        Self {
            rates: entries
                .iter()
                .map(|(base, quote, rate)| ((*base, *quote), *rate))
                .collect(),
        }
    }
}

impl RateSource for FixedRates {
    fn fetch_rate(&self, base: Currency, quote: Currency) -> Result<f64, RateError> {
        if let Some(rate) = self.rates.get(&(base, quote)) {
            return Ok(*rate);
        }
        if let Some(rate) = self.rates.get(&(quote, base)) {
            return Ok(1.0 / rate);
        }
        Err(RateError::UnknownCurrency(base))
    }
}

/// Converts prices with rates fetched once per run, so every price in one
/// export uses the same rate.
#[derive(Debug, Clone, Default)]
pub struct CurrencyConverter {
    rates: HashMap<(Currency, Currency), f64>,
}

impl CurrencyConverter {
    /// Looks up the reference currency quoted in the source currency
    /// (e.g. rubles per euro). A failed lookup leaves the pair without a
    /// rate; conversions for it then report `RateUnavailable`.
    pub fn prefetch<S: RateSource + ?Sized>(source: &S, from: Currency, to: Currency) -> Self {
        let mut converter = Self::default();
        if from == to {
            return converter;
        }

        match source.fetch_rate(to, from) {
            Ok(rate) if rate.is_finite() && rate > 0.0 => {
                info!("Using rate 1 {} = {} {}", to, rate, from);
                converter.rates.insert((to, from), rate);
            }
            Ok(rate) => warn!("Ignoring invalid {}/{} rate {}", to, from, rate),
            Err(e) => warn!("No {}/{} rate for this run: {}", to, from, e),
        }
        converter
    }

    pub fn rate(&self, base: Currency, quote: Currency) -> Option<f64> {
        self.rates.get(&(base, quote)).copied()
    }

    pub fn convert(&self, amount: u64, from: Currency, to: Currency) -> Result<f64, ConversionError> {
        let amount = amount as f64;
        if from == to {
            return Ok(amount);
        }
        if let Some(rate) = self.rates.get(&(from, to)) {
            return Ok(amount * rate);
        }
        if let Some(rate) = self.rates.get(&(to, from)) {
            return Ok(amount / rate);
        }
        Err(ConversionError::RateUnavailable { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const DAILY: &str = r#"<?xml version="1.0" encoding="windows-1251"?>
<ValCurs Date="17.10.2026" name="Foreign Currency Market">
<Valute ID="R01235"><NumCode>840</NumCode><CharCode>USD</CharCode><Nominal>1</Nominal><Name>Доллар США</Name><Value>80,0000</Value><VunitRate>80</VunitRate></Valute>
<Valute ID="R01239"><NumCode>978</NumCode><CharCode>EUR</CharCode><Nominal>1</Nominal><Name>Евро</Name><Value>92,5000</Value><VunitRate>92,5</VunitRate></Valute>
<Valute ID="R01375"><NumCode>156</NumCode><CharCode>CNY</CharCode><Nominal>10</Nominal><Name>Юань</Name><Value>110,0000</Value><VunitRate>11</VunitRate></Valute>
</ValCurs>"#;

    struct CountingSource {
        calls: Cell<usize>,
        rate: Option<f64>,
    }

    impl RateSource for CountingSource {
        fn fetch_rate(&self, base: Currency, _quote: Currency) -> Result<f64, RateError> {
            self.calls.set(self.calls.get() + 1);
            self.rate.ok_or(RateError::UnknownCurrency(base))
        }
    }

    #[test]
    fn parses_daily_xml_by_char_code() {
        let rates = parse_daily_rates(DAILY).unwrap();
        assert_eq!(rates["USD"], 80.0);
        assert_eq!(rates["EUR"], 92.5);
        assert_eq!(rates["CNY"], 11.0);
    }

    #[test]
    fn empty_payload_is_malformed() {
        assert!(matches!(parse_daily_rates("<ValCurs/>"), Err(RateError::Malformed(_))));
    }

    #[test]
    fn converts_with_inverse_of_quoted_rate() {
        let source = FixedRates::new(&[(Currency::Eur, Currency::Rub, 100.0)]);
        let converter = CurrencyConverter::prefetch(&source, Currency::Rub, Currency::Eur);
        assert_eq!(converter.rate(Currency::Eur, Currency::Rub), Some(100.0));
        assert_eq!(converter.convert(1_250_000, Currency::Rub, Currency::Eur).unwrap(), 12_500.0);
        assert_eq!(converter.convert(10, Currency::Eur, Currency::Rub).unwrap(), 1000.0);
    }

    #[test]
    fn rate_is_fetched_once_per_run() {
        let source = CountingSource {
            calls: Cell::new(0),
            rate: Some(50.0),
        };
        let converter = CurrencyConverter::prefetch(&source, Currency::Rub, Currency::Usd);
        for amount in [100, 200, 300] {
            converter.convert(amount, Currency::Rub, Currency::Usd).unwrap();
        }
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn failed_fetch_reports_unavailable() {
        let source = CountingSource {
            calls: Cell::new(0),
            rate: None,
        };
        let converter = CurrencyConverter::prefetch(&source, Currency::Rub, Currency::Eur);
        assert_eq!(
            converter.convert(100, Currency::Rub, Currency::Eur),
            Err(ConversionError::RateUnavailable {
                from: Currency::Rub,
                to: Currency::Eur
            })
        );
    }

    #[test]
    fn same_currency_needs_no_rate() {
        let converter = CurrencyConverter::prefetch(&FixedRates::default(), Currency::Rub, Currency::Rub);
        assert_eq!(converter.convert(42, Currency::Rub, Currency::Rub).unwrap(), 42.0);
    }

    #[test]
    fn non_positive_rate_is_ignored() {
        let source = FixedRates::new(&[(Currency::Eur, Currency::Rub, 0.0)]);
        let converter = CurrencyConverter::prefetch(&source, Currency::Rub, Currency::Eur);
        assert!(converter.convert(1, Currency::Rub, Currency::Eur).is_err());
    }
}

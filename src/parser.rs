use crate::error::FieldError;
use chrono::NaiveDateTime;

pub const TITLE_DELIMITER: char = ',';
pub const CHARACTERISTICS_DELIMITER: &str = ", ";
pub const DESCRIPTION_MAX_CHARS: usize = 500;
pub const MIN_YEAR: i64 = 1900;

/// Separates the site's own date text from the extraction moment in `observed_at`.
pub const OBSERVED_AT_SEPARATOR: &str = " от ";
pub const OBSERVED_AT_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Collapses runs of whitespace (including non-breaking spaces) into single spaces.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Largest price the store can hold (SQLite integers are signed 64-bit).
pub const MAX_PRICE: u64 = i64::MAX as u64;

pub fn parse_price(raw: &str) -> Result<u64, FieldError> {
    let digits: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.is_empty() {
        return Err(FieldError::parse(raw, "empty price"));
    }
    let price = digits
        .parse::<u64>()
        .map_err(|e| FieldError::parse(raw, e.to_string()))?;
    if price > MAX_PRICE {
        return Err(FieldError::parse(raw, "price exceeds storable range"));
    }
    Ok(price)
}

/// Takes the year from the second comma-separated part of a title such as
/// `"Jeep Cherokee 2.4 MT, 2004, внедорожник"`.
pub fn parse_year(title: &str, max_year: i32) -> Result<u16, FieldError> {
    let parts: Vec<&str> = title.split(TITLE_DELIMITER).collect();
    let token = parts.get(1).ok_or(FieldError::MissingToken {
        index: 1,
        len: parts.len(),
    })?;
    let token = token.trim();

    if token.len() != 4 || !token.chars().all(|c| c.is_ascii_digit()) {
        return Err(FieldError::parse(token, "expected a four digit year"));
    }
    let year: i64 = token
        .parse()
        .map_err(|e: std::num::ParseIntError| FieldError::parse(token, e.to_string()))?;

    if year < MIN_YEAR || year > i64::from(max_year) {
        return Err(FieldError::OutOfRange { value: year });
    }
    u16::try_from(year).map_err(|_| FieldError::OutOfRange { value: year })
}

pub fn split_characteristics(text: &str) -> Vec<&str> {
    text.split(CHARACTERISTICS_DELIMITER)
        .map(str::trim)
        .collect()
}

/// Drops the damage badge when the site repeats it as the first
/// characteristics token. The remaining tokens always start with mileage.
pub fn strip_optional_leading_badge<'a, 't>(tokens: &'a [&'t str], badge: &str) -> &'a [&'t str] {
    match tokens.split_first() {
        Some((first, rest)) if *first == badge => rest,
        _ => tokens,
    }
}

/// Raw characteristics tokens after badge stripping, by position.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacteristicTokens<'a> {
    pub mileage: &'a str,
    pub engine: &'a str,
    pub body: Option<&'a str>,
    pub drive_wheels: &'a str,
    pub fuel: &'a str,
}

pub const MILEAGE_INDEX: usize = 0;
pub const ENGINE_INDEX: usize = 1;
pub const BODY_INDEX: usize = 2;
pub const DRIVE_WHEELS_INDEX: usize = 3;
pub const FUEL_INDEX: usize = 4;

/// Position map: mileage, engine, body, drive wheels, fuel. Tokens past fuel
/// are ignored. A four-token layout has no body token, so drive wheels and
/// fuel are the last two.
pub fn position_characteristics<'a>(
    tokens: &[&'a str],
) -> Result<CharacteristicTokens<'a>, FieldError> {
    let len = tokens.len();
    let (body, drive_wheels, fuel) = match len {
        0..=3 => return Err(FieldError::Layout { len }),
        4 => (None, tokens[2], tokens[3]),
        _ => (
            Some(tokens[BODY_INDEX]),
            tokens[DRIVE_WHEELS_INDEX],
            tokens[FUEL_INDEX],
        ),
    };

    Ok(CharacteristicTokens {
        mileage: tokens[MILEAGE_INDEX],
        engine: tokens[ENGINE_INDEX],
        body,
        drive_wheels,
        fuel,
    })
}

/// Splits `"2.4 MT (170 л.с.)"` into `("2.4", "MT", "170")`.
pub fn split_engine_token(token: &str) -> Result<(&str, &str, &str), FieldError> {
    let parts: Vec<&str> = token
        .split(|c: char| c.is_whitespace() || c == '(' || c == ')')
        .filter(|part| !part.is_empty())
        .collect();

    match parts.as_slice() {
        [volume, transmission, horsepower, ..] => Ok((*volume, *transmission, *horsepower)),
        _ => Err(FieldError::MissingToken {
            index: 2,
            len: parts.len(),
        }),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSpec {
    pub volume: f64,
    pub transmission: String,
    pub horsepower: u32,
}

pub fn parse_engine(token: &str) -> Result<EngineSpec, FieldError> {
    let (volume, transmission, horsepower) = split_engine_token(token)?;

    let volume = volume
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|e| FieldError::parse(volume, e.to_string()))?;
    let horsepower = horsepower
        .parse::<u32>()
        .map_err(|e| FieldError::parse(horsepower, e.to_string()))?;

    Ok(EngineSpec {
        volume,
        transmission: parse_category(transmission)?,
        horsepower,
    })
}

/// `"150 000 км"` -> 150000
pub fn parse_mileage(token: &str) -> Result<u32, FieldError> {
    let digits: String = token.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(FieldError::parse(token, "no digits in mileage"));
    }
    digits
        .parse::<u32>()
        .map_err(|e| FieldError::parse(token, e.to_string()))
}

pub fn parse_category(token: &str) -> Result<String, FieldError> {
    let value = token.trim();
    if value.is_empty() {
        return Err(FieldError::parse(token, "empty category"));
    }
    Ok(value.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Characteristics {
    pub mileage: u32,
    pub engine: EngineSpec,
    pub drive_wheels: String,
    pub fuel_type: String,
}

pub fn parse_characteristics(text: &str, damage_badge: &str) -> Result<Characteristics, FieldError> {
    let normalized = normalize_text(text);
    let tokens = split_characteristics(&normalized);
    let tokens = strip_optional_leading_badge(&tokens, damage_badge);
    let positioned = position_characteristics(tokens)?;

    Ok(Characteristics {
        mileage: parse_mileage(positioned.mileage)?,
        engine: parse_engine(positioned.engine)?,
        drive_wheels: parse_category(positioned.drive_wheels)?,
        fuel_type: parse_category(positioned.fuel)?,
    })
}

pub fn bound_description(text: &str) -> String {
    text.chars().take(DESCRIPTION_MAX_CHARS).collect()
}

pub fn compose_observed_at(site_date: &str, observed: NaiveDateTime) -> String {
    format!(
        "{}{}{}",
        site_date.trim(),
        OBSERVED_AT_SEPARATOR,
        observed.format(OBSERVED_AT_FORMAT)
    )
}

//! Text-to-value transforms for listing card fields.
//!
//! Every function here is total: unrecognised input yields `None` rather
//! than an error, and ambiguous input is never guessed at.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::models::ListingStatus;

// Either a thousands-grouped number ("1 250 000", "1,250,000") or a plain digit run.
const NUMBER: &str = r"(\d{1,3}(?:[ ,\u{a0}]\d{3})+|\d+)(?:\.(\d+))?";

// Glue between a value and its label; may cross one text-node break (" | ").
const SEP: &str = r"\s*(?:\|\s*)?";

static RE_CURRENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?:\bR|\bZAR){SEP}{NUMBER}")).expect("invalid regex: currency")
});

static RE_PER_AREA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)^{SEP}(?:per|/)\s*(?:m²|m2|sqm|sq\.?\s?m|square\s+met)"))
        .expect("invalid regex: per area")
});

static RE_BEDROOMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)(\d+)(?:\.\d+)?{SEP}(?:-\s*)?bed")).expect("invalid regex: bedrooms")
});

static RE_BATHROOMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)(\d+)(?:\.\d+)?{SEP}(?:-\s*)?bath")).expect("invalid regex: bathrooms")
});

static RE_FLOOR_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i){NUMBER}{SEP}(?:m²|m2\b|sqm\b|sq\.?\s?m\b|square\s+met)"))
        .expect("invalid regex: floor size")
});

static RE_RATES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\brates(?:\s*(?:and|&)\s*taxes)?\s*:?{SEP}((?:R|ZAR){SEP}\d[\d\s,.]*)"))
        .expect("invalid regex: rates")
});

static RE_LEVIES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\blev(?:y|ies)\s*:?{SEP}((?:R|ZAR){SEP}\d[\d\s,.]*)"))
        .expect("invalid regex: levies")
});

static RE_PROPERTY_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(vacant land|townhouse|penthouse|apartment|commercial|industrial|cluster|simplex|duplex|retail|office|house|flat|farm|land|plot)s?\b",
    )
    .expect("invalid regex: property type")
});

static RE_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?")
        .expect("invalid regex: timestamp")
});

static RE_DAY_MONTH_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{4}|\d{2})\b").expect("invalid regex: dmy date")
});

/// Positional segments of a comma-separated address line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressParts {
    pub street: Option<String>,
    pub estate: Option<String>,
    pub suburb: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
}

/// Amounts found in a price line
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriceParts {
    pub total: Option<f64>,
    pub per_sqm: Option<f64>,
}

/// Collapse runs of whitespace (including `&nbsp;`) into single spaces.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split an address by commas: street, estate, suburb, city, postal code.
///
/// Segments beyond the fifth are ignored, empty segments stay absent.
pub fn segment_address(text: &str) -> AddressParts {
    let mut segments = text.split(',').map(|segment| {
        let cleaned = normalize_whitespace(segment);
        (!cleaned.is_empty()).then_some(cleaned)
    });

    AddressParts {
        street: segments.next().flatten(),
        estate: segments.next().flatten(),
        suburb: segments.next().flatten(),
        city: segments.next().flatten(),
        postal_code: segments.next().flatten(),
    }
}

fn number_from_captures(whole: &str, fraction: Option<&str>) -> Option<f64> {
    let digits: String = whole.chars().filter(|c| c.is_ascii_digit()).collect();
    let text = match fraction {
        Some(fraction) => format!("{digits}.{fraction}"),
        None => digits,
    };
    text.parse::<f64>().ok().filter(|value| *value >= 0.0)
}

/// Pull `end` back to a group separator while the next character is still a digit,
/// so "1 250 000 2019" reads as "1 250 000" and not "1 250 000 201".
fn digit_bounded_end(text: &str, start: usize, mut end: usize) -> usize {
    while text[end..].starts_with(|c: char| c.is_ascii_digit()) {
        match text[start..end].rfind(|c: char| !c.is_ascii_digit()) {
            Some(separator) => end = start + separator,
            None => return start,
        }
    }
    end
}

/// Parse a price line such as `R 1,250,000` or `R 12 500 per m²`.
///
/// The first currency amount followed by a per-area marker becomes
/// `per_sqm`; the first one that is not becomes `total`. Text without a
/// currency marker yields neither.
pub fn parse_price(text: &str) -> PriceParts {
    let mut parts = PriceParts::default();

    for captures in RE_CURRENCY.captures_iter(text) {
        let (Some(whole), Some(matched)) = (captures.get(1), captures.get(0)) else {
            continue;
        };
        let end = digit_bounded_end(text, whole.start(), whole.end());
        let (fraction, amount_end) = if end == whole.end() {
            (captures.get(2).map(|m| m.as_str()), matched.end())
        } else {
            (None, end)
        };
        let Some(amount) = number_from_captures(&text[whole.start()..end], fraction) else {
            continue;
        };

        if RE_PER_AREA.is_match(&text[amount_end..]) {
            parts.per_sqm.get_or_insert(amount);
        } else {
            parts.total.get_or_insert(amount);
        }

        if parts.total.is_some() && parts.per_sqm.is_some() {
            break;
        }
    }

    parts
}

/// First currency amount in `text`, ignoring per-area amounts.
pub fn parse_amount(text: &str) -> Option<f64> {
    parse_price(text).total
}

fn labelled_amount(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)
        .and_then(|captures| captures.get(1))
        .and_then(|amount| parse_amount(amount.as_str()))
}

/// Amount after a "Rates and Taxes" label
pub fn parse_rates_and_taxes(text: &str) -> Option<f64> {
    labelled_amount(&RE_RATES, text)
}

/// Amount after a "Levies" label
pub fn parse_levies(text: &str) -> Option<f64> {
    labelled_amount(&RE_LEVIES, text)
}

fn count_before(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)
        .and_then(|captures| captures.get(1))
        .and_then(|count| count.as_str().parse().ok())
}

/// First integer preceding a "bed" keyword
pub fn parse_bedrooms(text: &str) -> Option<u32> {
    count_before(&RE_BEDROOMS, text)
}

/// First integer preceding a "bath" keyword
pub fn parse_bathrooms(text: &str) -> Option<u32> {
    count_before(&RE_BATHROOMS, text)
}

/// First number preceding an area unit (`m²`, `m2`, `sqm`, ...)
pub fn parse_floor_size(text: &str) -> Option<f64> {
    RE_FLOOR_SIZE.captures(text).and_then(|captures| {
        let whole = captures.get(1)?;
        number_from_captures(whole.as_str(), captures.get(2).map(|m| m.as_str()))
    })
}

/// First property-type keyword in `text`, lowercased and singular.
pub fn classify_property_type(text: &str) -> Option<String> {
    RE_PROPERTY_TYPE
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|kind| kind.as_str().to_lowercase())
}

/// "sold" wins over "offer"; neither leaves the status unset.
pub fn classify_status(text: &str) -> Option<ListingStatus> {
    let lowered = text.to_lowercase();
    if lowered.contains("sold") {
        Some(ListingStatus::Sold)
    } else if lowered.contains("offer") {
        Some(ListingStatus::UnderOffer)
    } else {
        None
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDate> {
    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamp.date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|stamp| stamp.date())
}

fn parse_day_month_year(text: &str) -> Option<NaiveDate> {
    let captures = RE_DAY_MONTH_YEAR.captures(text)?;
    let day: u32 = captures.get(1)?.as_str().parse().ok()?;
    let month: u32 = captures.get(2)?.as_str().parse().ok()?;
    let year_text = captures.get(3)?.as_str();
    let mut year: i32 = year_text.parse().ok()?;
    if year_text.len() == 2 {
        year += 2000;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Listing date from either an ISO timestamp or a `d/m/Y` style date.
pub fn parse_listing_date(text: &str) -> Option<NaiveDate> {
    if let Some(stamp) = RE_TIMESTAMP.find(text) {
        if let Some(date) = parse_timestamp(stamp.as_str()) {
            return Some(date);
        }
    }
    parse_day_month_year(text)
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Sale status shown on a listing card
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Sold,
    UnderOffer,
    /// Valid stored state; the extractor never produces it, absence is the default.
    NoOffer,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Sold => "sold",
            ListingStatus::UnderOffer => "under_offer",
            ListingStatus::NoOffer => "no_offer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sold" => Some(ListingStatus::Sold),
            "under_offer" => Some(ListingStatus::UnderOffer),
            "no_offer" => Some(ListingStatus::NoOffer),
            _ => None,
        }
    }
}

/// One discovered property listing.
///
/// `listing_url` is always absolute and non-empty; it is the natural key used
/// for upserts. Every other field is best-effort.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingRecord {
    pub listing_url: String,
    pub street_address: Option<String>,
    pub estate_or_complex: Option<String>,
    pub suburb: String,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub floor_size_sqm: Option<f64>,
    pub total_price: Option<f64>,
    pub price_per_sqm: Option<f64>,
    pub rates_and_taxes: Option<f64>,
    pub levies: Option<f64>,
    pub property_type: Option<String>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub status: Option<ListingStatus>,
    pub listing_date: Option<NaiveDate>,
}

impl ListingRecord {
    /// Record with only the key and suburb populated
    pub fn new(listing_url: impl Into<String>, suburb: impl Into<String>) -> Self {
        Self {
            listing_url: listing_url.into(),
            street_address: None,
            estate_or_complex: None,
            suburb: suburb.into(),
            city: None,
            postal_code: None,
            floor_size_sqm: None,
            total_price: None,
            price_per_sqm: None,
            rates_and_taxes: None,
            levies: None,
            property_type: None,
            bedrooms: None,
            bathrooms: None,
            status: None,
            listing_date: None,
        }
    }
}

/// A record as held by the persistence store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredListing {
    pub id: i64,
    #[serde(flatten)]
    pub record: ListingRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of one full scraping pass for a location query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeOutcome {
    pub success: bool,
    pub location: String,
    pub resolved_url: Option<String>,
    pub records: Vec<ListingRecord>,
    /// Listing containers seen on all pages
    pub attempted: usize,
    /// Records that made it into `records`
    pub produced: usize,
    pub pages_visited: usize,
    pub errors: Vec<String>,
    pub scraped_at: DateTime<Utc>,
}

impl ScrapeOutcome {
    /// A run that failed before reaching pagination. Never carries records.
    pub fn failed(location: &str, errors: Vec<String>) -> Self {
        Self {
            success: false,
            location: location.to_string(),
            resolved_url: None,
            records: Vec::new(),
            attempted: 0,
            produced: 0,
            pages_visited: 0,
            errors,
            scraped_at: Utc::now(),
        }
    }

    /// A run that reached pagination, regardless of how many records it found.
    pub fn completed(
        location: &str,
        resolved_url: String,
        records: Vec<ListingRecord>,
        attempted: usize,
        pages_visited: usize,
        errors: Vec<String>,
    ) -> Self {
        Self {
            success: true,
            location: location.to_string(),
            resolved_url: Some(resolved_url),
            produced: records.len(),
            records,
            attempted,
            pages_visited,
            errors,
            scraped_at: Utc::now(),
        }
    }
}

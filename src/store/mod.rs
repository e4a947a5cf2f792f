//! SQLite persistence for scraped listings, keyed by listing URL.

use crate::models::{ListingRecord, ListingStatus, StoredListing};
use anyhow::Context;
use chrono::Utc;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("record has an empty listing URL")]
    MissingKey,
}

/// Insert-or-update store for listings
pub trait ListingStore {
    /// Insert a new row or refresh every mutable field of the existing one
    fn upsert(&self, record: &ListingRecord) -> Result<StoredListing, StoreError>;

    /// Rows for `suburb`, newest listing date first
    fn find_by_location(&self, suburb: &str) -> Result<Vec<StoredListing>, StoreError>;
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS listings (
        id                INTEGER PRIMARY KEY,
        listing_url       TEXT UNIQUE NOT NULL,
        street_address    TEXT,
        estate_or_complex TEXT,
        suburb            TEXT NOT NULL,
        city              TEXT,
        postal_code       TEXT,
        floor_size_sqm    REAL,
        total_price       REAL,
        price_per_sqm     REAL,
        rates_and_taxes   REAL,
        levies            REAL,
        property_type     TEXT,
        bedrooms          INTEGER,
        bathrooms         INTEGER,
        status            TEXT CHECK(status IN ('sold','under_offer','no_offer')),
        listing_date      TEXT,
        created_at        TEXT NOT NULL,
        updated_at        TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_listings_suburb ON listings(suburb COLLATE NOCASE);
";

const COLUMNS: &str = "id, listing_url, street_address, estate_or_complex, suburb, city, postal_code,
    floor_size_sqm, total_price, price_per_sqm, rates_and_taxes, levies, property_type,
    bedrooms, bathrooms, status, listing_date, created_at, updated_at";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file and make sure the schema exists
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening database {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = Self::with_connection(conn)?;
        info!("Opened listing store at {}", path.display());
        Ok(store)
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    fn find_by_url(&self, listing_url: &str) -> Result<StoredListing, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM listings WHERE listing_url = ?1");
        Ok(self.conn.query_row(&sql, [listing_url], row_to_stored)?)
    }
}

impl ListingStore for SqliteStore {
    fn upsert(&self, record: &ListingRecord) -> Result<StoredListing, StoreError> {
        if record.listing_url.trim().is_empty() {
            return Err(StoreError::MissingKey);
        }

        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO listings (
                listing_url, street_address, estate_or_complex, suburb, city, postal_code,
                floor_size_sqm, total_price, price_per_sqm, rates_and_taxes, levies,
                property_type, bedrooms, bathrooms, status, listing_date, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?17)
             ON CONFLICT(listing_url) DO UPDATE SET
                street_address    = excluded.street_address,
                estate_or_complex = excluded.estate_or_complex,
                suburb            = excluded.suburb,
                city              = excluded.city,
                postal_code       = excluded.postal_code,
                floor_size_sqm    = excluded.floor_size_sqm,
                total_price       = excluded.total_price,
                price_per_sqm     = excluded.price_per_sqm,
                rates_and_taxes   = excluded.rates_and_taxes,
                levies            = excluded.levies,
                property_type     = excluded.property_type,
                bedrooms          = excluded.bedrooms,
                bathrooms         = excluded.bathrooms,
                status            = excluded.status,
                listing_date      = excluded.listing_date,
                updated_at        = excluded.updated_at",
            params![
                record.listing_url,
                record.street_address,
                record.estate_or_complex,
                record.suburb,
                record.city,
                record.postal_code,
                record.floor_size_sqm,
                record.total_price,
                record.price_per_sqm,
                record.rates_and_taxes,
                record.levies,
                record.property_type,
                record.bedrooms,
                record.bathrooms,
                record.status.map(|s| s.as_str()),
                record.listing_date,
                now,
            ],
        )?;

        debug!("Upserted {}", record.listing_url);
        self.find_by_url(&record.listing_url)
    }

    fn find_by_location(&self, suburb: &str) -> Result<Vec<StoredListing>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM listings
             WHERE suburb = ?1 COLLATE NOCASE
             ORDER BY listing_date IS NULL, listing_date DESC, updated_at DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([suburb.trim()], row_to_stored)?;
        let listings = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(listings)
    }
}

fn row_to_stored(row: &Row<'_>) -> rusqlite::Result<StoredListing> {
    let status: Option<String> = row.get("status")?;
    Ok(StoredListing {
        id: row.get("id")?,
        record: ListingRecord {
            listing_url: row.get("listing_url")?,
            street_address: row.get("street_address")?,
            estate_or_complex: row.get("estate_or_complex")?,
            suburb: row.get("suburb")?,
            city: row.get("city")?,
            postal_code: row.get("postal_code")?,
            floor_size_sqm: row.get("floor_size_sqm")?,
            total_price: row.get("total_price")?,
            price_per_sqm: row.get("price_per_sqm")?,
            rates_and_taxes: row.get("rates_and_taxes")?,
            levies: row.get("levies")?,
            property_type: row.get("property_type")?,
            bedrooms: row.get("bedrooms")?,
            bathrooms: row.get("bathrooms")?,
            status: status.as_deref().and_then(ListingStatus::parse),
            listing_date: row.get("listing_date")?,
        },
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Tally of one save phase
#[derive(Debug, Default)]
pub struct SaveReport {
    pub saved: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Upsert every record, counting failures instead of stopping at them.
pub fn save_all<S>(store: &S, records: &[ListingRecord]) -> SaveReport
where
    S: ListingStore + ?Sized,
{
    let mut report = SaveReport::default();
    for record in records {
        match store.upsert(record) {
            Ok(stored) => {
                debug!("Saved listing #{} {}", stored.id, stored.record.listing_url);
                report.saved += 1;
            }
            Err(e) => {
                warn!("Failed to save {}: {}", record.listing_url, e);
                report.failed += 1;
                report.errors.push(format!("{}: {}", record.listing_url, e));
            }
        }
    }
    info!("Saved {} listings ({} failed)", report.saved, report.failed);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(url: &str, suburb: &str) -> ListingRecord {
        ListingRecord::new(url, suburb)
    }

    #[test]
    fn test_upsert_same_url_keeps_one_row_with_latest_values() {
        let store = SqliteStore::in_memory().unwrap();

        let mut first = record("https://homes.test/for-sale/a/1", "Sandton");
        first.total_price = Some(1_000_000.0);
        first.status = Some(ListingStatus::UnderOffer);
        let inserted = store.upsert(&first).unwrap();

        let mut second = first.clone();
        second.total_price = Some(950_000.0);
        second.bedrooms = Some(3);
        second.status = Some(ListingStatus::Sold);
        let updated = store.upsert(&second).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(updated.id, inserted.id);
        assert_eq!(updated.record, second);
        assert_eq!(updated.created_at, inserted.created_at);
        assert!(updated.updated_at >= inserted.updated_at);
    }

    #[test]
    fn test_round_trips_every_field() {
        let store = SqliteStore::in_memory().unwrap();
        let full = ListingRecord {
            listing_url: "https://homes.test/for-sale/b/2".to_string(),
            street_address: Some("12 Oak St".to_string()),
            estate_or_complex: Some("Oakwood Estate".to_string()),
            suburb: "Sandton".to_string(),
            city: Some("Johannesburg".to_string()),
            postal_code: Some("2196".to_string()),
            floor_size_sqm: Some(120.5),
            total_price: Some(1_250_000.0),
            price_per_sqm: Some(10_373.0),
            rates_and_taxes: Some(1_200.0),
            levies: Some(950.0),
            property_type: Some("townhouse".to_string()),
            bedrooms: Some(3),
            bathrooms: Some(2),
            status: Some(ListingStatus::NoOffer),
            listing_date: NaiveDate::from_ymd_opt(2024, 3, 15),
        };

        let stored = store.upsert(&full).unwrap();
        assert_eq!(stored.record, full);
    }

    #[test]
    fn test_find_by_location_orders_by_listing_date_descending() {
        let store = SqliteStore::in_memory().unwrap();

        let mut older = record("https://homes.test/1", "Sandton");
        older.listing_date = NaiveDate::from_ymd_opt(2023, 1, 10);
        let mut newer = record("https://homes.test/2", "Sandton");
        newer.listing_date = NaiveDate::from_ymd_opt(2024, 6, 1);
        let undated = record("https://homes.test/3", "sandton");
        let elsewhere = record("https://homes.test/4", "Rosebank");

        for r in [&older, &undated, &newer, &elsewhere] {
            store.upsert(r).unwrap();
        }

        let found = store.find_by_location("Sandton").unwrap();
        let urls: Vec<&str> = found.iter().map(|s| s.record.listing_url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://homes.test/2", "https://homes.test/1", "https://homes.test/3"]
        );
    }

    #[test]
    fn test_save_all_counts_failures_and_continues() {
        let store = SqliteStore::in_memory().unwrap();
        let records = vec![
            record("https://homes.test/1", "Sandton"),
            record("", "Sandton"),
            record("https://homes.test/2", "Sandton"),
        ];

        let report = save_all(&store, &records);

        assert_eq!(report.saved, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(store.count().unwrap(), 2);
    }
}

mod error;
mod models;
mod scrapers;
mod store;

use clap::{Parser, Subcommand};
use models::ScrapeOutcome;
use scrapers::{ListingScraper, ListingSource, ScrapeConfig};
use std::path::PathBuf;
use store::{ListingStore, SqliteStore};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "listing-scout", about = "Scrape property listings for a location into SQLite")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a location and scrape every result page
    Scrape {
        /// Free-text location, e.g. "Sandton"
        location: String,
        /// Show the browser window
        #[arg(long)]
        headed: bool,
        /// Per-navigation timeout in milliseconds
        #[arg(long, default_value_t = scrapers::types::DEFAULT_TIMEOUT_MS)]
        timeout_ms: u64,
        /// Site root that hosts the search UI
        #[arg(long, default_value = scrapers::types::DEFAULT_BASE_URL)]
        base_url: String,
        /// Where per-run snapshot folders go
        #[arg(long, default_value = "debug")]
        snapshot_dir: PathBuf,
        #[arg(long, default_value = "data/listings.sqlite")]
        db: PathBuf,
        /// Also write the outcome as JSON
        #[arg(long)]
        json: Option<PathBuf>,
        /// Skip the save phase
        #[arg(long)]
        no_save: bool,
    },
    /// Show stored listings for a suburb
    List {
        suburb: String,
        #[arg(long, default_value = "data/listings.sqlite")]
        db: PathBuf,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

fn fmt_amount(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("R {:.0}", v))
}

fn print_outcome(outcome: &ScrapeOutcome) {
    println!();
    println!(
        "{} '{}': {} listings from {} containers over {} pages",
        if outcome.success { "✅" } else { "❌" },
        outcome.location,
        outcome.produced,
        outcome.attempted,
        outcome.pages_visited
    );
    if let Some(url) = &outcome.resolved_url {
        println!("   Index: {}", url);
    }
    println!();

    for (i, record) in outcome.records.iter().enumerate() {
        println!(
            "{}. {} ({})",
            i + 1,
            record.street_address.as_deref().unwrap_or("(no address)"),
            fmt_amount(record.total_price)
        );
        println!(
            "   {} | {} bed, {} bath | {} m² | {}",
            record.property_type.as_deref().unwrap_or("?"),
            record.bedrooms.map_or("?".to_string(), |n| n.to_string()),
            record.bathrooms.map_or("?".to_string(), |n| n.to_string()),
            record.floor_size_sqm.map_or("?".to_string(), |n| n.to_string()),
            record.suburb
        );
        println!("   URL: {}", record.listing_url);
    }

    if !outcome.errors.is_empty() {
        println!();
        println!("⚠️  {} warnings/errors:", outcome.errors.len());
        for message in &outcome.errors {
            println!("   - {}", message);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .init();

    match cli.command {
        Commands::Scrape {
            location,
            headed,
            timeout_ms,
            base_url,
            snapshot_dir,
            db,
            json,
            no_save,
        } => {
            let scraper = ListingScraper::new(ScrapeConfig {
                base_url,
                headless: !headed,
                timeout_ms,
                snapshot_root: snapshot_dir,
            });
            info!(
                "🏠 {} scraper for '{}' ({})",
                scraper.source_name(),
                location,
                scraper.config().base_url
            );

            let outcome = scraper.scrape(&location).await;
            print_outcome(&outcome);

            if let Some(path) = json {
                let body = serde_json::to_string_pretty(&outcome)?;
                tokio::fs::write(&path, body).await?;
                info!("💾 Saved outcome to {}", path.display());
            }

            if !outcome.success {
                anyhow::bail!("scrape for '{}' failed", location);
            }

            if no_save {
                info!("Skipping save phase");
            } else if !outcome.records.is_empty() {
                let store = SqliteStore::open(&db)?;
                let report = store::save_all(&store, &outcome.records);
                println!();
                println!("💾 Saved {} listings, {} failed", report.saved, report.failed);
                for message in &report.errors {
                    warn!("{}", message);
                }
            }
        }
        Commands::List { suburb, db, limit } => {
            let store = SqliteStore::open(&db)?;
            let listings = store.find_by_location(&suburb)?;
            println!(
                "{} stored listings in {} ({} in store)",
                listings.len(),
                suburb,
                store.count()?
            );
            for stored in listings.iter().take(limit) {
                let record = &stored.record;
                println!(
                    "#{} {} {} {} {}",
                    stored.id,
                    record
                        .listing_date
                        .map_or("----------".to_string(), |d| d.to_string()),
                    fmt_amount(record.total_price),
                    record.status.map_or("-", |s| s.as_str()),
                    record.listing_url
                );
            }
        }
    }

    Ok(())
}

pub mod browser;
pub mod extract;
pub mod fields;
pub mod listing;
pub mod pagination;
pub mod resolver;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod testing;

pub use listing::ListingScraper;
pub use traits::ListingSource;
pub use types::ScrapeConfig;

use crate::models::ListingRecord;
use crate::scrapers::fields::{
    classify_property_type, classify_status, normalize_whitespace, parse_bathrooms,
    parse_bedrooms, parse_floor_size, parse_levies, parse_listing_date, parse_price,
    parse_rates_and_taxes, segment_address,
};
use crate::scrapers::traits::ListingExtractor;
use crate::scrapers::types::CONTAINER_STRATEGIES;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css}: {e:?}"))
}

static CONTAINERS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    CONTAINER_STRATEGIES
        .iter()
        .map(|group| selector(&group.join(", ")))
        .collect()
});

static LINKS: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));

static TITLE_LINKS: LazyLock<Selector> = LazyLock::new(|| {
    selector("h1 a[href], h2 a[href], h3 a[href], a[class*=\"title\"][href], [class*=\"title\"] a[href]")
});

static ADDRESS: LazyLock<Selector> = LazyLock::new(|| {
    selector("[data-testid*=\"address\"], [itemprop=\"streetAddress\"], [class*=\"address\"], [class*=\"location\"]")
});

static PRICE: LazyLock<Selector> =
    LazyLock::new(|| selector("[data-testid*=\"price\"], [itemprop=\"price\"], [class*=\"price\"]"));

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| selector("[data-testid*=\"type\"], [class*=\"type\"], h1, h2, h3, [class*=\"title\"]"));

static FEATURES: LazyLock<Selector> = LazyLock::new(|| {
    selector("[data-testid*=\"feature\"], [class*=\"feature\"], [class*=\"size\"], [title], [aria-label]")
});

static STATUS: LazyLock<Selector> = LazyLock::new(|| {
    selector("[data-testid*=\"status\"], [class*=\"status\"], [class*=\"badge\"], [class*=\"banner\"], [class*=\"tag\"]")
});

static DATE_ATTR: LazyLock<Selector> = LazyLock::new(|| selector("time[datetime]"));

static DATE: LazyLock<Selector> =
    LazyLock::new(|| selector("[data-testid*=\"date\"], [class*=\"date\"], time"));

const NODE_BREAK: &str = " | ";

static RE_LISTING_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:/for-sale/[^?#]*\d+|/listings?/[^/?#]+|/property/[^/?#]+)")
        .expect("invalid regex: listing path")
});

/// Outcome of extracting one rendered page
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub records: Vec<ListingRecord>,
    /// Containers found on the page, including skipped ones
    pub attempted: usize,
    pub warnings: Vec<String>,
}

/// Parses listing cards out of rendered result-page HTML.
///
/// Pure with respect to its input: no browser or network access.
pub struct RecordExtractor {
    base_url: Url,
    default_suburb: String,
}

impl RecordExtractor {
    /// `base_url` resolves relative links; `default_suburb` fills unparseable addresses
    pub fn new(base_url: Url, default_suburb: impl Into<String>) -> Self {
        Self {
            base_url,
            default_suburb: default_suburb.into(),
        }
    }

    pub fn extract(&self, html: &str) -> Extraction {
        let document = Html::parse_document(html);
        let containers = find_containers(&document);

        let mut extraction = Extraction {
            attempted: containers.len(),
            ..Default::default()
        };

        if containers.is_empty() {
            let message = "no listing containers matched any selector strategy (possible markup drift)";
            warn!("{}", message);
            extraction.warnings.push(message.to_string());
            return extraction;
        }

        for (idx, container) in containers.into_iter().enumerate() {
            match self.extract_container(container) {
                Ok(record) => {
                    debug!("Extracted listing {}: {}", idx, record.listing_url);
                    extraction.records.push(record);
                }
                Err(reason) => {
                    warn!("Skipped listing container {}: {}", idx, reason);
                    extraction
                        .warnings
                        .push(format!("container {}: {}", idx, reason));
                }
            }
        }

        extraction
    }

    fn extract_container(&self, container: ElementRef) -> Result<ListingRecord, String> {
        let listing_url = self
            .listing_url(container)
            .ok_or_else(|| "no resolvable listing link".to_string())?;

        let full_text = segmented_text(container);
        let mut record = ListingRecord::new(listing_url, self.default_suburb.clone());

        if let Some(address) = first_fragment(container, &ADDRESS, fragment_text) {
            let parts = segment_address(&address);
            record.street_address = parts.street;
            record.estate_or_complex = parts.estate;
            record.city = parts.city;
            record.postal_code = parts.postal_code;
            if let Some(suburb) = parts.suburb {
                record.suburb = suburb;
            }
        }

        let price = first_fragment(container, &PRICE, numeric_fragment_text)
            .map(|text| parse_price(&text))
            .unwrap_or_default();
        record.total_price = price.total;
        record.price_per_sqm = price.per_sqm.or_else(|| parse_price(&full_text).per_sqm);
        record.rates_and_taxes = parse_rates_and_taxes(&full_text);
        record.levies = parse_levies(&full_text);

        record.property_type = fragments_then(container, &TITLE, fragment_text, &full_text)
            .find_map(|text| classify_property_type(&text));

        let features: Vec<String> =
            fragments_then(container, &FEATURES, numeric_fragment_text, &full_text).collect();
        record.bedrooms = features.iter().find_map(|text| parse_bedrooms(text));
        record.bathrooms = features.iter().find_map(|text| parse_bathrooms(text));
        record.floor_size_sqm = features.iter().find_map(|text| parse_floor_size(text));

        record.status = container
            .select(&STATUS)
            .map(fragment_text)
            .find_map(|text| classify_status(&text));

        record.listing_date = container
            .select(&DATE_ATTR)
            .filter_map(|el| el.value().attr("datetime"))
            .find_map(parse_listing_date)
            .or_else(|| {
                container
                    .select(&DATE)
                    .map(fragment_text)
                    .find_map(|text| parse_listing_date(&text))
            });

        Ok(record)
    }

    /// Listing-path link first, then a title link, then the container itself.
    fn listing_url(&self, container: ElementRef) -> Option<String> {
        let own_href = (container.value().name() == "a")
            .then(|| container.value().attr("href"))
            .flatten();

        own_href
            .filter(|href| RE_LISTING_PATH.is_match(href))
            .and_then(|href| self.absolute(href))
            .or_else(|| {
                container
                    .select(&LINKS)
                    .filter_map(|a| a.value().attr("href"))
                    .filter(|href| RE_LISTING_PATH.is_match(href))
                    .find_map(|href| self.absolute(href))
            })
            .or_else(|| {
                container
                    .select(&TITLE_LINKS)
                    .filter_map(|a| a.value().attr("href"))
                    .find_map(|href| self.absolute(href))
            })
            .or_else(|| own_href.and_then(|href| self.absolute(href)))
    }

    fn absolute(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            return None;
        }
        let url = self.base_url.join(href).ok()?;
        matches!(url.scheme(), "http" | "https").then(|| url.to_string())
    }
}

impl ListingExtractor for RecordExtractor {
    fn extract(&self, html: &str) -> Extraction {
        RecordExtractor::extract(self, html)
    }
}

/// First strategy with any match wins; containers nested inside another are dropped.
fn find_containers(document: &Html) -> Vec<ElementRef<'_>> {
    for (strategy, selector) in CONTAINERS.iter().enumerate() {
        let matched: Vec<ElementRef> = document.select(selector).collect();
        if matched.is_empty() {
            continue;
        }

        let ids: HashSet<_> = matched.iter().map(|el| el.id()).collect();
        let outermost: Vec<ElementRef> = matched
            .into_iter()
            .filter(|el| !el.ancestors().any(|ancestor| ids.contains(&ancestor.id())))
            .collect();

        debug!(
            "Container strategy {} matched {} listings",
            strategy,
            outermost.len()
        );
        return outermost;
    }
    Vec::new()
}

fn element_text(element: ElementRef) -> String {
    normalize_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Text nodes joined by `" | "`, so numbers from sibling elements never merge into one.
fn segmented_text(element: ElementRef) -> String {
    element
        .text()
        .map(normalize_whitespace)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(NODE_BREAK)
}

fn with_labels(element: ElementRef, text: String) -> String {
    let mut parts = vec![text];
    for attr in ["title", "aria-label"] {
        if let Some(value) = element.value().attr(attr) {
            parts.push(normalize_whitespace(value));
        }
    }
    parts.retain(|part| !part.is_empty());
    parts.join(" ")
}

/// Visible text plus `title`/`aria-label`, so icon-only features still read as "3 Bedrooms".
fn fragment_text(element: ElementRef) -> String {
    with_labels(element, element_text(element))
}

/// Like `fragment_text`, keeping node breaks for numeric fields.
fn numeric_fragment_text(element: ElementRef) -> String {
    with_labels(element, segmented_text(element))
}

fn first_fragment(
    container: ElementRef,
    selector: &Selector,
    text_of: fn(ElementRef) -> String,
) -> Option<String> {
    container
        .select(selector)
        .map(text_of)
        .find(|text| !text.is_empty())
}

fn fragments_then<'a>(
    container: ElementRef<'a>,
    selector: &'a Selector,
    text_of: fn(ElementRef) -> String,
    full_text: &str,
) -> impl Iterator<Item = String> + 'a {
    container
        .select(selector)
        .map(text_of)
        .chain(std::iter::once(full_text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListingStatus;
    use chrono::NaiveDate;

    fn extractor() -> RecordExtractor {
        RecordExtractor::new(
            Url::parse("https://www.property24.com/for-sale/sandton/gauteng/109").unwrap(),
            "Sandton",
        )
    }

    const SEMANTIC_PAGE: &str = r#"
        <html><body>
          <div data-testid="listing-card">
            <a href="/for-sale/sandton/gauteng/109/114523201"><h3 class="title">3 Bedroom Townhouse for sale</h3></a>
            <span data-testid="address">12 Oak St, Oakwood Estate, Sandton, Johannesburg, 2196</span>
            <div data-testid="price">R 1,250,000</div>
            <ul>
              <li class="feature" title="Bedrooms"><span>3</span></li>
              <li class="feature" title="Bathrooms"><span>2</span></li>
              <li class="feature" title="Floor Size"><span>120 m²</span></li>
            </ul>
            <p>Rates and Taxes: R 1 200 Levies: R 950</p>
            <span class="badge">Under Offer</span>
            <time datetime="2024-03-15T10:30:00Z">15 March</time>
          </div>
          <div data-testid="listing-card">
            <span data-testid="address">No link here</span>
            <div data-testid="price">R 900 000</div>
          </div>
          <div data-testid="listing-card">
            <a href="https://www.property24.com/for-sale/sandton/gauteng/109/114523999">Apartment</a>
            <div class="price">R 2 100 000 <small>R 25 000 per m²</small></div>
            <span class="status-badge">SOLD</span>
            <span class="listing-date">Listed 01/02/2024</span>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_extracts_semantic_cards_and_skips_linkless_container() {
        let extraction = extractor().extract(SEMANTIC_PAGE);

        assert_eq!(extraction.attempted, 3);
        assert_eq!(extraction.records.len(), 2);
        assert_eq!(extraction.warnings.len(), 1);
        for record in &extraction.records {
            assert!(record.listing_url.starts_with("https://"));
        }
        assert_eq!(
            extraction.records[0].listing_url,
            "https://www.property24.com/for-sale/sandton/gauteng/109/114523201"
        );
        assert_eq!(
            extraction.records[1].listing_url,
            "https://www.property24.com/for-sale/sandton/gauteng/109/114523999"
        );
    }

    #[test]
    fn test_extracts_all_fields_from_rich_card() {
        let extraction = extractor().extract(SEMANTIC_PAGE);
        let record = &extraction.records[0];

        assert_eq!(record.street_address.as_deref(), Some("12 Oak St"));
        assert_eq!(record.estate_or_complex.as_deref(), Some("Oakwood Estate"));
        assert_eq!(record.suburb, "Sandton");
        assert_eq!(record.city.as_deref(), Some("Johannesburg"));
        assert_eq!(record.postal_code.as_deref(), Some("2196"));
        assert_eq!(record.total_price, Some(1_250_000.0));
        assert_eq!(record.price_per_sqm, None);
        assert_eq!(record.rates_and_taxes, Some(1_200.0));
        assert_eq!(record.levies, Some(950.0));
        assert_eq!(record.property_type.as_deref(), Some("townhouse"));
        assert_eq!(record.bedrooms, Some(3));
        assert_eq!(record.bathrooms, Some(2));
        assert_eq!(record.floor_size_sqm, Some(120.0));
        assert_eq!(record.status, Some(ListingStatus::UnderOffer));
        assert_eq!(record.listing_date, NaiveDate::from_ymd_opt(2024, 3, 15));
    }

    #[test]
    fn test_sparse_card_defaults_suburb_and_reads_per_area_price() {
        let extraction = extractor().extract(SEMANTIC_PAGE);
        let record = &extraction.records[1];

        assert_eq!(record.suburb, "Sandton");
        assert_eq!(record.street_address, None);
        assert_eq!(record.total_price, Some(2_100_000.0));
        assert_eq!(record.price_per_sqm, Some(25_000.0));
        assert_eq!(record.property_type.as_deref(), Some("apartment"));
        assert_eq!(record.status, Some(ListingStatus::Sold));
        assert_eq!(record.listing_date, NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(record.bedrooms, None);
    }

    #[test]
    fn test_falls_back_to_class_substring_containers() {
        let html = r#"
            <div class="p24_regularTile js_resultTile">
              <a class="title" href="/listing/abc-123">Cluster in Bryanston</a>
              <span class="p24_address">5 Elm Rd, Bryanston</span>
            </div>
            <div class="js_resultTile">
              <a href="/for-sale/bryanston/gauteng/8/998877">House</a>
            </div>
        "#;
        let extraction = extractor().extract(html);

        assert_eq!(extraction.attempted, 2);
        assert_eq!(extraction.records.len(), 2);
        assert_eq!(
            extraction.records[0].listing_url,
            "https://www.property24.com/listing/abc-123"
        );
        assert_eq!(extraction.records[0].street_address.as_deref(), Some("5 Elm Rd"));
        assert_eq!(extraction.records[0].estate_or_complex.as_deref(), Some("Bryanston"));
        assert_eq!(extraction.records[0].suburb, "Sandton");
        assert_eq!(extraction.records[1].property_type.as_deref(), Some("house"));
    }

    #[test]
    fn test_falls_back_to_articles_and_title_links() {
        let html = r#"
            <article>
              <h2><a href="/homes/cozy-flat">Cozy flat</a></h2>
              <p>2 beds, 1 bath, 65 m²</p>
            </article>
        "#;
        let extraction = extractor().extract(html);

        assert_eq!(extraction.records.len(), 1);
        let record = &extraction.records[0];
        assert_eq!(record.listing_url, "https://www.property24.com/homes/cozy-flat");
        assert_eq!(record.bedrooms, Some(2));
        assert_eq!(record.bathrooms, Some(1));
        assert_eq!(record.floor_size_sqm, Some(65.0));
        assert_eq!(record.property_type.as_deref(), Some("flat"));
    }

    #[test]
    fn test_feature_wrapper_keeps_sibling_numbers_apart() {
        let html = r#"
            <div data-testid="listing-card">
              <a href="/for-sale/sandton/gauteng/109/114520001">House</a>
              <div class="price"><span>R 1 250 000</span><span>2019</span></div>
              <div class="listing-features">
                <span title="Bedrooms">3</span><span title="Bathrooms">2</span><span title="Floor Size">120 m²</span>
              </div>
            </div>
        "#;
        let extraction = extractor().extract(html);
        let record = &extraction.records[0];

        assert_eq!(record.bedrooms, Some(3));
        assert_eq!(record.bathrooms, Some(2));
        assert_eq!(record.floor_size_sqm, Some(120.0));
        assert_eq!(record.total_price, Some(1_250_000.0));
    }

    #[test]
    fn test_nested_containers_count_once() {
        let html = r#"
            <div class="listing-card">
              <div class="listing-card-inner">
                <a href="/for-sale/x/y/1/555">Plot</a>
              </div>
            </div>
        "#;
        let extraction = extractor().extract(html);
        assert_eq!(extraction.attempted, 1);
        assert_eq!(extraction.records.len(), 1);
    }

    #[test]
    fn test_ignores_fragment_and_script_links() {
        let html = r##"
            <article>
              <h2><a href="#top">Back to top</a></h2>
              <h3><a href="javascript:void(0)">Save</a></h3>
            </article>
        "##;
        let extraction = extractor().extract(html);
        assert_eq!(extraction.attempted, 1);
        assert!(extraction.records.is_empty());
    }

    #[test]
    fn test_no_containers_reports_markup_drift() {
        let extraction = extractor().extract("<html><body><p>Nothing to see</p></body></html>");
        assert_eq!(extraction.attempted, 0);
        assert!(extraction.records.is_empty());
        assert_eq!(extraction.warnings.len(), 1);
        assert!(extraction.warnings[0].contains("markup drift"));
    }
}

//! Scrape orchestration.
//!
//! One call runs the whole chain for a page:
//!
//! ```text
//! Extracting ─▶ Requesting ─▶ Parsing ─▶ Done
//!                   │            │        ▲
//!                   └──▶ Fallback ◀┘──────┘
//! ```
//!
//! Network and API failures leave through `Requesting → Fallback`, replies
//! that do not parse leave through `Parsing → Fallback`. Both end in `Done`,
//! so extraction failures never reach the caller. The only error a caller
//! sees is failing to obtain the page at all.

use chrono::Utc;
use scraper::Html;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::content::main_content_excerpt;
use crate::error::{ExtractionError, ScrapeError};
use crate::fallback;
use crate::llm::StructuredExtractor;
use crate::models::{Product, ProductInfo};
use crate::page::{self, PageFetcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeState {
    Extracting,
    Requesting,
    Parsing,
    Fallback,
    Done,
}

impl ScrapeState {
    pub fn can_advance_to(self, next: ScrapeState) -> bool {
        use ScrapeState::*;
        matches!(
            (self, next),
            (Extracting, Requesting)
                | (Requesting, Parsing)
                | (Parsing, Done)
                | (Requesting, Fallback)
                | (Parsing, Fallback)
                | (Fallback, Done)
        )
    }
}

/// Where the product fields came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "via", rename_all = "lowercase")]
pub enum Provenance {
    Model,
    Fallback { from: ScrapeState, reason: String },
}

/// A finished scrape.
#[derive(Debug, Clone)]
pub struct Scraped {
    pub product: Product,
    pub provenance: Provenance,
}

/// Wire shape of a scrape result: `{success:true, product}` or
/// `{success:false, error}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<Scraped, ScrapeError>> for ScrapeOutcome {
    fn from(result: Result<Scraped, ScrapeError>) -> Self {
        match result {
            Ok(scraped) => Self {
                success: true,
                product: Some(scraped.product),
                error: None,
            },
            Err(e) => Self {
                success: false,
                product: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Tracks the current state and rejects edges the machine does not have.
struct Machine {
    url: String,
    state: ScrapeState,
}

impl Machine {
    fn new(url: &Url) -> Self {
        Self {
            url: url.to_string(),
            state: ScrapeState::Extracting,
        }
    }

    fn advance(&mut self, next: ScrapeState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "invalid scrape transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(url = %self.url, from = ?self.state, to = ?next, "scrape transition");
        self.state = next;
    }
}

/// Page attributes gathered in one parse, so no DOM is held across awaits.
struct Snapshot {
    excerpt: String,
    image: Option<String>,
}

impl Snapshot {
    fn capture(url: &Url, html: &str, max_excerpt_chars: usize) -> Self {
        let doc = Html::parse_document(html);
        Self {
            excerpt: main_content_excerpt(&doc, max_excerpt_chars),
            image: page::find_product_image(&doc, url),
        }
    }
}

fn fallback_info(html: &str) -> ProductInfo {
    fallback::extract(&Html::parse_document(html))
}

/// Runs the scrape chain. The extractor is supplied per call so a changed
/// API key takes effect on the next scrape.
pub struct Scraper {
    fetcher: PageFetcher,
    max_excerpt_chars: usize,
}

impl Scraper {
    pub fn new(fetcher: PageFetcher, max_excerpt_chars: usize) -> Self {
        Self {
            fetcher,
            max_excerpt_chars,
        }
    }

    /// Scrape `raw_url`, using `html` when given instead of fetching.
    pub async fn scrape(
        &self,
        extractor: &dyn StructuredExtractor,
        raw_url: &str,
        html: Option<&str>,
    ) -> Result<Scraped, ScrapeError> {
        let url = page::parse_page_url(raw_url)?;
        match html {
            Some(html) => Ok(self.scrape_document(extractor, &url, html).await),
            None => {
                let body = self.fetcher.fetch(&url).await?;
                Ok(self.scrape_document(extractor, &url, &body).await)
            }
        }
    }

    /// Run the state machine over an already retrieved document.
    pub async fn scrape_document(
        &self,
        extractor: &dyn StructuredExtractor,
        url: &Url,
        html: &str,
    ) -> Scraped {
        let mut machine = Machine::new(url);
        let snapshot = Snapshot::capture(url, html, self.max_excerpt_chars);

        machine.advance(ScrapeState::Requesting);
        let result = extractor.extract(&snapshot.excerpt).await;

        let (info, provenance) = match result {
            Ok(info) => {
                machine.advance(ScrapeState::Parsing);
                machine.advance(ScrapeState::Done);
                (info, Provenance::Model)
            }
            Err(err) => {
                let from = fallback_edge(&mut machine, &err);
                tracing::warn!(
                    url = %url,
                    extractor = extractor.name(),
                    "structured extraction failed, using fallback: {}",
                    err
                );
                machine.advance(ScrapeState::Fallback);
                let info = fallback_info(html);
                machine.advance(ScrapeState::Done);
                (
                    info,
                    Provenance::Fallback {
                        from,
                        reason: err.to_string(),
                    },
                )
            }
        };

        Scraped {
            product: assemble(url, info, snapshot.image),
            provenance,
        }
    }
}

fn fallback_edge(machine: &mut Machine, err: &ExtractionError) -> ScrapeState {
    if !err.is_request_failure() {
        machine.advance(ScrapeState::Parsing);
    }
    machine.state
}

fn assemble(url: &Url, info: ProductInfo, image: Option<String>) -> Product {
    Product {
        url: url.to_string(),
        title: info.title,
        price: info.price,
        currency: info.currency,
        specs: info.specs,
        image,
        vendor: page::vendor(url),
        scraped_at: Some(Utc::now()),
        added_at: None,
        updated_at: None,
    }
}

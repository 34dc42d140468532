//! Typed request/response contract between front ends and the core.
//!
//! Requests are a tagged union on `action`; every response carries
//! `success` plus the payload for that request, or a human-readable
//! `message` on failure. [`Service::handle`] is the single dispatcher used
//! by the HTTP server, and the CLI calls the same service methods.
//!
//! ```json
//! {"action": "removeProduct", "url": "https://shop.test/p/1"}
//! {"success": true, "removed": true}
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::compare::ViewOptions;
use crate::config::{LlmConfig, API_KEY_ENV};
use crate::error::{ExtractionError, ScrapeError, StorageError};
use crate::llm::{GeminiClient, StructuredExtractor};
use crate::models::{Product, Settings};
use crate::scrape::{Provenance, ScrapeOutcome, Scraped, Scraper};
use crate::store::{Storage, UpsertKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    /// Scrape a page and save the result.
    ScrapeProduct {
        url: String,
        /// Page source to use instead of fetching `url`.
        #[serde(default)]
        html: Option<String>,
    },
    AddProduct {
        product: Product,
    },
    GetProducts {
        #[serde(flatten)]
        view: ViewOptions,
    },
    RemoveProduct {
        url: String,
    },
    GetSettings,
    SaveSettings {
        #[serde(rename = "apiKey")]
        api_key: String,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Set by `scrapeProduct` failures, mirroring [`ScrapeOutcome`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<Product>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
}

impl Response {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

impl From<ScrapeOutcome> for Response {
    fn from(outcome: ScrapeOutcome) -> Self {
        Self {
            success: outcome.success,
            product: outcome.product,
            error: outcome.error,
            ..Self::default()
        }
    }
}

/// Where the structured extractor comes from.
pub enum ExtractorSource {
    /// A Gemini client built per scrape from the current settings.
    Configured(LlmConfig),
    /// A fixed extractor (custom backends, tests).
    Fixed(Arc<dyn StructuredExtractor>),
}

/// Owns the store and the scraper and answers [`Request`]s.
pub struct Service {
    storage: Arc<Storage>,
    scraper: Scraper,
    extractors: ExtractorSource,
}

impl Service {
    pub fn new(storage: Arc<Storage>, scraper: Scraper, extractors: ExtractorSource) -> Self {
        Self {
            storage,
            scraper,
            extractors,
        }
    }

    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::ScrapeProduct { url, html } => {
                match self.scrape_and_save(&url, html.as_deref()).await {
                    Ok((product, provenance, kind)) => {
                        let outcome = ScrapeOutcome::from(Ok::<_, ScrapeError>(Scraped {
                            product,
                            provenance: provenance.clone(),
                        }));
                        Response {
                            message: Some(saved_message(kind).to_string()),
                            provenance: Some(provenance),
                            ..Response::from(outcome)
                        }
                    }
                    Err(e) => Response::from(ScrapeOutcome {
                        success: false,
                        product: None,
                        error: Some(e.to_string()),
                    }),
                }
            }
            Request::AddProduct { product } => match self.storage.upsert(product).await {
                Ok(kind) => Response::ok(saved_message(kind)),
                Err(e) => Response::failure(e.to_string()),
            },
            Request::GetProducts { view } => match self.products(&view).await {
                Ok(products) => Response {
                    success: true,
                    products: Some(products),
                    ..Response::default()
                },
                Err(e) => Response::failure(e.to_string()),
            },
            Request::RemoveProduct { url } => match self.storage.remove(&url).await {
                Ok(removed) => Response {
                    success: true,
                    message: Some("Product removed successfully".to_string()),
                    removed: Some(removed),
                    ..Response::default()
                },
                Err(e) => Response::failure(e.to_string()),
            },
            Request::GetSettings => match self.storage.settings().await {
                Ok(settings) => Response {
                    success: true,
                    settings: Some(settings),
                    ..Response::default()
                },
                Err(e) => Response::failure(e.to_string()),
            },
            Request::SaveSettings { api_key } => {
                let settings = Settings {
                    api_key: api_key.trim().to_string(),
                };
                match self.storage.save_settings(&settings).await {
                    Ok(()) => Response::ok("Settings saved successfully"),
                    Err(e) => Response::failure(e.to_string()),
                }
            }
        }
    }

    /// The stored products with `view` applied.
    pub async fn products(&self, view: &ViewOptions) -> Result<Vec<Product>, StorageError> {
        Ok(view.apply(self.storage.list().await?))
    }

    /// Scrape a page and upsert the result.
    pub async fn scrape_and_save(
        &self,
        url: &str,
        html: Option<&str>,
    ) -> Result<(Product, Provenance, UpsertKind), ServiceError> {
        let extractor = self.extractor().await?;
        let scraped = self.scraper.scrape(extractor.as_ref(), url, html).await?;
        let kind = self.storage.upsert(scraped.product.clone()).await?;
        Ok((scraped.product, scraped.provenance, kind))
    }

    async fn extractor(&self) -> Result<Arc<dyn StructuredExtractor>, ServiceError> {
        match &self.extractors {
            ExtractorSource::Fixed(extractor) => Ok(extractor.clone()),
            ExtractorSource::Configured(llm) => {
                let key = resolve_api_key(&self.storage.settings().await?);
                Ok(Arc::new(GeminiClient::new(llm, key)?))
            }
        }
    }
}

/// Stored key, or the environment variable when the stored key is empty.
pub fn resolve_api_key(settings: &Settings) -> String {
    if !settings.api_key.trim().is_empty() {
        return settings.api_key.trim().to_string();
    }
    std::env::var(API_KEY_ENV).unwrap_or_default()
}

fn saved_message(kind: UpsertKind) -> &'static str {
    match kind {
        UpsertKind::Inserted => "Product added successfully",
        UpsertKind::Updated => "Product updated successfully",
    }
}

/// Failures of a service operation, reported to the user as-is.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Error scraping product: {0}")]
    Scrape(#[from] ScrapeError),

    #[error("Error saving product: {0}")]
    Storage(#[from] StorageError),

    #[error("Error creating extraction client: {0}")]
    Client(#[from] ExtractionError),
}

//! Core data models.
//!
//! These are the records that flow from a scrape into the store and out to
//! the comparison view. Field names serialize in camelCase so persisted
//! files keep the `addedAt` / `updatedAt` layout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A saved product, keyed by `url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub url: String,
    pub title: String,
    pub price: String,
    pub currency: String,
    #[serde(default)]
    pub specs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub vendor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Numeric value of `price`, if it parses.
    ///
    /// Commas are treated as thousand separators.
    pub fn price_value(&self) -> Option<f64> {
        let cleaned: String = self.price.chars().filter(|c| *c != ',').collect();
        cleaned.trim().parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

/// The four fields produced by structured or heuristic extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub title: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub price: String,
    #[serde(default)]
    pub specs: Vec<String>,
    #[serde(default)]
    pub currency: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
        Null,
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
        Raw::Null => String::new(),
    })
}

/// Process-wide settings. Overwritten wholesale on save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub api_key: String,
}

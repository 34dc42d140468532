//! Heuristic product extraction used when the model call is unavailable.
//!
//! Pure and infallible: every field has a default, so the worst case is a
//! record of defaults. Selector guesses come first; embedded JSON-LD
//! `Product` data only fills fields the selectors could not.
//!
//! The price/currency split assumes a simple `$123.45` style string.
//! Thousand separators and multi-currency strings are not normalized.

use scraper::{ElementRef, Html};
use serde_json::Value;

use crate::heuristics::{element_text, first_match, selector, Rule};
use crate::models::ProductInfo;

pub const UNKNOWN_TITLE: &str = "Unknown Product";
pub const DEFAULT_CURRENCY: &str = "$";

pub const TITLE_RULES: &[Rule] = &[
    Rule::text("h1"),
    Rule::text("[data-product-title]"),
    Rule::text(".product-title"),
    Rule::text("#product-title"),
    Rule::text(".product-name"),
];

pub const PRICE_RULES: &[Rule] = &[
    Rule::text("[data-price]"),
    Rule::text(".price"),
    Rule::text(".product-price"),
    Rule::text(".current-price"),
    Rule::new("span", dollar_text),
    Rule::text(".price-current"),
];

pub const SPEC_SELECTOR: &str = "table tr, .specifications li";

fn dollar_text(el: ElementRef<'_>) -> Option<String> {
    let text = element_text(el);
    text.contains('$').then_some(text)
}

/// Derive product fields from the document without any network call.
pub fn extract(doc: &Html) -> ProductInfo {
    let structured = StructuredData::from_document(doc);
    let price_text = first_match(doc, PRICE_RULES);

    let title = first_match(doc, TITLE_RULES)
        .or(structured.title)
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

    let (price, currency) = match price_text {
        Some(text) => (price_digits(&text), currency_residue(&text)),
        None => (
            structured.price.unwrap_or_default(),
            structured
                .currency
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        ),
    };

    ProductInfo {
        title,
        price,
        specs: specs(doc),
        currency,
    }
}

/// Keep digits and separators.
pub fn price_digits(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect()
}

/// Everything that is not a digit, separator or whitespace.
pub fn currency_residue(text: &str) -> String {
    text.chars()
        .filter(|c| !(c.is_ascii_digit() || *c == '.' || *c == ',' || c.is_whitespace()))
        .collect::<String>()
        .trim()
        .to_string()
}

fn specs(doc: &Html) -> Vec<String> {
    let Some(sel) = selector(SPEC_SELECTOR) else {
        return Vec::new();
    };
    doc.select(&sel)
        .map(element_text)
        .filter(|text| !text.is_empty())
        .collect()
}

/// Product fields found in `application/ld+json` blocks.
#[derive(Debug, Default, PartialEq)]
pub struct StructuredData {
    pub title: Option<String>,
    pub price: Option<String>,
    pub currency: Option<String>,
}

impl StructuredData {
    pub fn from_document(doc: &Html) -> Self {
        let mut found = Self::default();
        let Some(sel) = selector(r#"script[type="application/ld+json"]"#) else {
            return found;
        };

        for script in doc.select(&sel) {
            let raw = script.text().collect::<String>();
            let json: Value = match serde_json::from_str(&raw) {
                Ok(v) => v,
                Err(e) => {
                    tracing::debug!("Skipping unparsable JSON-LD block: {}", e);
                    continue;
                }
            };
            if let Some(product) = find_product(&json) {
                found.merge(product);
            }
        }

        found
    }

    fn merge(&mut self, product: &Value) {
        let offer = match product.get("offers") {
            Some(Value::Array(items)) => items.first(),
            other => other,
        };

        self.title = self.title.take().or_else(|| scalar(product.get("name")));
        self.price = self
            .price
            .take()
            .or_else(|| scalar(offer.and_then(|o| o.get("price"))));
        self.currency = self
            .currency
            .take()
            .or_else(|| scalar(offer.and_then(|o| o.get("priceCurrency"))));
    }
}

fn find_product(json: &Value) -> Option<&Value> {
    match json {
        Value::Array(items) => items.iter().find_map(find_product),
        Value::Object(map) => {
            if is_product(map.get("@type")) {
                return Some(json);
            }
            map.get("@graph").and_then(find_product)
        }
        _ => None,
    }
}

fn is_product(ty: Option<&Value>) -> bool {
    match ty {
        Some(Value::String(s)) => s == "Product",
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("Product")),
        _ => false,
    }
}

fn scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

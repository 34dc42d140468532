//! Comparison view: filter, sort and table rendering.
//!
//! Filtering and sorting are independent, non-persisted transformations
//! applied to the full product list as read from the store.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Write as _;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::models::Product;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Numeric price, ascending. Unparsable prices last.
    Price,
    /// Title, case-insensitive.
    Title,
}

/// A view over the product list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewOptions {
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub sort: Option<SortOrder>,
}

impl ViewOptions {
    pub fn apply(&self, products: Vec<Product>) -> Vec<Product> {
        let mut out = match self.filter.as_deref() {
            Some(term) => filter(products, term),
            None => products,
        };
        if let Some(order) = self.sort {
            sort(&mut out, order);
        }
        out
    }
}

/// Case-insensitive substring match against the title or any spec.
pub fn matches(product: &Product, term: &str) -> bool {
    let needle = term.to_lowercase();
    product.title.to_lowercase().contains(&needle)
        || product
            .specs
            .iter()
            .any(|s| s.to_lowercase().contains(&needle))
}

pub fn filter(products: Vec<Product>, term: &str) -> Vec<Product> {
    if term.is_empty() {
        return products;
    }
    products.into_iter().filter(|p| matches(p, term)).collect()
}

/// Stable sort in place.
pub fn sort(products: &mut [Product], order: SortOrder) {
    match order {
        SortOrder::Price => products.sort_by(compare_price),
        SortOrder::Title => products.sort_by(compare_title),
    }
}

fn compare_price(a: &Product, b: &Product) -> Ordering {
    match (a.price_value(), b.price_value()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Accent- and case-folded sort key: `"Éclair"` collates as `"eclair"`.
fn collation_key(title: &str) -> String {
    title
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

fn compare_title(a: &Product, b: &Product) -> Ordering {
    collation_key(&a.title)
        .cmp(&collation_key(&b.title))
        .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
        .then_with(|| a.title.cmp(&b.title))
}

const EMPTY_STATE: &str = "No products added yet. Add one with `pcmp scrape <url>`.";

/// Plain-text comparison table.
pub fn render_table(products: &[Product]) -> String {
    if products.is_empty() {
        return format!("{}\n", EMPTY_STATE);
    }

    let headers = ["Product", "Price", "Specifications", "URL"];
    let rows: Vec<[String; 4]> = products
        .iter()
        .map(|p| {
            [
                format!("{} ({})", p.title, p.vendor),
                format!("{}{}", p.currency, p.price),
                p.specs.join("; "),
                p.url.clone(),
            ]
        })
        .collect();

    let mut widths = headers.map(|h| h.chars().count());
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    write_row(&mut out, &headers.map(String::from), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", rule.join("-+-"));
    for row in &rows {
        write_row(&mut out, row, &widths);
    }
    out
}

fn write_row(out: &mut String, cells: &[String; 4], widths: &[usize; 4]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths.iter())
        .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
        .collect();
    let _ = writeln!(out, "{}", padded.join(" | ").trim_end());
}

//! Main-content excerpt for the structured-extraction prompt.
//!
//! Picks the most likely product container, takes its rendered text and
//! bounds it so the outbound payload stays small.

use scraper::Html;

use crate::heuristics::{collapse_whitespace, first_element, truncate_chars, visible_text};

/// Product container guesses, highest priority first.
pub const MAIN_CONTENT_SELECTORS: &[&str] = &[
    "[data-product-details]",
    ".product-details",
    ".product-main",
    "main",
    "#main-content",
    ".main-content",
    "body",
];

/// Excerpt of the page's main content, at most `max_chars` characters.
///
/// Never fails: with no matching container the whole document is used.
pub fn main_content_excerpt(doc: &Html, max_chars: usize) -> String {
    let root = first_element(doc, MAIN_CONTENT_SELECTORS).unwrap_or_else(|| doc.root_element());
    let text = collapse_whitespace(&visible_text(root));
    truncate_chars(&text, max_chars)
}

//! Page retrieval and page-level attributes used in record assembly.

use scraper::{ElementRef, Html};
use std::time::Duration;
use url::Url;

use crate::config::FetchConfig;
use crate::error::ScrapeError;
use crate::heuristics::{first_match, selector, Rule};

/// Product image guesses, highest priority first.
pub const IMAGE_RULES: &[Rule] = &[
    Rule::new("[data-main-image]", image_source),
    Rule::new(".product-image img", image_source),
    Rule::new("#main-product-image", image_source),
    Rule::new(".gallery-image", image_source),
    Rule::new(r#"img[itemprop="image"]"#, image_source),
];

fn image_source(el: ElementRef<'_>) -> Option<String> {
    let value = el.value();
    value
        .attr("src")
        .filter(|s| !s.trim().is_empty())
        .or_else(|| value.attr("data-src"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse a page URL, requiring a scheme and host.
pub fn parse_page_url(raw: &str) -> Result<Url, ScrapeError> {
    let url = Url::parse(raw.trim()).map_err(|e| ScrapeError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.host_str().is_none() {
        return Err(ScrapeError::InvalidUrl {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(url)
}

/// Key a product is stored under: the normalized URL when `raw` parses,
/// otherwise the trimmed input.
pub fn canonical_url(raw: &str) -> String {
    parse_page_url(raw)
        .map(|url| url.to_string())
        .unwrap_or_else(|_| raw.trim().to_string())
}

/// The hostname a product is sold from.
pub fn vendor(url: &Url) -> String {
    url.host_str().unwrap_or_default().to_string()
}

/// Best-effort product image, resolved against the page URL.
///
/// Tries [`IMAGE_RULES`] first, then the `<img>` with the largest declared
/// `width × height`.
pub fn find_product_image(doc: &Html, base: &Url) -> Option<String> {
    let src = first_match(doc, IMAGE_RULES).or_else(|| largest_image(doc))?;
    Some(
        base.join(&src)
            .map(|u| u.to_string())
            .unwrap_or(src),
    )
}

fn largest_image(doc: &Html) -> Option<String> {
    let sel = selector("img")?;
    let mut best: Option<(u64, String)> = None;

    for img in doc.select(&sel) {
        let area = dimension(img, "width").saturating_mul(dimension(img, "height"));
        if area == 0 {
            continue;
        }
        let Some(src) = img.value().attr("src").filter(|s| !s.trim().is_empty()) else {
            continue;
        };
        if best.as_ref().map_or(true, |(a, _)| area > *a) {
            best = Some((area, src.trim().to_string()));
        }
    }

    best.map(|(_, src)| src)
}

/// Declared sizes above this are clamped.
const MAX_DIMENSION: f64 = 1_000_000.0;

fn dimension(img: ElementRef<'_>, attr: &str) -> u64 {
    img.value()
        .attr(attr)
        .map(|v| v.trim().trim_end_matches("px"))
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 1.0)
        .map(|v| v.min(MAX_DIMENSION) as u64)
        .unwrap_or(0)
}

/// Fetches product pages over HTTP(S).
pub struct PageFetcher {
    http: reqwest::Client,
}

impl PageFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, ScrapeError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ScrapeError::Fetch {
                url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self { http })
    }

    /// Download the page body. Non-success statuses are errors.
    pub async fn fetch(&self, url: &Url) -> Result<String, ScrapeError> {
        let fetch_err = |e: reqwest::Error| ScrapeError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self.http.get(url.clone()).send().await.map_err(fetch_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::PageStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(fetch_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://shop.test/items/42").unwrap()
    }

    #[test]
    fn prioritized_image_is_resolved() {
        let doc = Html::parse_document(
            r#"<img src="/big.png" width="2000" height="2000">
               <div class="product-image"><img src="thumb.jpg"></div>"#,
        );
        assert_eq!(
            find_product_image(&doc, &base()).as_deref(),
            Some("https://shop.test/items/thumb.jpg")
        );
    }

    #[test]
    fn data_src_is_used_when_src_missing() {
        let doc = Html::parse_document(r#"<img itemprop="image" data-src="https://cdn.test/a.jpg">"#);
        assert_eq!(
            find_product_image(&doc, &base()).as_deref(),
            Some("https://cdn.test/a.jpg")
        );
    }

    #[test]
    fn largest_image_wins_without_markers() {
        let doc = Html::parse_document(
            r#"<img src="/logo.png" width="100" height="40">
               <img src="/hero.png" width="800px" height="600">
               <img src="/unsized.png">"#,
        );
        assert_eq!(
            find_product_image(&doc, &base()).as_deref(),
            Some("https://shop.test/hero.png")
        );
    }

    #[test]
    fn oversized_dimensions_do_not_overflow() {
        let doc = Html::parse_document(
            r#"<img src="/huge.png" width="99999999999" height="99999999999">
               <img src="/exp.png" width="1e300" height="1e300">
               <img src="/small.png" width="10" height="10">"#,
        );
        assert_eq!(
            find_product_image(&doc, &base()).as_deref(),
            Some("https://shop.test/huge.png")
        );
    }

    #[test]
    fn no_images_yields_none() {
        let doc = Html::parse_document("<p>text only</p>");
        assert_eq!(find_product_image(&doc, &base()), None);
    }

    #[test]
    fn vendor_is_hostname() {
        assert_eq!(vendor(&base()), "shop.test");
    }

    #[test]
    fn canonical_url_normalizes_host_and_path() {
        assert_eq!(canonical_url("https://Shop.test"), "https://shop.test/");
        assert_eq!(canonical_url(" https://shop.test/p?id=1 "), "https://shop.test/p?id=1");
        assert_eq!(canonical_url(" not a url "), "not a url");
    }

    #[test]
    fn urls_need_a_host() {
        assert!(parse_page_url("not a url").is_err());
        assert!(parse_page_url("mailto:someone@example.com").is_err());
        assert!(parse_page_url("http://a.test").is_ok());
    }
}

//! Data-driven selector heuristics.
//!
//! A heuristic is an ordered list of [`Rule`]s. Each rule pairs a CSS
//! selector with an extraction function; [`first_match`] evaluates the rules
//! in priority order and returns the first value any element yields. New
//! guesses are added by extending a rule table, not by touching control flow.

use scraper::{ElementRef, Html, Selector};

/// Elements whose text is never rendered.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Elements rendered inside the surrounding line.
const INLINE_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "cite", "code", "data", "del", "dfn", "em", "font", "i",
    "ins", "kbd", "label", "mark", "q", "s", "samp", "small", "span", "strong", "sub", "sup",
    "time", "u", "var",
];

/// Pulls a value out of a matched element. `None` means "keep looking".
pub type ExtractFn = fn(ElementRef<'_>) -> Option<String>;

/// One `(selector, extraction)` pair.
#[derive(Clone, Copy)]
pub struct Rule {
    pub selector: &'static str,
    pub extract: ExtractFn,
}

impl Rule {
    pub const fn new(selector: &'static str, extract: ExtractFn) -> Self {
        Self { selector, extract }
    }

    /// Rule that yields the element's non-empty text content.
    pub const fn text(selector: &'static str) -> Self {
        Self::new(selector, non_empty_text)
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("selector", &self.selector).finish()
    }
}

/// Parse a selector, logging and skipping invalid ones.
pub fn selector(source: &str) -> Option<Selector> {
    match Selector::parse(source) {
        Ok(sel) => Some(sel),
        Err(e) => {
            tracing::warn!("Failed to compile selector '{}': {}", source, e);
            None
        }
    }
}

/// Evaluate `rules` against the whole document, first match wins.
pub fn first_match(doc: &Html, rules: &[Rule]) -> Option<String> {
    first_match_in(doc.root_element(), rules)
}

/// Evaluate `rules` below `root`, first match wins.
pub fn first_match_in(root: ElementRef<'_>, rules: &[Rule]) -> Option<String> {
    rules.iter().find_map(|rule| {
        let sel = selector(rule.selector)?;
        root.select(&sel).find_map(rule.extract)
    })
}

/// First element matching any selector in `selectors`, in priority order.
pub fn first_element<'a>(doc: &'a Html, selectors: &[&str]) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|source| {
        let sel = selector(source)?;
        doc.select(&sel).next()
    })
}

/// Replace every run of whitespace with a single space and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text content of an element, whitespace collapsed.
pub fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

/// Rendered text of an element, approximating `innerText`: hidden
/// elements are skipped, inline elements join their neighbours directly
/// and every other element is separated by a space. Whitespace collapsed.
pub fn visible_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_visible_text(el, &mut out);
    collapse_whitespace(&out)
}

fn push_visible_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            continue;
        }
        let Some(child) = ElementRef::wrap(child) else {
            continue;
        };
        let name = child.value().name();
        if HIDDEN_ELEMENTS.contains(&name) {
            continue;
        }
        let inline = INLINE_ELEMENTS.contains(&name);
        if !inline {
            out.push(' ');
        }
        push_visible_text(child, out);
        if !inline {
            out.push(' ');
        }
    }
}

/// Truncate to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

fn non_empty_text(el: ElementRef<'_>) -> Option<String> {
    let text = element_text(el);
    (!text.is_empty()).then_some(text)
}

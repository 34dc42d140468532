//! # product-compare
//!
//! Scrape product pages into structured records, keep them in a local
//! store and compare them side by side.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────┐   ┌──────────┐
//! │   Page   │──▶│   Excerpt    │──▶│   Model   │──▶│  Store   │
//! │  fetch   │   │ (heuristics) │   │  client   │   │  (JSON)  │
//! └──────────┘   └──────────────┘   └─────┬─────┘   └────┬─────┘
//!                                         │ failure      │
//!                                         ▼              ▼
//!                                   ┌──────────┐   ┌──────────┐
//!                                   │ Fallback │   │ Compare  │
//!                                   │ selectors│   │ CSV/HTTP │
//!                                   └──────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pcmp init
//! pcmp settings set-key "$GEMINI_API_KEY"
//! pcmp scrape https://shop.example/products/phone
//! pcmp list --filter ram --sort price
//! pcmp export --output product-comparison.csv
//! pcmp serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Product and settings records |
//! | [`heuristics`] | Data-driven selector rules |
//! | [`content`] | Main-content excerpt |
//! | [`llm`] | Structured extraction client |
//! | [`fallback`] | Selector-based extraction |
//! | [`page`] | Page fetch, image and vendor |
//! | [`scrape`] | Scrape state machine |
//! | [`store`] | Product store and settings |
//! | [`compare`] | Filter, sort, table |
//! | [`export`] | CSV export |
//! | [`protocol`] | Typed requests and the service dispatcher |
//! | [`server`] | HTTP API |

pub mod compare;
pub mod config;
pub mod content;
pub mod error;
pub mod export;
pub mod fallback;
pub mod heuristics;
pub mod llm;
pub mod models;
pub mod page;
pub mod protocol;
pub mod scrape;
pub mod server;
pub mod store;

//! # product-compare CLI (`pcmp`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pcmp init` | Create the store with empty products and settings |
//! | `pcmp scrape <url>` | Scrape a product page and save it |
//! | `pcmp list` | Show the comparison table |
//! | `pcmp remove <url>` | Delete a saved product |
//! | `pcmp export` | Write the comparison as CSV |
//! | `pcmp settings set-key <key>` | Save the model API key |
//! | `pcmp serve` | Start the local HTTP API |
//!
//! Logs go to stderr and honor `RUST_LOG` (default `info`).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use product_compare::compare::{render_table, SortOrder, ViewOptions};
use product_compare::config::{self, Config};
use product_compare::export;
use product_compare::models::Settings;
use product_compare::page::PageFetcher;
use product_compare::protocol::{ExtractorSource, Service};
use product_compare::scrape::{Provenance, Scraper};
use product_compare::server;
use product_compare::store::{Storage, UpsertKind};

/// Scrape product pages and compare them side by side.
#[derive(Parser)]
#[command(name = "pcmp", version, about)]
struct Cli {
    /// Path to configuration file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = "./config/pcmp.toml")]
    config: PathBuf,

    /// Override the store file from config.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store with empty values. Existing data is kept.
    Init,

    /// Scrape a product page and save the result.
    Scrape {
        /// Product page URL. Also the key the product is saved under.
        url: String,

        /// Read the page source from this file instead of fetching `url`.
        #[arg(long)]
        html: Option<PathBuf>,
    },

    /// Show saved products as a comparison table.
    List {
        /// Case-insensitive substring matched against titles and specs.
        #[arg(long)]
        filter: Option<String>,

        #[arg(long, value_enum)]
        sort: Option<SortOrder>,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Remove a saved product by URL.
    Remove { url: String },

    /// Export the comparison as CSV.
    Export {
        #[arg(long)]
        filter: Option<String>,

        #[arg(long, value_enum)]
        sort: Option<SortOrder>,

        /// Output file. Writes to stdout when omitted.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Manage settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Start the local HTTP API.
    Serve {
        /// Override `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Save the model API key (replaces all settings).
    SetKey { key: String },
    /// Show current settings with the key masked.
    Show,
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

fn build_service(cfg: &Config, storage: Arc<Storage>) -> Result<Service> {
    let fetcher = PageFetcher::new(&cfg.fetch)?;
    let scraper = Scraper::new(fetcher, cfg.llm.max_excerpt_chars);
    Ok(Service::new(
        storage,
        scraper,
        ExtractorSource::Configured(cfg.llm.clone()),
    ))
}

fn mask(key: &str) -> String {
    let count = key.chars().count();
    if count == 0 {
        return "(not set)".to_string();
    }
    let tail: String = key.chars().skip(count.saturating_sub(4)).collect();
    format!("{}{}", "*".repeat(count.saturating_sub(4)), tail)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;
    let store_path = cli.store.clone().unwrap_or_else(|| cfg.store.path.clone());
    let storage = Arc::new(Storage::open(&store_path));

    match cli.command {
        Commands::Init => {
            storage.initialize().await?;
            println!("Store initialized at {}", store_path.display());
        }
        Commands::Scrape { url, html } => {
            let html = match html {
                Some(path) => Some(
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?,
                ),
                None => None,
            };
            let service = build_service(&cfg, storage)?;
            let (product, provenance, kind) =
                service.scrape_and_save(&url, html.as_deref()).await?;

            match kind {
                UpsertKind::Inserted => println!("Product added successfully!"),
                UpsertKind::Updated => println!("Product updated successfully!"),
            }
            println!("title:    {}", product.title);
            println!("price:    {}{}", product.currency, product.price);
            println!("vendor:   {}", product.vendor);
            println!("specs:    {}", product.specs.len());
            if let Some(ref image) = product.image {
                println!("image:    {}", image);
            }
            match provenance {
                Provenance::Model => println!("source:   model"),
                Provenance::Fallback { reason, .. } => {
                    println!("source:   fallback ({})", reason)
                }
            }
        }
        Commands::List { filter, sort, json } => {
            let products = ViewOptions { filter, sort }.apply(storage.list().await?);
            if json {
                println!("{}", serde_json::to_string_pretty(&products)?);
            } else {
                print!("{}", render_table(&products));
            }
        }
        Commands::Remove { url } => {
            if storage.remove(&url).await? {
                println!("Product removed successfully");
            } else {
                println!("No product saved for {}", url);
            }
        }
        Commands::Export {
            filter,
            sort,
            output,
        } => {
            let products = ViewOptions { filter, sort }.apply(storage.list().await?);
            export::run_export(&products, output.as_deref())?;
        }
        Commands::Settings { action } => match action {
            SettingsAction::SetKey { key } => {
                storage
                    .save_settings(&Settings {
                        api_key: key.trim().to_string(),
                    })
                    .await?;
                println!("Settings saved successfully!");
            }
            SettingsAction::Show => {
                let settings = storage.settings().await?;
                println!("store:    {}", store_path.display());
                println!("apiKey:   {}", mask(&settings.api_key));
            }
        },
        Commands::Serve { bind } => {
            storage.initialize().await?;
            let bind = bind.unwrap_or_else(|| cfg.server.bind.clone());
            let service = Arc::new(build_service(&cfg, storage)?);
            server::run_server(&bind, service).await?;
        }
    }

    Ok(())
}

//! CSV export of the comparison view.
//!
//! Every field is double-quoted. Embedded quotes are doubled, so titles
//! containing `"` still produce a well-formed file.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use crate::models::Product;

pub const HEADER: [&str; 6] = ["Title", "Price", "Currency", "Specifications", "URL", "Vendor"];
pub const DEFAULT_FILE_NAME: &str = "product-comparison.csv";

/// Write `products` as CSV to any writer.
pub fn write_csv<W: Write>(writer: W, products: &[Product]) -> csv::Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    wtr.write_record(HEADER)?;
    for p in products {
        let specs = p.specs.join("; ");
        wtr.write_record([
            p.title.as_str(),
            p.price.as_str(),
            p.currency.as_str(),
            specs.as_str(),
            p.url.as_str(),
            p.vendor.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// CSV as a string.
pub fn to_csv_string(products: &[Product]) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(&mut buf, products)?;
    Ok(String::from_utf8(buf)?)
}

/// Export to `output`, or stdout when `None`.
pub fn run_export(products: &[Product], output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_csv(file, products)?;
            eprintln!("Exported {} products to {}", products.len(), path.display());
        }
        None => {
            let stdout = std::io::stdout();
            write_csv(stdout.lock(), products)?;
        }
    }
    Ok(())
}

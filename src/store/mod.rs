//! Persistence for products and settings.
//!
//! A [`Backend`] holds named JSON values and is only ever read or written
//! wholesale. [`Storage`] is the service object handed to the CLI, the
//! protocol dispatcher and the server; it owns the backend and implements
//! the product and settings operations on top of two values:
//!
//! | Key | Value |
//! |-----|-------|
//! | `products` | list of [`Product`] in insertion order |
//! | `settings` | [`Settings`] |
//!
//! Every operation is a full read-modify-write of one value. Writers are
//! serialized by an async mutex so concurrent HTTP requests keep
//! single-writer semantics.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::models::{Product, Settings};
use crate::page::canonical_url;

pub use file::FileBackend;
pub use memory::MemoryBackend;

pub const PRODUCTS_KEY: &str = "products";
pub const SETTINGS_KEY: &str = "settings";

/// Key-value persistence of whole JSON values.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Read a named value. `None` when it was never written.
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Replace a named value.
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;
}

/// Whether an upsert created a record or replaced one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertKind {
    Inserted,
    Updated,
}

/// Product and settings operations over a [`Backend`].
pub struct Storage {
    backend: Arc<dyn Backend>,
    write_lock: Mutex<()>,
}

impl Storage {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
        }
    }

    /// Storage backed by a JSON file at `path`.
    pub fn open(path: impl Into<std::path::PathBuf>) -> Self {
        Self::new(Arc::new(FileBackend::new(path)))
    }

    /// In-process storage, nothing persisted.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Create empty `products` and `settings` values where missing.
    ///
    /// Existing values are left untouched, so running it twice is safe.
    pub async fn initialize(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;

        if self.backend.get(PRODUCTS_KEY).await?.is_none() {
            self.backend
                .set(PRODUCTS_KEY, Value::Array(Vec::new()))
                .await?;
        }
        if self.backend.get(SETTINGS_KEY).await?.is_none() {
            self.backend
                .set(SETTINGS_KEY, serde_json::to_value(Settings::default())?)
                .await?;
        }
        Ok(())
    }

    /// All products in insertion order.
    pub async fn list(&self) -> Result<Vec<Product>, StorageError> {
        self.read_products().await
    }

    /// Insert a product, or replace the one with the same `url` in place.
    ///
    /// The URL is stored in its normalized form (see [`canonical_url`]).
    ///
    /// Inserts stamp `addedAt`. Replacements stamp `updatedAt` and keep the
    /// original `addedAt`.
    pub async fn upsert(&self, mut product: Product) -> Result<UpsertKind, StorageError> {
        product.url = canonical_url(&product.url);
        let _guard = self.write_lock.lock().await;
        let mut products = self.read_products().await?;
        let now = Utc::now();

        let kind = match products.iter().position(|p| p.url == product.url) {
            Some(idx) => {
                product.added_at = products[idx].added_at;
                product.updated_at = Some(now);
                products[idx] = product;
                UpsertKind::Updated
            }
            None => {
                product.added_at = Some(now);
                product.updated_at = None;
                products.push(product);
                UpsertKind::Inserted
            }
        };

        self.write_products(&products).await?;
        tracing::info!(count = products.len(), ?kind, "product saved");
        Ok(kind)
    }

    /// Delete the product with `url`, compared in normalized form.
    /// Returns whether one was removed.
    pub async fn remove(&self, url: &str) -> Result<bool, StorageError> {
        let key = canonical_url(url);
        let _guard = self.write_lock.lock().await;
        let mut products = self.read_products().await?;
        let before = products.len();
        products.retain(|p| p.url != key);
        let removed = products.len() != before;

        self.write_products(&products).await?;
        if removed {
            tracing::info!(url = %key, "product removed");
        }
        Ok(removed)
    }

    /// Current settings, defaults when never saved.
    pub async fn settings(&self) -> Result<Settings, StorageError> {
        match self.backend.get(SETTINGS_KEY).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Settings::default()),
        }
    }

    /// Overwrite settings wholesale.
    pub async fn save_settings(&self, settings: &Settings) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        self.backend
            .set(SETTINGS_KEY, serde_json::to_value(settings)?)
            .await
    }

    async fn read_products(&self) -> Result<Vec<Product>, StorageError> {
        match self.backend.get(PRODUCTS_KEY).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    async fn write_products(&self, products: &[Product]) -> Result<(), StorageError> {
        self.backend
            .set(PRODUCTS_KEY, serde_json::to_value(products)?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(url: &str, title: &str) -> Product {
        Product {
            url: url.to_string(),
            title: title.to_string(),
            price: "10".to_string(),
            currency: "$".to_string(),
            specs: vec![],
            image: None,
            vendor: "a.test".to_string(),
            scraped_at: None,
            added_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn upsert_same_url_replaces_in_place() {
        let store = Storage::in_memory();
        assert_eq!(
            store.upsert(product("http://a.test/1", "One")).await.unwrap(),
            UpsertKind::Inserted
        );
        store.upsert(product("http://a.test/2", "Two")).await.unwrap();
        let added = store.list().await.unwrap()[0].added_at;

        assert_eq!(
            store.upsert(product("http://a.test/1", "One v2")).await.unwrap(),
            UpsertKind::Updated
        );

        let list = store.list().await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].title, "One v2");
        assert_eq!(list[0].added_at, added);
        assert!(list[0].updated_at.is_some());
        assert_eq!(list[1].title, "Two");
        assert!(list[1].updated_at.is_none());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let store = Storage::in_memory();
        store.upsert(product("http://a.test/1", "One")).await.unwrap();
        store.upsert(product("http://a.test/2", "Two")).await.unwrap();

        assert!(store.remove("http://a.test/1").await.unwrap());
        let once = store.list().await.unwrap();
        assert!(!store.remove("http://a.test/1").await.unwrap());
        let twice = store.list().await.unwrap();
        assert_eq!(once, twice);
        assert_eq!(twice.len(), 1);
    }

    #[tokio::test]
    async fn url_key_is_normalized_for_upsert_and_remove() {
        let store = Storage::in_memory();
        store.upsert(product("https://Shop.test", "One")).await.unwrap();
        assert_eq!(store.list().await.unwrap()[0].url, "https://shop.test/");

        assert_eq!(
            store.upsert(product("https://shop.test/", "One v2")).await.unwrap(),
            UpsertKind::Updated
        );
        assert!(store.remove("https://SHOP.test").await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn settings_round_trip_and_default() {
        let store = Storage::in_memory();
        assert_eq!(store.settings().await.unwrap().api_key, "");

        store
            .save_settings(&Settings {
                api_key: "k-123".into(),
            })
            .await
            .unwrap();
        assert_eq!(store.settings().await.unwrap().api_key, "k-123");
    }

    #[tokio::test]
    async fn initialize_keeps_existing_values() {
        let store = Storage::in_memory();
        store.initialize().await.unwrap();
        assert!(store.list().await.unwrap().is_empty());

        store.upsert(product("http://a.test/1", "One")).await.unwrap();
        store.initialize().await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}

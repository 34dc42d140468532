//! JSON-file [`Backend`].
//!
//! All named values live in one JSON object on disk. Writes go to a
//! sibling temp file which is then renamed over the original, so a crash
//! mid-write leaves the previous contents intact.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::PathBuf;

use super::Backend;
use crate::error::StorageError;

pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_all(&self) -> Result<Map<String, Value>, StorageError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn write_all(&self, values: &Map<String, Value>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(values)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Backend for FileBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let mut values = self.read_all().await?;
        Ok(values.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut values = self.read_all().await?;
        values.insert(key.to_string(), value);
        self.write_all(&values).await
    }
}

//! Trait for the transport that hands out JSON documents by path.

use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;

/// Abstraction over wherever the static data documents live (a web server,
/// a local directory, a test fixture).
///
/// `path` is relative to the source's root, e.g. `"bls-data.json"` or
/// `"bls-data-us-2024-3.json"`. Network, HTTP status and JSON decoding
/// failures all surface as `Err`.
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch_json(&self, path: &str) -> Result<Value>;

    /// Human-readable location for log lines.
    fn describe(&self) -> String;
}

#[async_trait::async_trait]
impl<S: DataSource + ?Sized> DataSource for Arc<S> {
    async fn fetch_json(&self, path: &str) -> Result<Value> {
        (**self).fetch_json(path).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

//! Concrete [`DataSource`](crate::services::DataSource) implementations.

mod file_source;
mod http_source;

pub use file_source::FileDataSource;
pub use http_source::HttpDataSource;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::fetch::BasicClient;
use crate::services::DataSource;

/// Picks an HTTP source for `http(s)://` locations and a directory source
/// otherwise.
pub fn open_source(location: &str, timeout: Duration) -> Result<Arc<dyn DataSource>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        let client = BasicClient::with_timeout(timeout)?;
        Ok(Arc::new(HttpDataSource::new(location, client)))
    } else {
        Ok(Arc::new(FileDataSource::new(location)))
    }
}

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::fetch::{HttpClient, fetch_json};
use crate::services::DataSource;

/// Serves documents from a static file host, e.g. `https://host/data`.
pub struct HttpDataSource<C> {
    base_url: String,
    client: C,
}

impl<C: HttpClient> HttpDataSource<C> {
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl<C: HttpClient> DataSource for HttpDataSource<C> {
    #[tracing::instrument(skip(self), fields(base = %self.base_url))]
    async fn fetch_json(&self, path: &str) -> Result<Value> {
        let url = self.url_for(path);
        debug!(%url, "Fetching document");
        fetch_json(&self.client, &url).await
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::BasicClient;

    #[test]
    fn test_url_join_handles_slashes() {
        let source = HttpDataSource::new("https://example.org/data/", BasicClient::new());
        assert_eq!(
            source.url_for("/bls-data.json"),
            "https://example.org/data/bls-data.json"
        );
        assert_eq!(source.describe(), "https://example.org/data");
    }
}

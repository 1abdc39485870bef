use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::services::DataSource;

/// Reads documents from a local directory, such as an export pipeline's
/// `public/data` output.
pub struct FileDataSource {
    root: PathBuf,
}

impl FileDataSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DataSource for FileDataSource {
    async fn fetch_json(&self, path: &str) -> Result<Value> {
        let full = self.root.join(path.trim_start_matches('/'));
        let bytes = tokio::fs::read(&full)
            .await
            .with_context(|| format!("failed to read {}", full.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("{} is not valid JSON", full.display()))
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_reads_json_document() {
        let dir = temp_dir("soc_atlas_file_source_ok");
        fs::write(dir.join("doc.json"), r#"{"datasets": []}"#).unwrap();

        let source = FileDataSource::new(&dir);
        let value = source.fetch_json("doc.json").await.unwrap();
        assert!(value["datasets"].is_array());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_missing_and_invalid_files_fail() {
        let dir = temp_dir("soc_atlas_file_source_err");
        fs::write(dir.join("broken.json"), "{not json").unwrap();

        let source = FileDataSource::new(&dir);
        assert!(source.fetch_json("absent.json").await.is_err());
        assert!(source.fetch_json("broken.json").await.is_err());

        fs::remove_dir_all(&dir).unwrap();
    }
}

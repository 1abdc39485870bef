//! Runtime configuration read from the environment (and `.env` via dotenvy).
//!
//! | Variable                  | Default          |
//! |---------------------------|------------------|
//! | `SOC_DATA_BASE`           | `public/data`    |
//! | `SOC_CATALOG_FILE`        | `bls-data.json`  |
//! | `SOC_FETCH_TIMEOUT_SECS`  | `30`             |
//! | `SOC_PARENT_FALLBACK`     | `legacy`         |

use std::time::Duration;

use anyhow::{Context, Result};

use crate::hierarchy::ParentFallback;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// URL or directory holding the data documents.
    pub data_base: String,
    pub catalog_file: String,
    pub fetch_timeout: Duration,
    pub parent_fallback: ParentFallback,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_base: "public/data".to_string(),
            catalog_file: "bls-data.json".to_string(),
            fetch_timeout: Duration::from_secs(30),
            parent_fallback: ParentFallback::Legacy,
        }
    }
}

impl Config {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup; unset keys keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(base) = lookup("SOC_DATA_BASE") {
            config.data_base = base;
        }
        if let Some(file) = lookup("SOC_CATALOG_FILE") {
            config.catalog_file = file;
        }
        if let Some(secs) = lookup("SOC_FETCH_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("SOC_FETCH_TIMEOUT_SECS must be an integer, got '{secs}'"))?;
            config.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(policy) = lookup("SOC_PARENT_FALLBACK") {
            config.parent_fallback = policy.parse().context("invalid SOC_PARENT_FALLBACK")?;
        }

        Ok(config)
    }
}

//! Output formatting and persistence for computed views.
//!
//! Supports pretty-printing, JSON serialization, and CSV append.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::analyzers::composition::Composition;
use crate::types::Year;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// One flattened composition cell as written to CSV.
#[derive(Debug, Clone, Serialize)]
pub struct CompositionRecord {
    pub timestamp: DateTime<Utc>,
    pub region_id: String,
    pub year: Year,
    pub soc_code: String,
    pub name: Option<String>,
    pub top_group_id: String,
    pub value: f64,
    pub share: f64,
    pub residual: bool,
}

/// Flattens `composition` into rows stamped with `timestamp`.
pub fn composition_records(
    region_id: &str,
    year: Year,
    composition: &Composition,
    timestamp: DateTime<Utc>,
) -> Vec<CompositionRecord> {
    composition
        .cells
        .iter()
        .map(|cell| CompositionRecord {
            timestamp,
            region_id: region_id.to_string(),
            year,
            soc_code: cell.code.to_string(),
            name: cell.name.clone(),
            top_group_id: cell.top_group_id.clone(),
            value: cell.value,
            share: composition.share(cell),
            residual: cell.residual,
        })
        .collect()
}

/// Logs a value using Rust's debug pretty-print format.
pub fn print_pretty<T: std::fmt::Debug>(value: &T) {
    debug!("{:#?}", value);
}

/// Logs a value as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes a value as pretty-printed JSON to `path`, replacing the file.
pub fn write_json<T: Serialize>(path: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {path}"))?;
    debug!(path, "JSON written");
    Ok(())
}

/// Appends records as rows to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_records<T: Serialize>(path: &str, records: &[T]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = records.len(), "Appending CSV records");

    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("failed to open {path}"))?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::composition::CompositionCell;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    fn composition() -> Composition {
        let cell = |code: &str, value: f64, residual: bool| CompositionCell {
            code: code.parse().unwrap(),
            name: Some(format!("Occupation {code}")),
            top_group_id: "11".to_string(),
            value,
            employ: value,
            gdp: 0.0,
            a_mean: None,
            residual,
        };
        Composition {
            cells: vec![cell("11-1000", 60.0, true), cell("11-1010", 40.0, false)],
            total: 100.0,
        }
    }

    fn records() -> Vec<CompositionRecord> {
        composition_records("national-us", 2024, &composition(), Utc::now())
    }

    #[test]
    fn test_records_carry_share() {
        let records = records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].soc_code, "11-1000");
        assert_eq!(records[0].share, 60.0);
        assert!(records[0].residual);
        assert_eq!(records[1].share, 40.0);
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_pretty(&composition());
        print_json(&composition()).unwrap();
    }

    #[test]
    fn test_write_json() {
        let path = temp_path("soc_atlas_test_composition.json");
        write_json(&path, &composition()).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["total"], 100.0);
        assert_eq!(value["cells"][1]["code"], "11-1010");

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_records_writes_header_once() {
        let path = temp_path("soc_atlas_test_header.csv");
        let _ = fs::remove_file(&path);

        append_records(&path, &records()).unwrap();
        append_records(&path, &records()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header_count = content.lines().filter(|l| l.contains("timestamp")).count();
        assert_eq!(header_count, 1);
        // 1 header + 2 rows per append
        assert_eq!(content.lines().count(), 5);

        fs::remove_file(&path).unwrap();
    }
}

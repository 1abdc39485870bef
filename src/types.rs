//! Data types for the static BLS occupation documents.
//!
//! Field names follow the camelCase JSON produced by the export pipeline
//! (`socCode`, `totEmp`, `regionData`, ...).

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::hierarchy::SocCode;

/// Calendar year used as the inner key of region data and aggregates.
pub type Year = u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RegionType {
    National,
    State,
    Metro,
}

impl RegionType {
    pub fn label(&self) -> &'static str {
        match self {
            RegionType::National => "National",
            RegionType::State => "States",
            RegionType::Metro => "Metropolitan Areas",
        }
    }
}

impl fmt::Display for RegionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub region_id: String,
    pub name: String,
    pub region_type: RegionType,
}

/// Classification record for a single SOC code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occupation {
    pub soc_code: SocCode,
    #[serde(default)]
    pub name: Option<String>,
    /// Stored level; must agree with [`SocCode::level`] when present.
    #[serde(default)]
    pub level: Option<u8>,
    pub major_group_id: String,
    #[serde(default)]
    pub major_group_name: Option<String>,
}

impl Occupation {
    pub fn level(&self) -> u8 {
        self.soc_code.level()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MajorGroup {
    pub group_id: String,
    pub name: String,
    #[serde(default = "default_group_color")]
    pub color: String,
}

fn default_group_color() -> String {
    "#999999".to_string()
}

/// One observation: the value at a code for one region and one year.
///
/// Metrics are optional in the source data; absent values count as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionOccupation {
    pub soc_code: SocCode,
    #[serde(default)]
    pub tot_emp: Option<f64>,
    #[serde(default)]
    pub gdp: Option<f64>,
    #[serde(default)]
    pub a_mean: Option<f64>,
    #[serde(default)]
    pub complexity: Option<f64>,
}

impl RegionOccupation {
    pub fn employ(&self) -> f64 {
        self.tot_emp.unwrap_or(0.0)
    }

    pub fn gdp(&self) -> f64 {
        self.gdp.unwrap_or(0.0)
    }
}

/// region id -> year -> observations
pub type RegionData = BTreeMap<String, BTreeMap<Year, Vec<RegionOccupation>>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateOccupation {
    #[serde(default)]
    pub total_employ: f64,
    #[serde(default)]
    pub avg_wage: f64,
    #[serde(default)]
    pub avg_complexity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinMaxStats {
    pub min_wage: f64,
    pub max_wage: f64,
    pub median_wage: f64,
    pub min_complexity: f64,
    pub max_complexity: f64,
    pub median_complexity: f64,
}

/// Per-year summary shipped alongside the observations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearAggregates {
    pub by_occupation: BTreeMap<SocCode, AggregateOccupation>,
    #[serde(default)]
    pub min_max_stats: MinMaxStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default)]
    pub last_updated: Option<NaiveDate>,
    #[serde(default)]
    pub years: Vec<Year>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Every record currently held in memory: the main file plus merged level
/// extensions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub regions: Vec<Region>,
    #[serde(default)]
    pub occupations: Vec<Occupation>,
    #[serde(default)]
    pub major_groups: Vec<MajorGroup>,
    #[serde(default)]
    pub region_data: RegionData,
    #[serde(default)]
    pub aggregates: BTreeMap<Year, YearAggregates>,
}

impl Dataset {
    pub fn occupation(&self, code: &SocCode) -> Option<&Occupation> {
        self.occupations.iter().find(|o| &o.soc_code == code)
    }

    pub fn region(&self, region_id: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.region_id == region_id)
    }

    pub fn observations(&self, region_id: &str, year: Year) -> Option<&[RegionOccupation]> {
        self.region_data
            .get(region_id)
            .and_then(|years| years.get(&year))
            .map(Vec::as_slice)
    }
}

/// One entry of the catalog's `datasets` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetEntry {
    pub country: String,
    pub year: Year,
    pub file: String,
    #[serde(default)]
    pub levels: Vec<u8>,
}

impl DatasetEntry {
    /// Key into [`Catalog::level_files`], e.g. `"us-2024"`.
    pub fn key(&self) -> String {
        format!("{}-{}", self.country, self.year)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub code: String,
    pub name: String,
}

/// The meta catalog (`bls-data.json`) listing available partitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    #[serde(default)]
    pub datasets: Vec<DatasetEntry>,
    /// `"<country>-<year>"` -> level key (`"3"`, `"3-metro"`) -> file name
    #[serde(default)]
    pub level_files: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    pub countries: Vec<Country>,
    #[serde(default)]
    pub years: Vec<Year>,
    #[serde(default)]
    pub last_updated: Option<NaiveDate>,
}

impl Catalog {
    pub fn default_dataset(&self) -> Option<&DatasetEntry> {
        self.datasets.first()
    }

    /// File name registered for `level_key` under the default dataset.
    pub fn level_file(&self, level_key: &str) -> Option<&str> {
        let dataset = self.default_dataset()?;
        self.level_files
            .get(&dataset.key())
            .and_then(|files| files.get(level_key))
            .map(String::as_str)
    }

    /// Highest level reachable from the default dataset; 6 when unknown.
    pub fn max_digit_level(&self) -> u8 {
        let Some(dataset) = self.default_dataset() else {
            return 6;
        };
        let numeric_keys = self
            .level_files
            .get(&dataset.key())
            .into_iter()
            .flat_map(|files| files.keys())
            .filter_map(|k| k.parse::<u8>().ok());
        dataset
            .levels
            .iter()
            .copied()
            .chain(numeric_keys)
            .max()
            .unwrap_or(6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        serde_json::from_str(
            r#"{
                "datasets": [{"country": "us", "year": 2024, "file": "bls-data-us-2024.json", "levels": [1, 2]}],
                "levelFiles": {"us-2024": {
                    "3": "bls-data-us-2024-3.json",
                    "3-metro": "bls-data-us-2024-3-metro.json",
                    "4": "bls-data-us-2024-4.json"
                }},
                "countries": [{"code": "us", "name": "United States"}],
                "years": [2024],
                "lastUpdated": "2025-03-01"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_catalog_level_lookup() {
        let catalog = catalog();
        assert_eq!(catalog.level_file("3"), Some("bls-data-us-2024-3.json"));
        assert_eq!(catalog.level_file("3-metro"), Some("bls-data-us-2024-3-metro.json"));
        assert_eq!(catalog.level_file("5"), None);
        assert_eq!(
            catalog.last_updated,
            NaiveDate::from_ymd_opt(2025, 3, 1)
        );
    }

    #[test]
    fn test_max_digit_level_ignores_partition_keys() {
        assert_eq!(catalog().max_digit_level(), 4);
        assert_eq!(Catalog::default().max_digit_level(), 6);
    }

    #[test]
    fn test_year_keys_roundtrip_as_strings() {
        let json = r#"{"regionData": {"national-us": {"2024": [
            {"socCode": "11-0000", "totEmp": 100.0, "gdp": 5.0, "aMean": 90000.0, "complexity": 0.7}
        ]}}}"#;
        let dataset: Dataset = serde_json::from_str(json).unwrap();
        let rows = dataset.observations("national-us", 2024).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].employ(), 100.0);

        let out = serde_json::to_value(&dataset).unwrap();
        assert!(out["regionData"]["national-us"]["2024"].is_array());
    }

    #[test]
    fn test_missing_metrics_count_as_zero() {
        let row: RegionOccupation =
            serde_json::from_str(r#"{"socCode": "11-1011", "totEmp": null}"#).unwrap();
        assert_eq!(row.employ(), 0.0);
        assert_eq!(row.gdp(), 0.0);
    }
}

//! Lenient JSON parser for catalog and data documents.
//!
//! Individual malformed entries (missing required fields, bad SOC codes, a
//! stored level that disagrees with the code) are skipped and counted so a
//! partially broken document still yields a usable [`Dataset`].

use std::collections::{BTreeMap, HashSet};

use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::hierarchy::SocCode;
use crate::types::{
    AggregateOccupation, Catalog, Dataset, MajorGroup, Metadata, MinMaxStats, Occupation, Region,
    RegionOccupation, Year, YearAggregates,
};

/// Counts of entries dropped while parsing one document.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParseReport {
    pub skipped_regions: usize,
    pub skipped_occupations: usize,
    pub skipped_major_groups: usize,
    pub skipped_observations: usize,
    pub skipped_aggregates: usize,
    pub duplicates: usize,
}

impl ParseReport {
    pub fn skipped(&self) -> usize {
        self.skipped_regions
            + self.skipped_occupations
            + self.skipped_major_groups
            + self.skipped_observations
            + self.skipped_aggregates
    }
}

/// Decodes the meta catalog.
///
/// # Errors
///
/// Returns an error if the document is not a JSON object of the catalog shape.
pub fn parse_catalog(value: Value) -> Result<Catalog> {
    serde_json::from_value(value).context("catalog document has an unexpected shape")
}

/// Decodes a data document, skipping malformed entries.
///
/// # Errors
///
/// Only fails when the document itself is not a JSON object.
pub fn parse_dataset(value: Value) -> Result<(Dataset, ParseReport)> {
    let Value::Object(mut doc) = value else {
        bail!("data document must be a JSON object");
    };
    let mut report = ParseReport::default();

    let metadata: Metadata = match doc.remove("metadata") {
        Some(v) => serde_json::from_value(v).unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring malformed metadata");
            Metadata::default()
        }),
        None => Metadata::default(),
    };

    let regions: Vec<Region> = parse_entries(doc.remove("regions"), &mut report.skipped_regions);
    let major_groups: Vec<MajorGroup> =
        parse_entries(doc.remove("majorGroups"), &mut report.skipped_major_groups);

    let mut occupations = Vec::new();
    let mut seen = HashSet::new();
    for occ in parse_entries::<Occupation>(doc.remove("occupations"), &mut report.skipped_occupations)
    {
        if occ.level.is_some_and(|level| level != occ.soc_code.level()) {
            warn!(code = %occ.soc_code, stored = ?occ.level, "Skipping occupation with inconsistent level");
            report.skipped_occupations += 1;
            continue;
        }
        if seen.insert(occ.soc_code.clone()) {
            occupations.push(occ);
        } else {
            report.duplicates += 1;
        }
    }

    let region_data = parse_region_data(doc.remove("regionData"), &mut report);
    let aggregates = parse_aggregates(doc.remove("aggregates"), &mut report);

    if report.skipped() > 0 {
        warn!(?report, "Skipped malformed entries while parsing data document");
    } else {
        debug!(
            occupations = occupations.len(),
            regions = regions.len(),
            "Parsed data document"
        );
    }

    Ok((
        Dataset {
            metadata,
            regions,
            occupations,
            major_groups,
            region_data,
            aggregates,
        },
        report,
    ))
}

fn parse_entries<T: DeserializeOwned>(value: Option<Value>, skipped: &mut usize) -> Vec<T> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(error = %e, "Skipping malformed entry");
                *skipped += 1;
                None
            }
        })
        .collect()
}

fn parse_year(key: &str, skipped: &mut usize) -> Option<Year> {
    match key.parse() {
        Ok(year) => Some(year),
        Err(_) => {
            warn!(key, "Skipping entry keyed by a non-numeric year");
            *skipped += 1;
            None
        }
    }
}

fn parse_region_data(
    value: Option<Value>,
    report: &mut ParseReport,
) -> BTreeMap<String, BTreeMap<Year, Vec<RegionOccupation>>> {
    let mut region_data = BTreeMap::new();
    let Some(Value::Object(regions)) = value else {
        return region_data;
    };

    for (region_id, years) in regions {
        let Value::Object(years) = years else {
            report.skipped_observations += 1;
            continue;
        };
        let mut by_year = BTreeMap::new();
        for (year_key, rows) in years {
            let Some(year) = parse_year(&year_key, &mut report.skipped_observations) else {
                continue;
            };
            let mut seen = HashSet::new();
            let rows: Vec<RegionOccupation> =
                parse_entries::<RegionOccupation>(Some(rows), &mut report.skipped_observations)
                    .into_iter()
                    .filter(|row| {
                        let fresh = seen.insert(row.soc_code.clone());
                        if !fresh {
                            report.duplicates += 1;
                        }
                        fresh
                    })
                    .collect();
            by_year.insert(year, rows);
        }
        region_data.insert(region_id, by_year);
    }

    region_data
}

fn parse_aggregates(value: Option<Value>, report: &mut ParseReport) -> BTreeMap<Year, YearAggregates> {
    let mut aggregates = BTreeMap::new();
    let Some(Value::Object(years)) = value else {
        return aggregates;
    };

    for (year_key, summary) in years {
        let Some(year) = parse_year(&year_key, &mut report.skipped_aggregates) else {
            continue;
        };
        let Value::Object(mut summary) = summary else {
            report.skipped_aggregates += 1;
            continue;
        };

        let mut by_occupation = BTreeMap::new();
        if let Some(Value::Object(entries)) = summary.remove("byOccupation") {
            for (code, entry) in entries {
                let parsed = code
                    .parse::<SocCode>()
                    .map_err(anyhow::Error::from)
                    .and_then(|code| {
                        let entry: AggregateOccupation = serde_json::from_value(entry)?;
                        Ok((code, entry))
                    });
                match parsed {
                    Ok((code, entry)) => {
                        by_occupation.insert(code, entry);
                    }
                    Err(e) => {
                        debug!(error = %e, "Skipping malformed aggregate entry");
                        report.skipped_aggregates += 1;
                    }
                }
            }
        }

        let min_max_stats: MinMaxStats = summary
            .remove("minMaxStats")
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        aggregates.insert(
            year,
            YearAggregates {
                by_occupation,
                min_max_stats,
            },
        );
    }

    aggregates
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejects_non_object_document() {
        assert!(parse_dataset(json!([1, 2, 3])).is_err());
    }

    #[test]
    fn test_empty_object_is_empty_dataset() {
        let (dataset, report) = parse_dataset(json!({})).unwrap();
        assert_eq!(dataset, Dataset::default());
        assert_eq!(report, ParseReport::default());
    }

    #[test]
    fn test_skips_malformed_occupations() {
        let doc = json!({
            "occupations": [
                {"socCode": "11-0000", "name": "Management", "level": 1, "majorGroupId": "11"},
                {"name": "no code", "majorGroupId": "11"},
                {"socCode": "11-10", "majorGroupId": "11"},
                {"socCode": "11-1011", "level": 2, "majorGroupId": "11"},
                {"socCode": "11-0000", "name": "dup", "level": 1, "majorGroupId": "11"}
            ]
        });
        let (dataset, report) = parse_dataset(doc).unwrap();
        assert_eq!(dataset.occupations.len(), 1);
        assert_eq!(dataset.occupations[0].name.as_deref(), Some("Management"));
        assert_eq!(report.skipped_occupations, 3);
        assert_eq!(report.duplicates, 1);
    }

    #[test]
    fn test_skips_malformed_observations_but_keeps_rest() {
        let doc = json!({
            "regionData": {
                "state-ohio": {
                    "2024": [
                        {"socCode": "11-0000", "totEmp": 10.0},
                        {"totEmp": 3.0},
                        {"socCode": "11-0000", "totEmp": 99.0}
                    ],
                    "latest": []
                }
            }
        });
        let (dataset, report) = parse_dataset(doc).unwrap();
        let rows = dataset.observations("state-ohio", 2024).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].employ(), 10.0);
        assert_eq!(report.skipped_observations, 2);
        assert_eq!(report.duplicates, 1);
    }

    #[test]
    fn test_parses_aggregates_leniently() {
        let doc = json!({
            "aggregates": {
                "2024": {
                    "byOccupation": {
                        "11-0000": {"totalEmploy": 100.0, "avgWage": 120000.0, "avgComplexity": 0.8},
                        "bogus": {"totalEmploy": 1.0}
                    }
                }
            }
        });
        let (dataset, report) = parse_dataset(doc).unwrap();
        let year = &dataset.aggregates[&2024];
        assert_eq!(year.by_occupation.len(), 1);
        assert_eq!(year.min_max_stats, MinMaxStats::default());
        assert_eq!(report.skipped_aggregates, 1);
    }

    #[test]
    fn test_parse_catalog() {
        let catalog = parse_catalog(json!({
            "datasets": [{"country": "us", "year": 2024, "file": "bls-data-us-2024.json", "levels": [1, 2]}],
            "levelFiles": {"us-2024": {"3": "bls-data-us-2024-3.json"}}
        }))
        .unwrap();
        assert_eq!(catalog.datasets.len(), 1);
        assert!(parse_catalog(json!({"datasets": "nope"})).is_err());
    }
}

//! Read-only lookups over a snapshot that presentation code runs per view.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::analyzers::composition::{Composition, CompositionOptions, aggregate_for_display};
use crate::hierarchy::SocCode;
use crate::types::{Dataset, Region, RegionOccupation, RegionType, Year};

/// Outcome of a query that may legitimately find nothing.
///
/// `NoData` means the loaded records hold nothing for the request. It is
/// distinct from a level still loading (see `DataProvider::level_loading`)
/// and from a failed fetch (`LevelState::FetchFailed`).
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult<T> {
    Data(T),
    NoData,
}

impl<T> QueryResult<T> {
    pub fn is_no_data(&self) -> bool {
        matches!(self, QueryResult::NoData)
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            QueryResult::Data(v) => Some(v),
            QueryResult::NoData => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryResult<U> {
        match self {
            QueryResult::Data(v) => QueryResult::Data(f(v)),
            QueryResult::NoData => QueryResult::NoData,
        }
    }
}

impl<T> From<Option<T>> for QueryResult<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => QueryResult::Data(v),
            None => QueryResult::NoData,
        }
    }
}

/// Observations feeding the composition view of one region and year.
pub fn region_composition_input<'a>(
    dataset: &'a Dataset,
    region_id: &str,
    year: Year,
) -> QueryResult<&'a [RegionOccupation]> {
    match dataset.observations(region_id, year) {
        Some(rows) if !rows.is_empty() => QueryResult::Data(rows),
        _ => QueryResult::NoData,
    }
}

pub fn region_composition(
    dataset: &Dataset,
    region_id: &str,
    year: Year,
    options: &CompositionOptions,
) -> QueryResult<Composition> {
    region_composition_input(dataset, region_id, year)
        .map(|rows| aggregate_for_display(dataset, rows, options))
}

/// One side of a comparison, with the year actually used.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSide<'a> {
    pub region: &'a Region,
    pub year: Year,
    pub rows: &'a [RegionOccupation],
}

impl ComparisonSide<'_> {
    fn row(&self, code: &SocCode) -> Option<&RegionOccupation> {
        self.rows.iter().find(|r| &r.soc_code == code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison<'a> {
    pub primary: ComparisonSide<'a>,
    /// `None` when the benchmark region has no rows in either year.
    pub secondary: Option<ComparisonSide<'a>>,
    /// True when no secondary region was asked for and the national region
    /// stands in for it.
    pub national_proxy: bool,
}

/// Side-by-side figures for a single code.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparedOccupation {
    pub soc_code: SocCode,
    pub primary_employ: Option<f64>,
    pub secondary_employ: Option<f64>,
    pub primary_gdp: Option<f64>,
    pub secondary_gdp: Option<f64>,
}

impl Comparison<'_> {
    /// Union of both sides' codes in code order.
    pub fn pairs(&self) -> Vec<ComparedOccupation> {
        let mut codes: Vec<&SocCode> = self.primary.rows.iter().map(|r| &r.soc_code).collect();
        if let Some(secondary) = &self.secondary {
            codes.extend(secondary.rows.iter().map(|r| &r.soc_code));
        }
        codes.sort();
        codes.dedup();

        codes
            .into_iter()
            .map(|code| {
                let p = self.primary.row(code);
                let s = self.secondary.as_ref().and_then(|side| side.row(code));
                ComparedOccupation {
                    soc_code: code.clone(),
                    primary_employ: p.and_then(|r| r.tot_emp),
                    secondary_employ: s.and_then(|r| r.tot_emp),
                    primary_gdp: p.and_then(|r| r.gdp),
                    secondary_gdp: s.and_then(|r| r.gdp),
                }
            })
            .collect()
    }
}

fn side<'a>(
    dataset: &'a Dataset,
    region: &'a Region,
    year: Year,
    default_year: Year,
) -> Option<ComparisonSide<'a>> {
    [year, default_year].into_iter().find_map(|y| {
        dataset
            .observations(&region.region_id, y)
            .filter(|rows| !rows.is_empty())
            .map(|rows| ComparisonSide {
                region,
                year: y,
                rows,
            })
    })
}

/// Rows of two regions for comparison. Each side falls back to
/// `default_year` when `year` has no rows; with no `secondary` the first
/// national region is the benchmark.
pub fn compare_regions<'a>(
    dataset: &'a Dataset,
    primary: &str,
    secondary: Option<&str>,
    year: Year,
    default_year: Year,
) -> QueryResult<Comparison<'a>> {
    let Some(primary_region) = dataset.region(primary) else {
        return QueryResult::NoData;
    };
    let Some(primary_side) = side(dataset, primary_region, year, default_year) else {
        return QueryResult::NoData;
    };

    let benchmark = match secondary {
        Some(id) => dataset.region(id),
        None => dataset
            .regions
            .iter()
            .find(|r| r.region_type == RegionType::National),
    };

    QueryResult::Data(Comparison {
        primary: primary_side,
        secondary: benchmark.and_then(|r| side(dataset, r, year, default_year)),
        national_proxy: secondary.is_none(),
    })
}

/// Regions grouped by type, each group in document order.
pub fn regions_by_type(dataset: &Dataset) -> BTreeMap<RegionType, Vec<&Region>> {
    let mut grouped: BTreeMap<RegionType, Vec<&Region>> = BTreeMap::new();
    for region in &dataset.regions {
        grouped.entry(region.region_type).or_default().push(region);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_dataset;
    use serde_json::json;

    fn dataset() -> Dataset {
        parse_dataset(json!({
            "regions": [
                {"regionId": "national-us", "name": "United States", "regionType": "National"},
                {"regionId": "state-oh", "name": "Ohio", "regionType": "State"},
                {"regionId": "state-pa", "name": "Pennsylvania", "regionType": "State"},
                {"regionId": "metro-akron", "name": "Akron, OH", "regionType": "Metro"}
            ],
            "occupations": [
                {"socCode": "11-0000", "level": 1, "majorGroupId": "11"},
                {"socCode": "29-0000", "level": 1, "majorGroupId": "29"}
            ],
            "regionData": {
                "national-us": {
                    "2023": [{"socCode": "11-0000", "totEmp": 900.0, "gdp": 9.0}],
                    "2024": [
                        {"socCode": "11-0000", "totEmp": 1000.0, "gdp": 10.0},
                        {"socCode": "29-0000", "totEmp": 500.0}
                    ]
                },
                "state-oh": {"2024": [{"socCode": "11-0000", "totEmp": 40.0, "gdp": 0.4}]},
                "state-pa": {"2023": [{"socCode": "29-0000", "totEmp": 30.0}]},
                "metro-akron": {"2024": []}
            }
        }))
        .unwrap()
        .0
    }

    #[test]
    fn test_composition_input_no_data() {
        let ds = dataset();
        assert!(matches!(
            region_composition_input(&ds, "state-oh", 2024),
            QueryResult::Data(rows) if rows.len() == 1
        ));
        assert!(region_composition_input(&ds, "state-oh", 2023).is_no_data());
        assert!(region_composition_input(&ds, "metro-akron", 2024).is_no_data());
        assert!(region_composition_input(&ds, "state-tx", 2024).is_no_data());
    }

    #[test]
    fn test_region_composition() {
        let ds = dataset();
        let options = CompositionOptions {
            depth: 1,
            ..Default::default()
        };
        let composition = region_composition(&ds, "national-us", 2024, &options)
            .into_option()
            .unwrap();
        assert_eq!(composition.total, 1500.0);
        assert!(region_composition(&ds, "metro-akron", 2024, &options).is_no_data());
    }

    #[test]
    fn test_compare_defaults_to_national_proxy() {
        let ds = dataset();
        let comparison = compare_regions(&ds, "state-oh", None, 2024, 2024)
            .into_option()
            .unwrap();
        assert!(comparison.national_proxy);
        let secondary = comparison.secondary.as_ref().unwrap();
        assert_eq!(secondary.region.region_id, "national-us");

        let pairs = comparison.pairs();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].primary_employ, Some(40.0));
        assert_eq!(pairs[0].secondary_employ, Some(1000.0));
        assert_eq!(pairs[1].primary_employ, None);
        assert_eq!(pairs[1].secondary_employ, Some(500.0));
    }

    #[test]
    fn test_compare_falls_back_to_default_year() {
        let ds = dataset();
        let comparison = compare_regions(&ds, "state-oh", Some("state-pa"), 2024, 2023)
            .into_option()
            .unwrap();
        assert!(!comparison.national_proxy);
        assert_eq!(comparison.primary.year, 2024);
        let secondary = comparison.secondary.unwrap();
        assert_eq!(secondary.year, 2023);
        assert_eq!(secondary.rows.len(), 1);
    }

    #[test]
    fn test_compare_without_primary_rows() {
        let ds = dataset();
        assert!(compare_regions(&ds, "metro-akron", None, 2024, 2023).is_no_data());
        assert!(compare_regions(&ds, "state-tx", None, 2024, 2023).is_no_data());

        let comparison = compare_regions(&ds, "state-oh", Some("metro-akron"), 2024, 2023)
            .into_option()
            .unwrap();
        assert!(comparison.secondary.is_none());
    }

    #[test]
    fn test_regions_by_type() {
        let ds = dataset();
        let grouped = regions_by_type(&ds);
        assert_eq!(grouped[&RegionType::National].len(), 1);
        let states: Vec<_> = grouped[&RegionType::State]
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(states, vec!["Ohio", "Pennsylvania"]);
        assert_eq!(grouped[&RegionType::Metro].len(), 1);
    }
}

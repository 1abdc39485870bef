use std::collections::BTreeMap;

use tracing::debug;

use crate::analyzers::types::{ColorMap, GroupColor, OccupationColor};
use crate::analyzers::utility::mean;
use crate::stats::compute_stats;
use crate::types::{Dataset, Year};

/// Builds the colour-scale domains and per-code ranks for `year`.
///
/// Domains come from the year's per-occupation wage and complexity averages
/// with outliers excluded from min/max. Each occupation and major group gets
/// its raw value plus the value clamped into the domain. A year without a
/// summary yields an empty map with zeroed domains.
pub fn compute_color_stats(dataset: &Dataset, year: Year) -> ColorMap {
    let Some(summary) = dataset.aggregates.get(&year) else {
        debug!(year, "No aggregate summary for year");
        return ColorMap::default();
    };

    let wages: Vec<f64> = summary.by_occupation.values().map(|o| o.avg_wage).collect();
    let complexities: Vec<f64> = summary
        .by_occupation
        .values()
        .map(|o| o.avg_complexity)
        .collect();

    let wage = compute_stats(&wages);
    let complexity = compute_stats(&complexities);

    let occupations = summary
        .by_occupation
        .iter()
        .map(|(code, agg)| {
            (
                code.clone(),
                OccupationColor {
                    total_employ: agg.total_employ,
                    wage: agg.avg_wage,
                    complexity: agg.avg_complexity,
                    wage_rank: wage.rank(agg.avg_wage),
                    complexity_rank: complexity.rank(agg.avg_complexity),
                },
            )
        })
        .collect();

    let mut groups = BTreeMap::new();
    for group in &dataset.major_groups {
        let members: Vec<_> = dataset
            .occupations
            .iter()
            .filter(|o| o.major_group_id == group.group_id)
            .filter_map(|o| summary.by_occupation.get(&o.soc_code))
            .collect();

        let group_wage = mean(&members.iter().map(|m| m.avg_wage).collect::<Vec<_>>());
        let group_complexity =
            mean(&members.iter().map(|m| m.avg_complexity).collect::<Vec<_>>());

        groups.insert(
            group.group_id.clone(),
            GroupColor {
                members: members.len(),
                wage: group_wage,
                complexity: group_complexity,
                wage_rank: wage.rank(group_wage),
                complexity_rank: complexity.rank(group_complexity),
            },
        );
    }

    ColorMap {
        year: Some(year),
        wage,
        complexity,
        occupations,
        groups,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::ColorBy;
    use crate::hierarchy::SocCode;
    use crate::parser::parse_dataset;
    use serde_json::json;

    fn code(s: &str) -> SocCode {
        s.parse().unwrap()
    }

    fn dataset() -> Dataset {
        parse_dataset(json!({
            "occupations": [
                {"socCode": "11-1011", "majorGroupId": "11"},
                {"socCode": "11-1021", "majorGroupId": "11"},
                {"socCode": "35-2011", "majorGroupId": "35"},
                {"socCode": "35-2012", "majorGroupId": "35"},
                {"socCode": "35-3011", "majorGroupId": "35"},
                {"socCode": "29-1211", "majorGroupId": "29"}
            ],
            "majorGroups": [
                {"groupId": "11", "name": "Management"},
                {"groupId": "35", "name": "Food Preparation"},
                {"groupId": "47", "name": "Construction"}
            ],
            "aggregates": {"2024": {"byOccupation": {
                "11-1011": {"totalEmploy": 10.0, "avgWage": 60.0, "avgComplexity": 0.8},
                "11-1021": {"totalEmploy": 20.0, "avgWage": 50.0, "avgComplexity": 0.7},
                "35-2011": {"totalEmploy": 30.0, "avgWage": 30.0, "avgComplexity": 0.2},
                "35-2012": {"totalEmploy": 40.0, "avgWage": 32.0, "avgComplexity": 0.3},
                "35-3011": {"totalEmploy": 50.0, "avgWage": 34.0, "avgComplexity": 0.25},
                "29-1211": {"totalEmploy": 5.0, "avgWage": 900.0, "avgComplexity": 0.9}
            }}}
        }))
        .unwrap()
        .0
    }

    #[test]
    fn test_missing_year_is_empty() {
        let map = compute_color_stats(&dataset(), 1999);
        assert_eq!(map, ColorMap::default());
        assert_eq!(map.domain(ColorBy::Wage).max, 0.0);
    }

    #[test]
    fn test_outlier_clamped_to_domain() {
        let map = compute_color_stats(&dataset(), 2024);
        let domain = map.domain(ColorBy::Wage);
        assert_eq!(domain.min, 30.0);
        assert_eq!(domain.max, 60.0);
        // sorted wages: 30, 32, 34, 50, 60, 900 -> index round(3.0) = 3
        assert_eq!(domain.median, 50.0);

        let surgeon = code("29-1211");
        assert_eq!(map.raw(&surgeon, ColorBy::Wage), Some(900.0));
        assert_eq!(map.rank(&surgeon, ColorBy::Wage), Some(60.0));
        assert_eq!(map.total_employ(&surgeon), Some(5.0));
    }

    #[test]
    fn test_group_averages() {
        let map = compute_color_stats(&dataset(), 2024);
        assert_eq!(map.group_rank("35", ColorBy::Wage), Some(32.0));
        assert_eq!(map.group_rank("11", ColorBy::Wage), Some(55.0));
        assert_eq!(map.groups["47"].members, 0);
        assert_eq!(map.group_rank("47", ColorBy::Wage), Some(30.0));
    }
}

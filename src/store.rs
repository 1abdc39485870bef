//! Additive merge of data documents into the in-memory record set.
//!
//! The record set is a plain [`Dataset`] value. Merging never mutates its
//! inputs; the caller swaps its `Arc<Dataset>` for the returned value.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::analyzers::utility::{bounds, sorted_finite};
use crate::types::{Dataset, Metadata, MinMaxStats, Year, YearAggregates};

/// Immutable view of the records held at one point in time.
pub type Snapshot = Arc<Dataset>;

/// Returns `existing` extended with everything in `incoming` that it lacks.
///
/// Existing records always win: occupations, major groups and regions are
/// unioned by id and observations by `(region, year, code)`. Aggregate
/// summaries are merged per year with incoming entries replacing same-code
/// entries.
pub fn merge(existing: &Dataset, incoming: &Dataset) -> Dataset {
    let mut occupations = existing.occupations.clone();
    let mut codes: HashSet<_> = occupations.iter().map(|o| o.soc_code.clone()).collect();
    for occ in &incoming.occupations {
        if codes.insert(occ.soc_code.clone()) {
            occupations.push(occ.clone());
        }
    }

    let mut major_groups = existing.major_groups.clone();
    let mut group_ids: HashSet<_> = major_groups.iter().map(|g| g.group_id.clone()).collect();
    for group in &incoming.major_groups {
        if group_ids.insert(group.group_id.clone()) {
            major_groups.push(group.clone());
        }
    }

    let mut regions = existing.regions.clone();
    let mut region_ids: HashSet<_> = regions.iter().map(|r| r.region_id.clone()).collect();
    for region in &incoming.regions {
        if region_ids.insert(region.region_id.clone()) {
            regions.push(region.clone());
        }
    }

    let mut region_data = existing.region_data.clone();
    for (region_id, years) in &incoming.region_data {
        let merged_years = region_data.entry(region_id.clone()).or_default();
        for (year, rows) in years {
            let merged_rows = merged_years.entry(*year).or_default();
            let mut present: HashSet<_> = merged_rows.iter().map(|r| r.soc_code.clone()).collect();
            for row in rows {
                if present.insert(row.soc_code.clone()) {
                    merged_rows.push(row.clone());
                }
            }
        }
    }

    let mut aggregates = existing.aggregates.clone();
    for (year, summary) in &incoming.aggregates {
        match aggregates.get_mut(year) {
            None => {
                aggregates.insert(*year, summary.clone());
            }
            Some(current) => merge_year(current, summary),
        }
    }

    Dataset {
        metadata: merge_metadata(&existing.metadata, &incoming.metadata),
        regions,
        occupations,
        major_groups,
        region_data,
        aggregates,
    }
}

fn merge_year(current: &mut YearAggregates, incoming: &YearAggregates) {
    let mut by_occupation = current.by_occupation.clone();
    by_occupation.extend(
        incoming
            .by_occupation
            .iter()
            .map(|(code, agg)| (code.clone(), agg.clone())),
    );
    if by_occupation != current.by_occupation {
        current.min_max_stats = summarize(&by_occupation);
        current.by_occupation = by_occupation;
    }
}

fn merge_metadata(existing: &Metadata, incoming: &Metadata) -> Metadata {
    let mut years: Vec<Year> = existing.years.clone();
    years.extend(incoming.years.iter().copied());
    years.sort_unstable();
    years.dedup();
    Metadata {
        years,
        ..existing.clone()
    }
}

/// Recomputes a year's wage and complexity bounds from its per-occupation
/// averages.
pub fn summarize<K>(by_occupation: &BTreeMap<K, crate::types::AggregateOccupation>) -> MinMaxStats {
    let wages: Vec<f64> = by_occupation.values().map(|a| a.avg_wage).collect();
    let complexities: Vec<f64> = by_occupation.values().map(|a| a.avg_complexity).collect();
    let (min_wage, max_wage, median_wage) = bounds(&sorted_finite(&wages));
    let (min_complexity, max_complexity, median_complexity) = bounds(&sorted_finite(&complexities));
    MinMaxStats {
        min_wage,
        max_wage,
        median_wage,
        min_complexity,
        max_complexity,
        median_complexity,
    }
}

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::hierarchy::{ParentFallback, SocCode, nearest_available_ancestor};
use crate::types::{Dataset, RegionOccupation};

/// Which metric sizes the treemap cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Measure {
    /// Total employment (`totEmp`).
    #[default]
    Employment,
    /// Economic value (`gdp`).
    Gdp,
}

impl Measure {
    fn pick(&self, employ: f64, gdp: f64) -> f64 {
        match self {
            Measure::Employment => employ,
            Measure::Gdp => gdp,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompositionOptions {
    /// Deepest level shown.
    pub depth: u8,
    pub measure: Measure,
    /// Major group ids excluded from the output and the total.
    pub hidden_groups: HashSet<String>,
    pub fallback: ParentFallback,
}

impl Default for CompositionOptions {
    fn default() -> Self {
        Self {
            depth: 2,
            measure: Measure::Employment,
            hidden_groups: HashSet::new(),
            fallback: ParentFallback::Legacy,
        }
    }
}

/// One treemap cell. `employ` and `gdp` are the displayed amounts for both
/// measures: residuals for partially covered parents, raw values otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionCell {
    pub code: SocCode,
    pub name: Option<String>,
    pub top_group_id: String,
    pub value: f64,
    pub employ: f64,
    pub gdp: f64,
    pub a_mean: Option<f64>,
    pub residual: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Composition {
    pub cells: Vec<CompositionCell>,
    pub total: f64,
}

impl Composition {
    /// Percentage of the total covered by `cell`; 0 when the total is 0.
    pub fn share(&self, cell: &CompositionCell) -> f64 {
        if self.total == 0.0 {
            0.0
        } else {
            cell.value / self.total * 100.0
        }
    }

    pub fn cell(&self, code: &SocCode) -> Option<&CompositionCell> {
        self.cells.iter().find(|c| &c.code == code)
    }
}

/// Flattens one region/year of observations into non-overlapping cells.
///
/// Every shown code is linked to its nearest classified ancestor present in
/// `rows`. A parent with linked children shows only what its children leave
/// uncovered, floored at zero, and is dropped when neither employment nor
/// GDP is left. Codes without an occupation record or deeper than
/// `options.depth` are ignored.
pub fn aggregate_for_display(
    dataset: &Dataset,
    rows: &[RegionOccupation],
    options: &CompositionOptions,
) -> Composition {
    let occupations: HashMap<&SocCode, _> = dataset
        .occupations
        .iter()
        .map(|o| (&o.soc_code, o))
        .collect();
    let available: HashSet<SocCode> = rows
        .iter()
        .filter(|r| occupations.contains_key(&r.soc_code))
        .map(|r| r.soc_code.clone())
        .collect();

    let shown: Vec<&RegionOccupation> = rows
        .iter()
        .filter(|r| {
            occupations
                .get(&r.soc_code)
                .is_some_and(|o| o.level() <= options.depth)
        })
        .collect();

    let mut children_of: HashMap<SocCode, Vec<&RegionOccupation>> = HashMap::new();
    for row in &shown {
        if let Some(ancestor) =
            nearest_available_ancestor(&row.soc_code, &available, options.fallback)
        {
            children_of.entry(ancestor).or_default().push(*row);
        }
    }

    let mut composition = Composition::default();
    for row in shown {
        let Some(occupation) = occupations.get(&row.soc_code) else {
            continue;
        };
        if options.hidden_groups.contains(&occupation.major_group_id) {
            continue;
        }

        let (employ, gdp, residual) = match children_of.get(&row.soc_code) {
            Some(children) if !children.is_empty() => {
                let child_employ: f64 = children.iter().map(|c| c.employ()).sum();
                let child_gdp: f64 = children.iter().map(|c| c.gdp()).sum();
                (
                    (row.employ() - child_employ).max(0.0),
                    (row.gdp() - child_gdp).max(0.0),
                    true,
                )
            }
            _ => (row.employ(), row.gdp(), false),
        };

        if residual && employ <= 0.0 && gdp <= 0.0 {
            debug!(code = %row.soc_code, "Parent fully covered by children");
            continue;
        }
        let value = options.measure.pick(employ, gdp);

        composition.total += value;
        composition.cells.push(CompositionCell {
            code: row.soc_code.clone(),
            name: occupation.name.clone(),
            top_group_id: occupation.major_group_id.clone(),
            value,
            employ,
            gdp,
            a_mean: row.a_mean,
            residual,
        });
    }

    composition
}

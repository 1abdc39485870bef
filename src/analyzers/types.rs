//! Output types of the colour-scale aggregation.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::hierarchy::SocCode;
use crate::stats::ColorStats;
use crate::types::Year;

/// Which descriptive measure drives the cell colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColorBy {
    Wage,
    Complexity,
}

/// Colour inputs for a single occupation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OccupationColor {
    pub(crate) total_employ: f64,
    pub(crate) wage: f64,
    pub(crate) complexity: f64,
    pub(crate) wage_rank: f64,
    pub(crate) complexity_rank: f64,
}

/// Colour inputs for a major group, averaged over its member occupations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupColor {
    pub(crate) members: usize,
    pub(crate) wage: f64,
    pub(crate) complexity: f64,
    pub(crate) wage_rank: f64,
    pub(crate) complexity_rank: f64,
}

/// Global colour domains plus clamped ranks for one year.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColorMap {
    pub(crate) year: Option<Year>,
    pub(crate) wage: ColorStats,
    pub(crate) complexity: ColorStats,
    pub(crate) occupations: BTreeMap<SocCode, OccupationColor>,
    pub(crate) groups: BTreeMap<String, GroupColor>,
}

impl ColorMap {
    /// `[min, median, max]` stops for the colour scale.
    pub fn domain(&self, by: ColorBy) -> ColorStats {
        match by {
            ColorBy::Wage => self.wage,
            ColorBy::Complexity => self.complexity,
        }
    }

    /// Clamped colour input for `code`, if the year has a summary for it.
    pub fn rank(&self, code: &SocCode, by: ColorBy) -> Option<f64> {
        self.occupations.get(code).map(|o| match by {
            ColorBy::Wage => o.wage_rank,
            ColorBy::Complexity => o.complexity_rank,
        })
    }

    /// Raw (unclamped) value for `code`.
    pub fn raw(&self, code: &SocCode, by: ColorBy) -> Option<f64> {
        self.occupations.get(code).map(|o| match by {
            ColorBy::Wage => o.wage,
            ColorBy::Complexity => o.complexity,
        })
    }

    pub fn group_rank(&self, group_id: &str, by: ColorBy) -> Option<f64> {
        self.groups.get(group_id).map(|g| match by {
            ColorBy::Wage => g.wage_rank,
            ColorBy::Complexity => g.complexity_rank,
        })
    }

    pub fn total_employ(&self, code: &SocCode) -> Option<f64> {
        self.occupations.get(code).map(|o| o.total_employ)
    }
}

//! Views derived from a snapshot.
//!
//! `composition` flattens the hierarchy into non-overlapping treemap cells;
//! `aggregate` turns the per-year occupation summaries into colour-scale
//! domains and clamped ranks.

pub mod aggregate;
pub mod composition;
pub mod types;
pub mod utility;

//! Data engine for the SOC occupation atlas: merges partitioned BLS
//! documents into one record set, resolves the SOC hierarchy, flattens it
//! into non-overlapping treemap cells and derives colour-scale statistics.

pub mod analyzers;
pub mod config;
pub mod fetch;
pub mod hierarchy;
pub mod infra;
pub mod loader;
pub mod output;
pub mod parser;
pub mod queries;
pub mod services;
pub mod stats;
pub mod store;
pub mod types;

pub use analyzers::aggregate::compute_color_stats;
pub use analyzers::composition::aggregate_for_display;
pub use hierarchy::resolve_parent;
pub use loader::DataProvider;

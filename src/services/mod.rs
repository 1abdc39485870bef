//! Interfaces to the collaborators that supply data documents.

pub mod data_source;

pub use data_source::DataSource;

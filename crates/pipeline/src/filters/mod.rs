//! Filter implementations for the candidate pipeline.

pub mod category;

pub use category::CategoryFilter;

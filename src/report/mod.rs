//! Annotation report generation.

pub mod generator;

pub use generator::*;

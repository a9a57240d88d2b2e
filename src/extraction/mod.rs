//! Extraction module - page verdicts and field extraction
//!
//! The heuristic product-page classifier, the per-site selector tables,
//! price cleaning/normalization and the platform-aware field extractor.

pub mod classifier;
pub mod fields;
pub mod price;
pub mod selectors;

pub use classifier::{ProductClassifier, SignalWeights, Verdict};
pub use fields::FieldExtractor;
pub use selectors::{SelectorRegistry, SelectorTable};

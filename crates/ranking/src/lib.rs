//! Streamarr ranking module
//!
//! Result ordering and trimming between the indexer fan-out and the
//! descriptor builder: language-priority sorting, per-resolution caps,
//! and the configurable final sort.

pub mod language;
pub mod per_quality;
pub mod sort;

pub use language::LanguagePriorityFilter;
pub use per_quality::ResultsPerQualityFilter;
pub use sort::{sort_items, SortMode};

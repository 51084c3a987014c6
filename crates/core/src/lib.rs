//! Core domain models and business logic for Streamarr
//!
//! This crate contains the fundamental domain models, value objects,
//! and business rules shared by the search and playback pipeline:
//! media requests, torrent items, availability reconciliation, title
//! parsing, and the capability traits implemented by the provider crates.

pub mod container;
pub mod error;
pub mod keys;
pub mod models;
pub mod parsing;
pub mod retry;
pub mod traits;

// Re-export core types
pub use container::TorrentSmartContainer;
pub use error::{Result, StreamarrError};
pub use models::*;
pub use retry::{with_retries, RetrySchedule};
pub use traits::*;

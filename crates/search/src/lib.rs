//! Streamarr search module
//!
//! The orchestration layer of the pipeline: the two-tier cached search
//! with single-flight locking, the stream descriptor builder, and the
//! playback resolver with its download state machine.

pub mod builder;
pub mod orchestrator;
pub mod resolver;

pub use builder::StreamDescriptorBuilder;
pub use orchestrator::{SearchOrchestrator, SearchSettings};
pub use resolver::PlaybackResolver;

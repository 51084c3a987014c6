//! Deterministic, I/O-free title and filename parsing

pub mod episode;
pub mod magnet;
pub mod metadata;

pub use episode::{is_video_file, select_episode_file, FileCandidate};
pub use metadata::ParsedMetadata;

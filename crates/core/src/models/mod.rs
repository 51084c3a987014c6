//! Domain models shared by the search and playback pipeline

pub mod announcement;
pub mod config;
pub mod descriptor;
pub mod media;
pub mod query;
pub mod result;
pub mod torrent;

pub use announcement::{AnnouncedFile, AvailabilityAnnouncement};
pub use config::{Token, UserConfig};
pub use descriptor::StreamDescriptor;
pub use media::{MediaKind, MediaRequest};
pub use query::PlaybackQuery;
pub use result::{Privacy, RawResult};
pub use torrent::{AvailabilityCode, IndexedFile, StoreName, TorrentItem};

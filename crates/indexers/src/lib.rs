//! Streamarr indexers module
//!
//! This crate provides the torrent indexer clients behind the shared
//! [`IndexerClient`](streamarr_core::traits::IndexerClient) contract:
//! the Zilean (DMM) aggregated database, Jackett, and the community
//! result cache. Indexer failures are never fatal; the orchestrator
//! logs them and moves on.

pub mod jackett;
pub mod public_cache;
pub mod registry;
pub mod zilean;

pub use jackett::JackettClient;
pub use public_cache::PublicCacheIndexer;
pub use registry::IndexerRegistry;
pub use zilean::ZileanClient;

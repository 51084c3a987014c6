//! Streamarr debrid module
//!
//! This crate provides the debrid provider clients: RealDebrid,
//! AllDebrid, Premiumize, TorBox, and the StremThru aggregator gateway.
//! Includes per-client rate limiting, the shared retry ladder for
//! provider HTTP, and the registry that builds the per-request client
//! set from the user configuration.

pub mod alldebrid;
pub mod http;
pub mod premiumize;
pub mod rate_limiter;
pub mod realdebrid;
pub mod registry;
pub mod selection;
pub mod stremthru;
pub mod torbox;

pub use alldebrid::AllDebridClient;
pub use http::DebridHttp;
pub use premiumize::PremiumizeClient;
pub use rate_limiter::RateLimiter;
pub use realdebrid::RealDebridClient;
pub use registry::DebridRegistry;
pub use stremthru::StremThruClient;
pub use torbox::TorboxClient;

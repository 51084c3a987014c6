//! Process configuration from CLI flags and environment

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "streamarr", version, about = "Debrid-backed streaming link aggregator")]
pub struct Settings {
    #[arg(long, env = "STREAMARR_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "STREAMARR_PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Postgres holding the API key table; keyless mode when unset
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Default aggregator gateway when the request config names none
    #[arg(long, env = "STREMTHRU_URL")]
    pub stremthru_url: Option<String>,

    #[arg(long, env = "ZILEAN_URL")]
    pub zilean_url: Option<String>,

    #[arg(long, env = "JACKETT_URL")]
    pub jackett_url: Option<String>,

    #[arg(long, env = "JACKETT_API_KEY")]
    pub jackett_api_key: Option<String>,

    /// Video served while a download is still warming up
    #[arg(
        long,
        env = "NO_CACHE_VIDEO_URL",
        default_value = "https://streamarr.github.io/assets/nocache.mp4"
    )]
    pub placeholder_video_url: String,
}

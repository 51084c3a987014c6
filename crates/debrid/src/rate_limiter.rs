//! Sliding-window rate limiting
//!
//! Each debrid client carries two scopes: a global window (default
//! 250 req / 60 s) and a stricter torrent window (default 1 req / 1 s)
//! applied to URLs whose path touches the provider's torrent endpoints.
//! `acquire` sleeps until the oldest recorded timestamp leaves the
//! window; concurrent callers serialize on the window's queue.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

pub const GLOBAL_LIMIT: usize = 250;
pub const GLOBAL_PERIOD: Duration = Duration::from_secs(60);
pub const TORRENT_LIMIT: usize = 1;
pub const TORRENT_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct SlidingWindow {
    limit: usize,
    period: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl SlidingWindow {
    fn new(limit: usize, period: Duration) -> Self {
        SlidingWindow {
            limit,
            period,
            timestamps: Mutex::new(VecDeque::new()),
        }
    }

    async fn acquire(&self) {
        loop {
            let wait = {
                let mut timestamps = self.timestamps.lock().await;
                let now = Instant::now();
                while let Some(&oldest) = timestamps.front() {
                    if now.duration_since(oldest) >= self.period {
                        timestamps.pop_front();
                    } else {
                        break;
                    }
                }
                if timestamps.len() < self.limit {
                    timestamps.push_back(now);
                    None
                } else {
                    // Sleep until the oldest entry exits the window
                    let oldest = *timestamps.front().expect("queue is full");
                    Some(self.period - now.duration_since(oldest))
                }
            };
            match wait {
                None => return,
                Some(delay) => {
                    debug!("rate limit reached, waiting {delay:?}");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    global: SlidingWindow,
    torrent: SlidingWindow,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(GLOBAL_LIMIT, GLOBAL_PERIOD, TORRENT_LIMIT, TORRENT_PERIOD)
    }

    pub fn with_limits(
        global_limit: usize,
        global_period: Duration,
        torrent_limit: usize,
        torrent_period: Duration,
    ) -> Self {
        RateLimiter {
            global: SlidingWindow::new(global_limit, global_period),
            torrent: SlidingWindow::new(torrent_limit, torrent_period),
        }
    }

    /// Acquire the scopes a request to `url` falls under.
    pub async fn acquire_for(&self, url: &str) {
        self.global.acquire().await;
        if url.contains("torrents") {
            self.torrent.acquire().await;
        }
    }

    pub async fn acquire_global(&self) {
        self.global.acquire().await;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_window_split_across_boundary() {
        // 3 req / 1 s, six concurrent acquires: three admitted inside
        // [0, 1s), three inside [1s, 2s).
        let limiter = Arc::new(RateLimiter::with_limits(
            3,
            Duration::from_secs(1),
            1,
            Duration::from_secs(1),
        ));
        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..6 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.acquire_global().await;
                start.elapsed()
            }));
        }
        let mut elapsed: Vec<Duration> = Vec::new();
        for handle in handles {
            elapsed.push(handle.await.unwrap());
        }
        let first_window = elapsed
            .iter()
            .filter(|e| **e < Duration::from_secs(1))
            .count();
        let second_window = elapsed
            .iter()
            .filter(|e| **e >= Duration::from_secs(1) && **e < Duration::from_secs(2))
            .count();
        assert_eq!(first_window, 3, "elapsed: {elapsed:?}");
        assert_eq!(second_window, 3, "elapsed: {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_torrent_scope_only_for_torrent_urls() {
        let limiter = RateLimiter::with_limits(
            100,
            Duration::from_secs(60),
            1,
            Duration::from_secs(1),
        );
        let start = Instant::now();
        limiter.acquire_for("https://api.example.com/user").await;
        limiter.acquire_for("https://api.example.com/user").await;
        assert!(start.elapsed() < Duration::from_millis(10));

        limiter
            .acquire_for("https://api.example.com/torrents/addMagnet")
            .await;
        limiter
            .acquire_for("https://api.example.com/torrents/addMagnet")
            .await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_under_limit_never_sleeps() {
        let limiter = RateLimiter::with_limits(
            10,
            Duration::from_secs(1),
            1,
            Duration::from_secs(1),
        );
        let start = Instant::now();
        for _ in 0..10 {
            limiter.acquire_global().await;
        }
        assert!(start.elapsed() < Duration::from_millis(10));
    }
}

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Sliding-window request pacer shared by the API clients.
///
/// `acquire` resolves immediately while fewer than `max_requests` calls have
/// happened inside the window, otherwise it sleeps until the oldest call
/// falls out of the window.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<Window>>,
}

#[derive(Debug)]
struct Window {
    max_requests: u32,
    window: Duration,
    sent: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Window {
                max_requests,
                window,
                sent: VecDeque::new(),
            })),
        }
    }

    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut inner = self.inner.lock().await;
                let now = Instant::now();
                while let Some(&front) = inner.sent.front() {
                    if now.duration_since(front) >= inner.window {
                        inner.sent.pop_front();
                    } else {
                        break;
                    }
                }
                if (inner.sent.len() as u32) < inner.max_requests {
                    inner.sent.push_back(now);
                    return;
                }
                // Oldest entry decides how long the window stays saturated.
                match inner.sent.front() {
                    Some(&front) => inner.window - now.duration_since(front),
                    None => inner.window,
                }
            };
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_under_limit() {
        let limiter = RateLimiter::new(5, Duration::from_secs(1));
        for _ in 0..5 {
            limiter.acquire().await;
        }
    }

    #[tokio::test]
    async fn test_acquire_blocks_when_saturated() {
        let limiter = RateLimiter::new(2, Duration::from_millis(100));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_window_drains() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(15));
    }

    #[tokio::test]
    async fn test_clone_shares_window() {
        let limiter = RateLimiter::new(2, Duration::from_millis(100));
        let other = limiter.clone();
        let start = Instant::now();
        limiter.acquire().await;
        other.acquire().await;
        other.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }
}

//! Cooperative cancellation for downloads.
//!
//! A session hands one token to each download it starts. Fetch units poll it
//! between chunks and while paused by the throttle; the session trips it when
//! the client disconnects.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Longest single sleep while waiting out a throttle pause.
const PAUSE_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Block the current thread for `pause`, waking every [`PAUSE_SLICE`] to
    /// check the token. Returns false if cancelled before the pause ran out.
    pub fn sleep(&self, pause: Duration) -> bool {
        let deadline = Instant::now() + pause;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(PAUSE_SLICE));
        }
    }
}

/// Cancels every download started by one session when dropped.
#[derive(Debug, Default)]
pub struct SessionDownloads {
    tokens: Vec<CancelToken>,
}

impl SessionDownloads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for a new download owned by this session. Tokens no download
    /// holds anymore are dropped first.
    pub fn register(&mut self) -> CancelToken {
        self.tokens.retain(|t| Arc::strong_count(&t.0) > 1);
        let token = CancelToken::new();
        self.tokens.push(token.clone());
        token
    }

    pub fn cancel_all(&self) {
        for token in &self.tokens {
            token.cancel();
        }
    }
}

impl Drop for SessionDownloads {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

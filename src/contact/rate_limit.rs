//! Per-client message limiter for the contact form.
//!
//! Each client gets `limit` messages. The window restarts from the client's
//! most recent accepted message, so a client that keeps sending just inside
//! the window stays blocked until it pauses for a full window.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::warn;

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u32,
    last: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimited {
    pub retry_after: Duration,
}

#[derive(Debug)]
pub struct ContactRateLimiter {
    limit: u32,
    window: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl ContactRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, client: &str) -> Result<(), RateLimited> {
        self.check_at(client, Instant::now())
    }

    /// Count one message from `client` at `now`, or refuse it.
    pub fn check_at(&self, client: &str, now: Instant) -> Result<(), RateLimited> {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };

        match entries.get_mut(client) {
            Some(entry) if now.saturating_duration_since(entry.last) < self.window => {
                if entry.count >= self.limit {
                    let retry_after = self.window - now.saturating_duration_since(entry.last);
                    warn!(client, count = entry.count, "contact form rate limit hit");
                    return Err(RateLimited { retry_after });
                }
                entry.count += 1;
                entry.last = now;
            }
            _ => {
                entries.insert(client.to_string(), Entry { count: 1, last: now });
            }
        }
        Ok(())
    }

    /// Drop clients whose window has lapsed.
    pub fn prune_at(&self, now: Instant) -> usize {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = entries.len();
        entries.retain(|_, e| now.saturating_duration_since(e.last) < self.window);
        before - entries.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

//! Fixed-window rate limiting.
//!
//! Each client address gets a counter that resets when its window expires.
//! Loopback addresses are exempt.

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{Result, SydbError};

/// Number of tracked clients above which expired windows are pruned
const PURGE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Per-client fixed-window request counter
#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<HashMap<IpAddr, Window>>,
    window: Duration,
    max_requests: u32,
    exempt: HashSet<IpAddr>,
    rejected: AtomicU64,
}

impl RateLimiter {
    /// Allow `max_requests` per `window` for each non-exempt client
    pub fn new(window: Duration, max_requests: u32) -> Self {
        let exempt = [
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(Ipv6Addr::LOCALHOST),
        ]
        .into_iter()
        .collect();

        Self {
            windows: Mutex::new(HashMap::new()),
            window,
            max_requests,
            exempt,
            rejected: AtomicU64::new(0),
        }
    }

    /// Replace the exempt address set
    pub fn with_exempt(mut self, addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        self.exempt = addrs.into_iter().collect();
        self
    }

    pub fn is_exempt(&self, addr: &IpAddr) -> bool {
        self.exempt.contains(addr)
    }

    /// Count one request from `client`, rejecting it if over the limit
    pub fn check(&self, client: IpAddr) -> Result<()> {
        self.check_at(client, Instant::now())
    }

    /// `check` against an explicit clock reading
    pub fn check_at(&self, client: IpAddr, now: Instant) -> Result<()> {
        if self.is_exempt(&client) {
            return Ok(());
        }

        let mut windows = self.windows.lock();
        if windows.len() >= PURGE_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.saturating_duration_since(w.started) < window);
        }

        let entry = windows.entry(client).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.saturating_duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        entry.count = entry.count.saturating_add(1);
        if entry.count > self.max_requests {
            let retry_after = self.window.saturating_sub(now.saturating_duration_since(entry.started));
            drop(windows);
            self.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Rate limit exceeded for {}", client);
            return Err(SydbError::RateLimited(format!(
                "client {} exceeded {} requests per {}ms, retry in {}ms",
                client,
                self.max_requests,
                self.window.as_millis(),
                retry_after.as_millis()
            )));
        }

        Ok(())
    }

    /// Drop windows that have already expired
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, w| now.saturating_duration_since(w.started) < self.window);
        before - windows.len()
    }

    /// Requests counted in the client's current window
    pub fn current_count(&self, client: &IpAddr) -> u32 {
        self.windows.lock().get(client).map_or(0, |w| w.count)
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.lock().len()
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

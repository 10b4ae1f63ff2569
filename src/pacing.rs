//! Politeness delays between page loads, products and image downloads.

use std::ops::RangeInclusive;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng as _;
use tokio::sync::Mutex;

#[async_trait]
pub trait Pacer: Send + Sync {
    /// Waits until the next call is allowed to proceed.
    async fn pace(&self);
}

/// Enforces a minimum interval between consecutive calls, drawn uniformly
/// from `interval` each time.
#[derive(Debug)]
pub struct MinIntervalPacer {
    interval: RangeInclusive<Duration>,
    last: Mutex<Option<Instant>>,
}

impl MinIntervalPacer {
    pub fn new(interval: RangeInclusive<Duration>) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    fn draw_interval(&self) -> Duration {
        draw(&self.interval)
    }
}

#[async_trait]
impl Pacer for MinIntervalPacer {
    async fn pace(&self) {
        let mut last = self.last.lock().await;
        let interval = self.draw_interval();
        let wait = remaining_wait(*last, interval, Instant::now());
        if !wait.is_zero() {
            tracing::trace!(?wait, "pacing");
            tokio::time::sleep(wait).await;
        }
        *last = Some(Instant::now());
    }
}

/// Sleeps for a uniformly drawn duration on every call, e.g. to let a page settle.
#[derive(Debug, Clone)]
pub struct RandomDelay {
    range: RangeInclusive<Duration>,
}

impl RandomDelay {
    pub fn new(range: RangeInclusive<Duration>) -> Self {
        Self { range }
    }
}

#[async_trait]
impl Pacer for RandomDelay {
    async fn pace(&self) {
        let delay = draw(&self.range);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Never waits.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPacing;

#[async_trait]
impl Pacer for NoPacing {
    async fn pace(&self) {}
}

fn draw(range: &RangeInclusive<Duration>) -> Duration {
    let (min, max) = (*range.start(), *range.end());
    if max <= min {
        return min;
    }
    rand::thread_rng().gen_range(min..=max)
}

fn remaining_wait(last: Option<Instant>, interval: Duration, now: Instant) -> Duration {
    match last {
        Some(last) => (last + interval).saturating_duration_since(now),
        None => Duration::ZERO,
    }
}

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Rate-shaping policy consulted by the fetcher before every upstream call.
///
/// The upstream service has soft limits beyond the documented quota, so the
/// production policy inserts a fixed delay between calls. Tests swap in
/// `NoPacing`.
#[async_trait]
pub trait PacingPolicy: Send + Sync + fmt::Debug {
    async fn pace(&self);
}

#[derive(Debug, Clone)]
pub struct FixedDelayPacing {
    delay: Duration,
}

impl FixedDelayPacing {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// 2.5s between calls keeps well under Reddit's unstated soft limits.
    pub fn reddit_default() -> Self {
        Self::new(Duration::from_millis(2500))
    }
}

#[async_trait]
impl PacingPolicy for FixedDelayPacing {
    async fn pace(&self) {
        debug!("pacing upstream call by {:?}", self.delay);
        sleep(self.delay).await;
    }
}

#[derive(Debug, Clone, Default)]
pub struct NoPacing;

#[async_trait]
impl PacingPolicy for NoPacing {
    async fn pace(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn fixed_delay_waits() {
        let pacing = FixedDelayPacing::new(Duration::from_millis(30));
        let start = Instant::now();
        pacing.pace().await;
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn no_pacing_returns_immediately() {
        let pacing = NoPacing;
        let start = Instant::now();
        pacing.pace().await;
        assert!(start.elapsed() < Duration::from_millis(10));
    }
}

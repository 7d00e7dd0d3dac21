use async_trait::async_trait;
use radar_core::CoreError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct BudgetConfig {
    /// Ceiling of external-work units per window.
    pub max_units: u32,
    /// Window length; the expiry arms on the first increment of a window.
    pub window: Duration,
    /// Counter key shared by every consumer of this budget.
    pub key: String,
}

impl BudgetConfig {
    pub fn reddit_hourly() -> Self {
        Self {
            max_units: 100,
            window: Duration::from_secs(3600),
            key: "reddit:api:requests".to_string(),
        }
    }
}

/// Atomic counter capability backing the request budget.
///
/// `increment` must arm the window expiry only when it starts a fresh
/// window; later increments within the window leave the expiry alone
/// (sliding-reset, not rolling).
#[async_trait]
pub trait CounterStore: Send + Sync + fmt::Debug {
    async fn current(&self, key: &str) -> Result<u64, CoreError>;
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, CoreError>;
}

#[derive(Debug)]
struct CounterEntry {
    count: u64,
    expires_at: Instant,
}

/// In-process counter store for single-instance deployments.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    entries: Mutex<HashMap<String, CounterEntry>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn current(&self, key: &str) -> Result<u64, CoreError> {
        let entries = self.entries.lock().await;
        let count = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => entry.count,
            _ => 0,
        };
        Ok(count)
    }

    async fn increment(&self, key: &str, window: Duration) -> Result<u64, CoreError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                entry.count += 1;
                Ok(entry.count)
            }
            _ => {
                entries.insert(
                    key.to_string(),
                    CounterEntry {
                        count: 1,
                        expires_at: now + window,
                    },
                );
                Ok(1)
            }
        }
    }
}

/// Shared request budget against the external content source.
///
/// `check` fails fast with `QuotaExceeded` and never increments; `consume`
/// is called once per unit of external work performed (one community page,
/// one comment-thread fetch), never per item returned.
#[derive(Debug, Clone)]
pub struct RequestBudget {
    store: Arc<dyn CounterStore>,
    config: BudgetConfig,
}

impl RequestBudget {
    pub fn new(store: Arc<dyn CounterStore>, config: BudgetConfig) -> Self {
        Self { store, config }
    }

    pub fn in_memory(config: BudgetConfig) -> Self {
        Self::new(Arc::new(MemoryCounterStore::new()), config)
    }

    pub async fn check(&self) -> Result<(), CoreError> {
        let used = self.store.current(&self.config.key).await?;
        if used >= u64::from(self.config.max_units) {
            warn!(
                "request budget exhausted: {}/{} units used in the current window",
                used, self.config.max_units
            );
            return Err(CoreError::QuotaExceeded {
                limit: self.config.max_units,
                window_secs: self.config.window.as_secs(),
            });
        }
        Ok(())
    }

    pub async fn consume(&self) -> Result<u64, CoreError> {
        let used = self
            .store
            .increment(&self.config.key, self.config.window)
            .await?;
        debug!(
            "consumed request budget unit: {}/{} in window",
            used, self.config.max_units
        );
        Ok(used)
    }

    pub async fn used(&self) -> Result<u64, CoreError> {
        self.store.current(&self.config.key).await
    }

    pub async fn remaining(&self) -> Result<u64, CoreError> {
        let used = self.used().await?;
        Ok(u64::from(self.config.max_units).saturating_sub(used))
    }
}

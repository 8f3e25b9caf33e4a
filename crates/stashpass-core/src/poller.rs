//! Bounded polling until a read reflects a preceding write.

use crate::error::{StashError, StashResult};
use crate::types::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Poll bounds. Always finite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_interval_ms() -> u64 {
    2_000
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Upper bound on time spent sleeping between attempts.
    pub fn deadline(&self) -> Duration {
        self.interval() * self.max_attempts.saturating_sub(1)
    }

    pub fn validate(&self) -> StashResult<()> {
        if self.max_attempts == 0 {
            return Err(StashError::Config("poll attempts must be at least 1".into()));
        }
        Ok(())
    }
}

/// Injected sleep, so tests run without wall-clock delays.
#[async_trait]
pub trait Delay: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returns immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl Delay for NoDelay {
    async fn sleep(&self, _duration: Duration) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    Confirmed { value: T, attempts: u32 },
    /// The read never satisfied the predicate. The write may still land later.
    TimedOut { attempts: u32, last: Option<T> },
}

impl<T> PollOutcome<T> {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Confirmed { attempts, .. } | Self::TimedOut { attempts, .. } => *attempts,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Confirmed { value, .. } => Some(value),
            Self::TimedOut { last, .. } => last.as_ref(),
        }
    }
}

/// Retries a read at a fixed interval until a predicate holds.
#[derive(Clone)]
pub struct ConsistencyPoller {
    config: PollConfig,
    delay: Arc<dyn Delay>,
}

impl ConsistencyPoller {
    pub fn new(config: PollConfig, delay: Arc<dyn Delay>) -> Self {
        Self { config, delay }
    }

    pub fn with_tokio(config: PollConfig) -> Self {
        Self::new(config, Arc::new(TokioDelay))
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Read, check, sleep, repeat, up to `max_attempts` reads.
    ///
    /// Transport errors count as a failed attempt and are retried; any other
    /// error aborts the poll.
    pub async fn poll<T, F, Fut, P>(&self, what: &str, mut read: F, predicate: P) -> StashResult<PollOutcome<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StashResult<T>>,
        P: Fn(&T) -> bool,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                self.delay.sleep(self.config.interval()).await;
            }
            match read().await {
                Ok(value) if predicate(&value) => {
                    debug!(what, attempt, "read reflects write");
                    return Ok(PollOutcome::Confirmed {
                        value,
                        attempts: attempt,
                    });
                }
                Ok(value) => {
                    debug!(what, attempt, max_attempts, "read not yet consistent");
                    last = Some(value);
                }
                Err(err) if err.is_transport() => {
                    warn!(what, attempt, error = %err, "read failed, retrying");
                }
                Err(err) => return Err(err),
            }
        }

        warn!(what, attempts = max_attempts, "gave up waiting for consistency");
        Ok(PollOutcome::TimedOut {
            attempts: max_attempts,
            last,
        })
    }
}

/// Last-known owned-object counts, used to detect "count increased" after a write.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    counts: Mutex<HashMap<(Address, String), usize>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, owner: Address, object_type: &str) -> Option<usize> {
        self.counts
            .lock()
            .get(&(owner, object_type.to_string()))
            .copied()
    }

    pub fn record(&self, owner: Address, object_type: &str, count: usize) {
        self.counts
            .lock()
            .insert((owner, object_type.to_string()), count);
    }
}

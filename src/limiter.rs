// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Global upload interval limiter.
//!
//! One timestamp, the time of the last accepted upload, gates every
//! submission regardless of file name. Admission is exclusive: an
//! [`Admission`] holds the limiter lock until it is recorded or dropped, so
//! the read-check-write sequence cannot interleave between requests.
//!
//! The timestamp is cached in memory and written through to a
//! [`StateStore`] on every accepted upload.

use crate::config::RateLimitConfig;
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Persistence for the last accepted upload time.
pub trait StateStore: Send + Sync {
    /// Read the persisted time. `Ok(None)` means nothing was ever recorded.
    fn load(&self) -> io::Result<Option<i64>>;

    /// Overwrite the persisted time.
    fn save(&self, at: i64) -> io::Result<()>;
}

/// Timestamp stored as decimal text in a single file.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> io::Result<Option<i64>> {
        match fs::read_to_string(&self.path) {
            Ok(text) => text
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&self, at: i64) -> io::Result<()> {
        // Write-then-rename so a crash never leaves a half-written value.
        let tmp = self.temp_path();
        fs::write(&tmp, at.to_string())?;
        fs::rename(&tmp, &self.path)
    }
}

/// In-process state, for tests and single-run tooling.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    value: std::sync::Mutex<Option<i64>>,
}

impl MemoryStateStore {
    pub fn new(initial: Option<i64>) -> Self {
        Self {
            value: std::sync::Mutex::new(initial),
        }
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> io::Result<Option<i64>> {
        self.value
            .lock()
            .map(|v| *v)
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "state lock poisoned"))
    }

    fn save(&self, at: i64) -> io::Result<()> {
        let mut value = self
            .value
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "state lock poisoned"))?;
        *value = Some(at);
        Ok(())
    }
}

/// Result of an interval check.
pub enum RateLimitResult<'a> {
    /// Upload may proceed; the admission must be recorded once it succeeds.
    Allowed(Admission<'a>),
    /// Upload arrived too soon after the last accepted one
    Limited {
        /// Time until the interval has elapsed
        retry_after: Duration,
    },
}

impl RateLimitResult<'_> {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed(_))
    }
}

/// Exclusive permission to complete one upload.
///
/// Holds the limiter lock. Dropping it without [`Admission::record`] leaves
/// the last accepted time unchanged.
pub struct Admission<'a> {
    last_accepted: MutexGuard<'a, Option<i64>>,
    store: Arc<dyn StateStore>,
    now: i64,
}

impl Admission<'_> {
    /// Time the admission was granted at.
    pub fn now(&self) -> i64 {
        self.now
    }

    /// Mark the upload as accepted.
    ///
    /// The in-memory time is updated before persisting, so a failed write
    /// still throttles later requests in this process.
    pub async fn record(mut self) -> io::Result<()> {
        *self.last_accepted = Some(self.now);
        let (store, now) = (self.store.clone(), self.now);
        blocking(move || store.save(now)).await
    }
}

impl fmt::Debug for Admission<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Admission").field("now", &self.now).finish()
    }
}

/// Thread-safe global upload interval limiter.
pub struct RateLimiter {
    /// Configuration
    config: RateLimitConfig,
    /// Last accepted upload time; `None` until loaded from the store
    last_accepted: Mutex<Option<i64>>,
    /// Persistence backend
    store: Arc<dyn StateStore>,
}

impl RateLimiter {
    /// Create a limiter over the given state store.
    pub fn new(config: RateLimitConfig, store: Arc<dyn StateStore>) -> Self {
        Self {
            config,
            last_accepted: Mutex::new(None),
            store,
        }
    }

    /// Create a limiter persisting to `config.state_path`.
    pub fn with_file_state(config: RateLimitConfig) -> Self {
        let store = Arc::new(FileStateStore::new(config.state_path.clone()));
        Self::new(config, store)
    }

    /// Check whether an upload at `now` is far enough from the last one.
    ///
    /// Waits for any in-flight admission to finish first.
    pub async fn admit(&self, now: i64) -> RateLimitResult<'_> {
        let mut guard = self.last_accepted.lock().await;
        let last = match *guard {
            Some(last) => last,
            None => {
                let loaded = self.load_state().await;
                *guard = Some(loaded);
                loaded
            }
        };

        // Out-of-range intervals never elapse.
        let interval = i64::try_from(self.config.min_interval_secs).unwrap_or(i64::MAX);
        let elapsed = now.saturating_sub(last);
        if elapsed >= interval {
            debug!(now, last, "Upload interval satisfied");
            RateLimitResult::Allowed(Admission {
                last_accepted: guard,
                store: self.store.clone(),
                now,
            })
        } else {
            let wait = interval.saturating_sub(elapsed).max(0) as u64;
            debug!(now, last, wait, "Upload interval too short");
            RateLimitResult::Limited {
                retry_after: Duration::from_secs(wait),
            }
        }
    }

    /// Last accepted upload time, loading it if needed.
    pub async fn last_accepted(&self) -> i64 {
        let mut guard = self.last_accepted.lock().await;
        match *guard {
            Some(last) => last,
            None => {
                let loaded = self.load_state().await;
                *guard = Some(loaded);
                loaded
            }
        }
    }

    /// Read the persisted time; any failure counts as "never uploaded".
    async fn load_state(&self) -> i64 {
        let store = self.store.clone();
        match blocking(move || store.load()).await {
            Ok(Some(at)) => at,
            Ok(None) => 0,
            Err(e) => {
                warn!(error = %e, "Unreadable upload state, treating as never uploaded");
                0
            }
        }
    }
}

/// Run state I/O off the async workers.
async fn blocking<T, F>(f: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

//! Configuration of a [`crate::Cinder`] store.

use crate::common::{Clock, DEFAULT_AUTO_ID_LENGTH};
use crate::errors::{CinderError, CinderResult, ErrorKind};
use crate::governor::RateLimits;
use crate::store::{Backend, JournalBackend, MemoryBackend};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

/// Settings of one store instance.
///
/// Settings can be changed until the store is opened; afterwards every
/// setter fails with [`ErrorKind::InvalidConfig`]. Clones share the same
/// settings.
#[derive(Clone)]
pub struct CinderConfig {
    inner: Arc<CinderConfigInner>,
}

impl Default for CinderConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CinderConfig {
    pub fn new() -> Self {
        CinderConfig {
            inner: Arc::new(CinderConfigInner::new()),
        }
    }

    pub fn rate_limits(&self) -> RateLimits {
        self.inner.rate_limits.read().clone()
    }

    pub fn set_rate_limits(&self, limits: RateLimits) -> CinderResult<()> {
        self.inner.check_unconfigured("rate limits")?;
        if limits.window().is_zero() {
            return Err(invalid_config("Rate limit window must be longer than zero"));
        }
        *self.inner.rate_limits.write() = limits;
        Ok(())
    }

    pub fn clock(&self) -> Clock {
        self.inner.clock.read().clone()
    }

    pub fn set_clock(&self, clock: Clock) -> CinderResult<()> {
        self.inner.check_unconfigured("clock")?;
        *self.inner.clock.write() = clock;
        Ok(())
    }

    pub fn journal_path(&self) -> Option<&Path> {
        self.inner.journal_path.get().map(PathBuf::as_path)
    }

    pub fn set_journal_path<P: AsRef<Path>>(&self, path: P) -> CinderResult<()> {
        self.inner.check_unconfigured("journal path")?;
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(invalid_config("Journal path must not be empty"));
        }
        if self.inner.backend.get().is_some() {
            return Err(invalid_config("A journal cannot be used with a custom backend"));
        }
        self.inner
            .journal_path
            .set(path.to_path_buf())
            .map_err(|_| invalid_config("Journal path is already set"))
    }

    pub fn sync_writes(&self) -> bool {
        self.inner.sync_writes.load(Ordering::Relaxed)
    }

    pub fn set_sync_writes(&self, sync_writes: bool) -> CinderResult<()> {
        self.inner.check_unconfigured("sync writes")?;
        self.inner.sync_writes.store(sync_writes, Ordering::Relaxed);
        Ok(())
    }

    pub fn auto_id_length(&self) -> usize {
        self.inner.auto_id_length.load(Ordering::Relaxed)
    }

    pub fn set_auto_id_length(&self, length: usize) -> CinderResult<()> {
        self.inner.check_unconfigured("auto id length")?;
        if length == 0 {
            return Err(invalid_config("Generated document IDs need at least one character"));
        }
        self.inner.auto_id_length.store(length, Ordering::Relaxed);
        Ok(())
    }

    pub fn set_backend(&self, backend: Backend) -> CinderResult<()> {
        self.inner.check_unconfigured("backend")?;
        if self.inner.journal_path.get().is_some() {
            return Err(invalid_config("A custom backend cannot be used with a journal"));
        }
        self.inner
            .backend
            .set(backend)
            .map_err(|_| invalid_config("Backend is already set"))
    }

    /// Freezes the settings and opens the configured backend.
    pub(crate) fn open_backend(&self) -> CinderResult<Backend> {
        if self.inner.configured.swap(true, Ordering::AcqRel) {
            return Err(invalid_config("Configuration is already in use by an open store"));
        }

        if let Some(backend) = self.inner.backend.get() {
            log::info!("Opening store on a custom backend");
            return Ok(backend.clone());
        }
        match self.inner.journal_path.get() {
            Some(path) => {
                log::info!("Opening journal store at {}", path.display());
                Ok(Backend::new(JournalBackend::open(path, self.sync_writes())?))
            }
            None => {
                log::info!("Opening in-memory store");
                Ok(Backend::new(MemoryBackend::new()))
            }
        }
    }
}

fn invalid_config(message: &str) -> CinderError {
    log::error!("{}", message);
    CinderError::new(message, ErrorKind::InvalidConfig)
}

struct CinderConfigInner {
    configured: AtomicBool,
    rate_limits: RwLock<RateLimits>,
    clock: RwLock<Clock>,
    journal_path: OnceLock<PathBuf>,
    sync_writes: AtomicBool,
    auto_id_length: AtomicUsize,
    backend: OnceLock<Backend>,
}

impl CinderConfigInner {
    fn new() -> Self {
        CinderConfigInner {
            configured: AtomicBool::new(false),
            rate_limits: RwLock::new(RateLimits::default()),
            clock: RwLock::new(Clock::system()),
            journal_path: OnceLock::new(),
            sync_writes: AtomicBool::new(false),
            auto_id_length: AtomicUsize::new(DEFAULT_AUTO_ID_LENGTH),
            backend: OnceLock::new(),
        }
    }

    fn check_unconfigured(&self, setting: &str) -> CinderResult<()> {
        if self.configured.load(Ordering::Acquire) {
            return Err(invalid_config(&format!(
                "Cannot change {} after the store is opened",
                setting
            )));
        }
        Ok(())
    }
}

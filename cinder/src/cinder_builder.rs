use crate::cinder::Cinder;
use crate::cinder_config::CinderConfig;
use crate::common::Clock;
use crate::errors::{CinderError, CinderResult};
use crate::governor::RateLimits;
use crate::store::{Backend, BackendProvider};
use std::path::Path;

/// Builder for [Cinder] stores.
///
/// The first invalid setting is remembered and returned from
/// [`CinderBuilder::open`]; later settings are ignored.
///
/// ```rust
/// use cinder::governor::RateLimits;
/// use cinder::Cinder;
///
/// let db = Cinder::builder()
///     .rate_limits(RateLimits::unlimited())
///     .auto_id_length(12)
///     .open()
///     .unwrap();
/// assert!(!db.is_closed());
/// ```
#[derive(Default)]
pub struct CinderBuilder {
    error: Option<CinderError>,
    config: CinderConfig,
}

impl CinderBuilder {
    pub fn new() -> Self {
        CinderBuilder {
            error: None,
            config: CinderConfig::new(),
        }
    }

    fn apply<F>(mut self, setting: F) -> Self
    where
        F: FnOnce(&CinderConfig) -> CinderResult<()>,
    {
        if self.error.is_none() {
            if let Err(e) = setting(&self.config) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn rate_limits(self, limits: RateLimits) -> Self {
        self.apply(|config| config.set_rate_limits(limits))
    }

    pub fn clock(self, clock: Clock) -> Self {
        self.apply(|config| config.set_clock(clock))
    }

    /// Persists documents in an append-only journal at `path`.
    pub fn journal<P: AsRef<Path>>(self, path: P) -> Self {
        self.apply(|config| config.set_journal_path(path))
    }

    pub fn sync_writes(self, sync_writes: bool) -> Self {
        self.apply(|config| config.set_sync_writes(sync_writes))
    }

    pub fn auto_id_length(self, length: usize) -> Self {
        self.apply(|config| config.set_auto_id_length(length))
    }

    pub fn backend<T: BackendProvider + 'static>(self, backend: T) -> Self {
        self.apply(|config| config.set_backend(Backend::new(backend)))
    }

    pub fn open(self) -> CinderResult<Cinder> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Cinder::open(self.config)
    }
}

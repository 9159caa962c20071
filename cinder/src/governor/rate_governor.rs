use crate::common::Clock;
use crate::errors::{CinderError, CinderResult, ErrorKind};
use crate::governor::{OperationClass, RateLimits};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WindowKey {
    class: OperationClass,
    path: Option<String>,
}

impl WindowKey {
    fn new(class: OperationClass, path: Option<&str>) -> Self {
        WindowKey {
            class,
            path: if class.is_per_path() { path.map(str::to_string) } else { None },
        }
    }
}

/// Sliding-window request accounting.
///
/// Every recorded request appends the current time to its window, entries
/// older than the window length are pruned, and the request is rejected with
/// [`ErrorKind::RateLimited`] when the window then holds more requests than
/// the class ceiling. A rejected request stays in the window, so retrying
/// while limited keeps the caller limited.
///
/// Requests of a per-path class also count against the `General` window.
/// Windows that empty out are dropped, so memory follows the number of
/// recently active paths rather than every path ever seen.
///
/// This is advisory, in-process throttling. Clones share the same windows.
#[derive(Clone)]
pub struct RateGovernor {
    inner: Arc<RateGovernorInner>,
}

struct RateGovernorInner {
    limits: RateLimits,
    clock: Clock,
    windows: Mutex<Windows>,
}

#[derive(Default)]
struct Windows {
    by_key: HashMap<WindowKey, VecDeque<u64>>,
    last_sweep: u64,
}

impl RateGovernor {
    pub fn new(limits: RateLimits, clock: Clock) -> Self {
        RateGovernor {
            inner: Arc::new(RateGovernorInner {
                limits,
                clock,
                windows: Mutex::new(Windows::default()),
            }),
        }
    }

    pub fn limits(&self) -> &RateLimits {
        &self.inner.limits
    }

    pub fn clock(&self) -> &Clock {
        &self.inner.clock
    }

    /// Records one request of `class` against `path`.
    pub fn record(&self, class: OperationClass, path: Option<&str>) -> CinderResult<()> {
        self.inner.record(class, path)
    }

    /// Number of requests currently inside the window for `class` and `path`.
    pub fn usage(&self, class: OperationClass, path: Option<&str>) -> usize {
        self.inner.usage(class, path)
    }

    /// Forgets all recorded requests.
    pub fn reset(&self) {
        self.inner.windows.lock().by_key.clear();
    }
}

impl RateGovernorInner {
    fn window_millis(&self) -> u64 {
        self.limits.window().as_millis() as u64
    }

    fn prune(window: &mut VecDeque<u64>, now: u64, window_millis: u64) {
        while let Some(oldest) = window.front() {
            if now.saturating_sub(*oldest) >= window_millis {
                window.pop_front();
            } else {
                break;
            }
        }
    }

    /// Drops every window with nothing left inside it, at most once per
    /// window length.
    fn sweep(windows: &mut Windows, now: u64, window_millis: u64) {
        if now.saturating_sub(windows.last_sweep) < window_millis {
            return;
        }
        windows.by_key.retain(|_, window| {
            Self::prune(window, now, window_millis);
            !window.is_empty()
        });
        windows.last_sweep = now;
    }

    fn record(&self, class: OperationClass, path: Option<&str>) -> CinderResult<()> {
        let now = self.clock.now_millis();
        let window_millis = self.window_millis();

        let mut keys = vec![WindowKey::new(OperationClass::General, None)];
        if class != OperationClass::General {
            keys.push(WindowKey::new(class, path));
        }

        let mut windows = self.windows.lock();
        Self::sweep(&mut windows, now, window_millis);

        let mut exceeded = None;
        for key in keys {
            let Some(ceiling) = self.limits.ceiling(key.class) else {
                continue;
            };
            let window = windows.by_key.entry(key.clone()).or_default();
            window.push_back(now);
            Self::prune(window, now, window_millis);
            if window.len() > ceiling && exceeded.is_none() {
                exceeded = Some((key, ceiling));
            }
        }

        match exceeded {
            None => Ok(()),
            Some((key, ceiling)) => {
                log::warn!(
                    "Rate limit exceeded for {} on {}: {} requests per {:?}",
                    key.class,
                    key.path.as_deref().unwrap_or("<all>"),
                    ceiling,
                    self.limits.window()
                );
                Err(CinderError::new(
                    &format!(
                        "Rate limit exceeded for {} requests{}: at most {} per {} seconds",
                        key.class,
                        key.path
                            .as_deref()
                            .map(|p| format!(" on '{}'", p))
                            .unwrap_or_default(),
                        ceiling,
                        self.limits.window().as_secs()
                    ),
                    ErrorKind::RateLimited,
                ))
            }
        }
    }

    fn usage(&self, class: OperationClass, path: Option<&str>) -> usize {
        let now = self.clock.now_millis();
        let window_millis = self.window_millis();
        let mut windows = self.windows.lock();
        let key = WindowKey::new(class, path);
        let Some(window) = windows.by_key.get_mut(&key) else {
            return 0;
        };
        Self::prune(window, now, window_millis);
        let count = window.len();
        if count == 0 {
            windows.by_key.remove(&key);
        }
        count
    }

    #[cfg(test)]
    fn tracked_windows(&self) -> usize {
        self.windows.lock().by_key.len()
    }
}

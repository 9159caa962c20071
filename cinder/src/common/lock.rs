use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use itertools::Itertools;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Registry of named mutexes used to serialize writes per document path.
///
/// Writers on the same path queue behind one another, each observing the
/// previous writer's committed result. Writers on distinct paths never
/// contend. An entry exists only while some [LockHandle] for its name is
/// alive; the last handle to drop removes it.
///
/// # Examples
///
/// ```
/// use cinder::common::LockRegistry;
///
/// let registry = LockRegistry::new();
/// let handle = registry.get_lock("users/u1");
/// {
///     let _guard = handle.lock();
/// } // the path is released when the guard drops
/// drop(handle);
/// assert!(registry.is_empty());
/// ```
#[derive(Clone, Default)]
pub struct LockRegistry {
    locks: Arc<DashMap<String, LockEntry>>,
}

struct LockEntry {
    lock: Arc<Mutex<()>>,
    holders: usize,
}

/// A handle to one path's mutex.
pub struct LockHandle {
    name: String,
    lock: Arc<Mutex<()>>,
    locks: Arc<DashMap<String, LockEntry>>,
}

impl LockHandle {
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock()
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        // holder counts change only under the shard lock of the entry
        if let Entry::Occupied(mut entry) = self.locks.entry(self.name.clone()) {
            let holders = entry.get().holders.saturating_sub(1);
            if holders == 0 {
                entry.remove();
            } else {
                entry.get_mut().holders = holders;
            }
        }
    }
}

impl LockRegistry {
    pub fn new() -> Self {
        LockRegistry {
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Gets the lock for `name`, creating it if needed.
    pub fn get_lock(&self, name: &str) -> LockHandle {
        let mut entry = self
            .locks
            .entry(name.to_string())
            .or_insert_with(|| LockEntry {
                lock: Arc::new(Mutex::new(())),
                holders: 0,
            });
        entry.holders += 1;
        let lock = entry.lock.clone();
        drop(entry);

        LockHandle {
            name: name.to_string(),
            lock,
            locks: self.locks.clone(),
        }
    }

    /// Gets the locks for several names in a deadlock-free acquisition order.
    ///
    /// Names are deduplicated and sorted, so two callers locking overlapping
    /// sets always acquire in the same order.
    pub fn get_locks<'a, I>(&self, names: I) -> Vec<LockHandle>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .sorted()
            .dedup()
            .map(|name| self.get_lock(name))
            .collect()
    }

    /// Number of names currently held by at least one handle.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

//! In-process lock table that serializes mutations per entity.
//!
//! Keys are acquired in ascending [`EntityKey`] order. Acquiring a key that
//! sorts below one already held is a bug and fails with
//! `GameError::InvariantViolation` instead of risking a deadlock.

use std::collections::BTreeSet;

use log::error;
use parking_lot::{Condvar, Mutex};

use crate::game::errors::{GameError, GameResult};

/// Lockable entities, declared in hierarchy order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKey {
    Player(i64),
    /// Serializes gang creation so names and tags stay unique.
    GangNames,
    Gang(u64),
    Territory(u32),
    Listing(u64),
    Heist(u64),
    War(u64),
    Boss(u64),
    Payment(String),
}

#[derive(Debug, Default)]
pub struct EntityLocks {
    busy: Mutex<BTreeSet<EntityKey>>,
    released: Condvar,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an empty lock set against this table.
    pub fn set(&self) -> LockSet<'_> {
        LockSet {
            table: self,
            held: Vec::new(),
        }
    }

    /// Convenience for acquiring several keys at once; they are sorted first.
    pub fn acquire_all(&self, mut keys: Vec<EntityKey>) -> GameResult<LockSet<'_>> {
        keys.sort();
        keys.dedup();
        let mut set = self.set();
        for key in keys {
            set.acquire(key)?;
        }
        Ok(set)
    }

    #[cfg(test)]
    fn is_busy(&self, key: &EntityKey) -> bool {
        self.busy.lock().contains(key)
    }
}

/// Keys held by one operation; released together on drop.
pub struct LockSet<'a> {
    table: &'a EntityLocks,
    held: Vec<EntityKey>,
}

impl<'a> LockSet<'a> {
    pub fn acquire(&mut self, key: EntityKey) -> GameResult<()> {
        if self.held.contains(&key) {
            return Ok(());
        }
        if let Some(last) = self.held.last() {
            if key < *last {
                error!("lock order violation: {:?} requested after {:?}", key, last);
                return Err(GameError::InvariantViolation(format!(
                    "lock order violation: {:?} after {:?}",
                    key, last
                )));
            }
        }
        let mut busy = self.table.busy.lock();
        while busy.contains(&key) {
            self.table.released.wait(&mut busy);
        }
        busy.insert(key.clone());
        self.held.push(key);
        Ok(())
    }

    pub fn holds(&self, key: &EntityKey) -> bool {
        self.held.contains(key)
    }
}

impl Drop for LockSet<'_> {
    fn drop(&mut self) {
        if self.held.is_empty() {
            return;
        }
        let mut busy = self.table.busy.lock();
        for key in self.held.drain(..) {
            busy.remove(&key);
        }
        drop(busy);
        self.table.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn descending_acquire_is_rejected() {
        let locks = EntityLocks::new();
        let mut set = locks.set();
        set.acquire(EntityKey::Gang(5)).unwrap();
        let err = set.acquire(EntityKey::Player(1)).unwrap_err();
        assert!(matches!(err, GameError::InvariantViolation(_)));
    }

    #[test]
    fn reacquire_is_a_no_op() {
        let locks = EntityLocks::new();
        let mut set = locks.set();
        set.acquire(EntityKey::Player(1)).unwrap();
        set.acquire(EntityKey::Player(1)).unwrap();
        assert!(set.holds(&EntityKey::Player(1)));
    }

    #[test]
    fn drop_releases_keys() {
        let locks = EntityLocks::new();
        {
            let _set = locks
                .acquire_all(vec![EntityKey::War(1), EntityKey::Player(3)])
                .unwrap();
            assert!(locks.is_busy(&EntityKey::Player(3)));
        }
        assert!(!locks.is_busy(&EntityKey::Player(3)));
        assert!(!locks.is_busy(&EntityKey::War(1)));
    }

    #[test]
    fn contended_key_serializes_critical_sections() {
        let locks = Arc::new(EntityLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let inside = inside.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..50 {
                    let _set = locks.acquire_all(vec![EntityKey::Player(1)]).unwrap();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
    }
}

//! # IDs
//! Documents, layers and tags are referred to by process-unique IDs namespaced by a marker type,
//! `UniqueID<T>`. Two IDs of different namespaces never compare equal, as they are different types.
//!
//! IDs are never reused within one execution. They carry no ordering, compare them only for equality.

use std::sync::atomic::{AtomicU64, Ordering};

// Next available ID per namespace. Namespaces are created lazily, which only happens a handful of times
// during the life of the program, so the upgradable read is nearly always the only lock taken.
static ID_SERVER: parking_lot::RwLock<
    std::collections::BTreeMap<std::any::TypeId, AtomicU64>,
> = parking_lot::const_rwlock(std::collections::BTreeMap::new());

pub struct UniqueID<T: std::any::Any> {
    id: std::num::NonZeroU64,
    _namespace: std::marker::PhantomData<fn() -> T>,
}
impl<T: std::any::Any> Clone for UniqueID<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T: std::any::Any> Copy for UniqueID<T> {}
impl<T: std::any::Any> PartialEq for UniqueID<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl<T: std::any::Any> Eq for UniqueID<T> {}
impl<T: std::any::Any> std::hash::Hash for UniqueID<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T: std::any::Any> UniqueID<T> {
    /// Raw numeric value. IDs of different namespaces may share a value!
    #[must_use]
    pub fn get(&self) -> u64 {
        self.id.get()
    }
    /// Reserve `count` IDs with a single atomic operation.
    ///
    /// Exhausting the namespace is unrecoverable: the process aborts (panics, under test) rather than
    /// handing out a duplicate.
    pub fn many(count: usize) -> impl ExactSizeIterator<Item = Self> {
        let count_u64 = count as u64;
        let ty = std::any::TypeId::of::<T>();

        let start = {
            let read = ID_SERVER.upgradable_read();
            if let Some(next) = read.get(&ty) {
                next.fetch_add(count_u64, Ordering::Relaxed)
            } else {
                let mut write = parking_lot::RwLockUpgradableReadGuard::upgrade(read);
                // Another thread may have created the namespace between our read and upgrade.
                write
                    .entry(ty)
                    .or_insert_with(|| AtomicU64::new(1))
                    .fetch_add(count_u64, Ordering::Relaxed)
            }
        };

        let start = match std::num::NonZeroU64::new(start) {
            Some(start) if start.get().checked_add(count_u64).is_some() => start,
            _ => {
                #[cfg(not(test))]
                {
                    log::error!("{} ID overflow! Aborting!", std::any::type_name::<T>());
                    log::logger().flush();
                    std::process::abort();
                }
                #[cfg(test)]
                {
                    panic!("{} ID overflow! Aborting!", std::any::type_name::<T>())
                }
            }
        };

        (0..count).map(move |idx| Self {
            id: start.saturating_add(idx as u64),
            _namespace: std::marker::PhantomData,
        })
    }
}
impl<T: std::any::Any> Default for UniqueID<T> {
    fn default() -> Self {
        let mut ids = Self::many(1);
        match ids.next() {
            Some(id) => id,
            // `many(1)` always yields exactly one, or aborted already.
            None => unreachable!(),
        }
    }
}
impl<T: std::any::Any> std::fmt::Display for UniqueID<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = std::any::type_name::<T>();
        let short = name.rsplit("::").next().unwrap_or(name);
        write!(f, "{short}#{}", self.id)
    }
}
impl<T: std::any::Any> std::fmt::Debug for UniqueID<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

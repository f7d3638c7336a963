use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A lock shared by every job a pool runs.
///
/// The pool never takes the lock itself. It only hands `&L` to each job,
/// and jobs decide whether and how to hold it. Releasing happens when the
/// returned guard is dropped.
///
/// Poisoned std locks are recovered rather than propagated, so one job
/// panicking while holding the lock does not fail every later job.
pub trait Locker: Send + Sync + 'static {
    /// Guard that holds the lock exclusively until dropped.
    type Guard<'a>
    where
        Self: 'a;

    /// Acquires the lock exclusively, blocking until it is available.
    fn lock(&self) -> Self::Guard<'_>;
}

/// A [`Locker`] that also supports shared (read) acquisition.
pub trait SharedLocker: Locker {
    /// Guard that holds the lock in shared mode until dropped.
    type ReadGuard<'a>
    where
        Self: 'a;

    /// Acquires the lock in shared mode, blocking while a writer holds it.
    fn read(&self) -> Self::ReadGuard<'_>;
}

impl<T: Send + 'static> Locker for Mutex<T> {
    type Guard<'a> = MutexGuard<'a, T>;

    fn lock(&self) -> MutexGuard<'_, T> {
        Mutex::lock(self).unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Send + Sync + 'static> Locker for RwLock<T> {
    type Guard<'a> = RwLockWriteGuard<'a, T>;

    fn lock(&self) -> RwLockWriteGuard<'_, T> {
        RwLock::write(self).unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Send + Sync + 'static> SharedLocker for RwLock<T> {
    type ReadGuard<'a> = RwLockReadGuard<'a, T>;

    fn read(&self) -> RwLockReadGuard<'_, T> {
        RwLock::read(self).unwrap_or_else(PoisonError::into_inner)
    }
}

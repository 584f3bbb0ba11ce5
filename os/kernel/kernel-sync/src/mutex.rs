use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// The lock word behind a [`Mutex`].
///
/// # Safety
/// A successful [`lock`](Self::lock) or [`try_lock`](Self::try_lock) must
/// exclude every other holder until [`unlock`](Self::unlock), with acquire
/// and release ordering respectively.
pub unsafe trait RawLock {
    fn lock(&self);
    fn try_lock(&self) -> bool;

    /// # Safety
    /// The caller must hold the lock.
    unsafe fn unlock(&self);
}

/// Test-and-test-and-set spin lock.
#[derive(Debug, Default)]
pub struct RawSpin {
    held: AtomicBool,
}

impl RawSpin {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }
}

unsafe impl RawLock for RawSpin {
    #[inline]
    fn lock(&self) {
        while self.held.swap(true, Ordering::Acquire) {
            // Read-only spin keeps the cache line shared until release.
            while self.held.load(Ordering::Relaxed) {
                spin_loop();
            }
        }
    }

    #[inline]
    fn try_lock(&self) -> bool {
        !self.held.swap(true, Ordering::Acquire)
    }

    #[inline]
    unsafe fn unlock(&self) {
        self.held.store(false, Ordering::Release);
    }
}

/// A value guarded by a [`RawLock`].
pub struct Mutex<T, R> {
    raw: R,
    value: UnsafeCell<T>,
}

// SAFETY: the raw lock serializes every access to `value`.
unsafe impl<T: Send, R: Sync> Sync for Mutex<T, R> {}
unsafe impl<T: Send, R: Send> Send for Mutex<T, R> {}

impl<T, R> Mutex<T, R> {
    pub const fn from_raw(raw: R, value: T) -> Self {
        Self {
            raw,
            value: UnsafeCell::new(value),
        }
    }

    /// Direct access through an exclusive borrow; no locking needed.
    #[inline]
    pub const fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }
}

impl<T, R: RawLock> Mutex<T, R> {
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T, R> {
        self.raw.lock();
        MutexGuard { mutex: self }
    }

    #[inline]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T, R>> {
        self.raw.try_lock().then(|| MutexGuard { mutex: self })
    }
}

/// Releases the lock on drop.
pub struct MutexGuard<'a, T, R: RawLock> {
    mutex: &'a Mutex<T, R>,
}

impl<T, R: RawLock> Deref for MutexGuard<'_, T, R> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard holds the lock.
        unsafe { &*self.mutex.value.get() }
    }
}

impl<T, R: RawLock> DerefMut for MutexGuard<'_, T, R> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard holds the lock, and `&mut self` is unique.
        unsafe { &mut *self.mutex.value.get() }
    }
}

impl<T, R: RawLock> Drop for MutexGuard<'_, T, R> {
    fn drop(&mut self) {
        // SAFETY: the guard was created by a successful lock.
        unsafe { self.mutex.raw.unlock() }
    }
}

use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicU8, Ordering};

const EMPTY: u8 = 0;
const BUSY: u8 = 1;
const FULL: u8 = 2;

/// A value written at most once, usable from a `static`.
///
/// Concurrent initializers race for the slot; the losers spin until the
/// winner has published its value.
pub struct SyncOnceCell<T> {
    state: AtomicU8,
    slot: UnsafeCell<MaybeUninit<T>>,
}

// SAFETY: the slot is written once before `FULL` is published and only read
// afterwards.
unsafe impl<T: Sync + Send> Sync for SyncOnceCell<T> {}
unsafe impl<T: Send> Send for SyncOnceCell<T> {}

impl<T> Default for SyncOnceCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SyncOnceCell<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            slot: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    #[inline]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: `FULL` is stored with release ordering after the write.
        (self.state.load(Ordering::Acquire) == FULL).then(|| unsafe { self.read() })
    }

    /// The stored value, running `init` first if the cell is empty.
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> &T {
        if let Some(value) = self.get() {
            return value;
        }

        match self
            .state
            .compare_exchange(EMPTY, BUSY, Ordering::Acquire, Ordering::Acquire)
        {
            Ok(_) => {
                // SAFETY: winning the exchange makes this the only writer.
                unsafe { (*self.slot.get()).write(init()) };
                self.state.store(FULL, Ordering::Release);
            }
            Err(_) => {
                while self.state.load(Ordering::Acquire) != FULL {
                    spin_loop();
                }
            }
        }

        // SAFETY: the state is `FULL` on both paths.
        unsafe { self.read() }
    }

    /// # Safety
    /// The state must be `FULL`.
    unsafe fn read(&self) -> &T {
        unsafe { (*self.slot.get()).assume_init_ref() }
    }
}

impl<T> Drop for SyncOnceCell<T> {
    fn drop(&mut self) {
        if *self.state.get_mut() == FULL {
            // SAFETY: `FULL` means the slot holds a value.
            unsafe { self.slot.get_mut().assume_init_drop() };
        }
    }
}

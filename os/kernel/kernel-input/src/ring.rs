use core::marker::PhantomData;
use core::mem::MaybeUninit;
use kernel_sync::{CpuInterrupts, InterruptMask, SpinMutex};

struct Ring<T, const N: usize> {
    slots: [MaybeUninit<T>; N],
    /// Index of the oldest entry.
    start: usize,
    /// Index the next push writes to.
    end: usize,
    len: usize,
}

/// A fixed-capacity FIFO shared between an interrupt producer and a polling
/// consumer.
///
/// Invariants: `len <= N`; `start` and `end` are always `< N`; the occupied
/// slots are `start, start + 1, ..` (mod `N`) for `len` entries, and
/// `end == (start + len) % N`.
///
/// Every operation runs under `M`'s critical section wrapped around a spin
/// lock. On a single core the lock is never contended, since the masked
/// section cannot be preempted by the producer.
pub struct RingBuffer<T: Copy, const N: usize, M: InterruptMask = CpuInterrupts> {
    state: SpinMutex<Ring<T, N>>,
    _mask: PhantomData<fn() -> M>,
}

impl<T: Copy, const N: usize, M: InterruptMask> Default for RingBuffer<T, N, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy, const N: usize, M: InterruptMask> RingBuffer<T, N, M> {
    #[must_use]
    pub const fn new() -> Self {
        const { assert!(N > 0, "ring buffer capacity must be non-zero") };
        Self {
            state: SpinMutex::new(Ring {
                slots: [const { MaybeUninit::uninit() }; N],
                start: 0,
                end: 0,
                len: 0,
            }),
            _mask: PhantomData,
        }
    }

    /// Appends `event`, evicting the oldest entry if the buffer is full.
    pub fn push(&self, event: T) {
        let mut r = self.state.lock_masked::<M>();
        if r.len == N {
            r.start = (r.start + 1) % N;
            r.len -= 1;
        }
        let end = r.end;
        r.slots[end].write(event);
        r.end = (end + 1) % N;
        r.len += 1;
    }

    /// Moves the oldest entry into `event`.
    ///
    /// Returns `false` and leaves `event` untouched if the buffer is empty.
    pub fn pop(&self, event: &mut T) -> bool {
        match self.try_pop() {
            Some(e) => {
                *event = e;
                true
            }
            None => false,
        }
    }

    /// Removes and returns the oldest entry.
    pub fn try_pop(&self) -> Option<T> {
        let mut r = self.state.lock_masked::<M>();
        if r.len == 0 {
            return None;
        }
        let start = r.start;
        // SAFETY: `start` is within the occupied window, which only holds
        // slots written by `push`.
        let event = unsafe { r.slots[start].assume_init() };
        r.start = (start + 1) % N;
        r.len -= 1;
        Some(event)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock_masked::<M>().len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Drops all queued entries.
    pub fn clear(&self) {
        let mut r = self.state.lock_masked::<M>();
        r.start = 0;
        r.end = 0;
        r.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    thread_local! {
        static ENABLED: Cell<bool> = const { Cell::new(true) };
        static SECTIONS: Cell<usize> = const { Cell::new(0) };
    }

    struct TestMask;

    impl InterruptMask for TestMask {
        fn save_and_disable() -> bool {
            SECTIONS.with(|c| c.set(c.get() + 1));
            ENABLED.with(|e| e.replace(false))
        }

        fn restore(were_enabled: bool) {
            if were_enabled {
                ENABLED.with(|e| e.set(true));
            }
        }
    }

    type Ring4 = RingBuffer<u32, 4, TestMask>;

    fn drain(ring: &Ring4) -> Vec<u32> {
        core::iter::from_fn(|| ring.try_pop()).collect()
    }

    #[test]
    fn starts_empty() {
        let ring = Ring4::new();
        assert_eq!(ring.len(), 0);
        assert!(ring.is_empty());
        assert_eq!(ring.capacity(), 4);
    }

    #[test]
    fn pop_on_empty_leaves_target_untouched() {
        let ring = Ring4::new();
        let mut out = 0xDEAD;
        assert!(!ring.pop(&mut out));
        assert_eq!(out, 0xDEAD);
        assert_eq!(ring.len(), 0);
    }

    #[test]
    fn fifo_below_capacity() {
        let ring = Ring4::new();
        ring.push(1);
        ring.push(2);
        ring.push(3);
        assert_eq!(ring.len(), 3);

        let mut out = 0;
        assert!(ring.pop(&mut out));
        assert_eq!(out, 1);
        assert_eq!(drain(&ring), vec![2, 3]);
        assert_eq!(ring.len(), 0);
    }

    #[test]
    fn overflow_keeps_the_newest_capacity_entries() {
        for pushes in 4..=11_u32 {
            let ring = Ring4::new();
            for v in 0..pushes {
                ring.push(v);
            }
            assert_eq!(ring.len(), 4);
            let expected: Vec<u32> = (pushes - 4..pushes).collect();
            assert_eq!(drain(&ring), expected, "after {pushes} pushes");
            assert!(ring.is_empty());
        }
    }

    #[test]
    fn interleaved_push_pop_wraps_indices() {
        let ring = Ring4::new();
        let mut next = 0;
        let mut expected = 0;
        for _ in 0..10 {
            ring.push(next);
            ring.push(next + 1);
            next += 2;
            assert_eq!(ring.try_pop(), Some(expected));
            expected += 1;
        }
        // 20 pushed, 10 popped, capacity 4: only the last four survive.
        assert_eq!(drain(&ring), vec![16, 17, 18, 19]);
    }

    #[test]
    fn clear_empties_the_buffer() {
        let ring = Ring4::new();
        ring.push(9);
        ring.push(8);
        ring.clear();
        assert!(ring.is_empty());
        ring.push(7);
        assert_eq!(drain(&ring), vec![7]);
    }

    #[test]
    fn every_operation_runs_masked() {
        let ring = Ring4::new();
        let before = SECTIONS.with(Cell::get);
        ring.push(1);
        let _ = ring.try_pop();
        let _ = ring.len();
        assert_eq!(SECTIONS.with(Cell::get) - before, 3);
        assert!(ENABLED.with(Cell::get), "mask restored after each operation");
    }

    #[test]
    fn producer_and_consumer_threads_preserve_order() {
        use std::sync::Arc;

        let ring = Arc::new(RingBuffer::<u32, 1024, TestMask>::new());
        let producer = {
            let ring = Arc::clone(&ring);
            std::thread::spawn(move || {
                for v in 0..512 {
                    ring.push(v);
                }
            })
        };

        let mut seen = Vec::new();
        while seen.len() < 512 {
            if let Some(v) = ring.try_pop() {
                seen.push(v);
            }
        }
        producer.join().unwrap();

        // Capacity exceeds the push count, so nothing is evicted.
        assert_eq!(seen, (0..512).collect::<Vec<_>>());
    }
}

//! # Tick Counter
//!
//! The system clock: one counter advanced by the boot processor on every timer
//! interrupt. Sleepers wait on [`Ticks::channel`]; each advance wakes all of them
//! while the lock is still held, so a sleeper that checked the count under the
//! same lock cannot miss the wakeup.

use spin::Mutex;

use crate::platform::Platform;

/// Identity sleepers block on; wakeups name the same identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaitChannel(pub usize);

impl WaitChannel {
    pub fn of<T>(object: &T) -> Self {
        WaitChannel(object as *const T as usize)
    }
}

pub struct Ticks {
    count: Mutex<u64>,
}

impl Ticks {
    pub const fn new() -> Self {
        Self { count: Mutex::new(0) }
    }

    pub fn channel(&self) -> WaitChannel {
        WaitChannel::of(self)
    }

    /// Increment and broadcast under the lock. Returns the new count.
    pub fn advance<P: Platform + ?Sized>(&self, platform: &P) -> u64 {
        let mut count = self.count.lock();
        *count = count.wrapping_add(1);
        platform.wakeup(self.channel());
        *count
    }

    pub fn now(&self) -> u64 {
        *self.count.lock()
    }
}

impl Default for Ticks {
    fn default() -> Self {
        Self::new()
    }
}

/// The kernel's clock; lives for the lifetime of the system.
pub static TICKS: Ticks = Ticks::new();

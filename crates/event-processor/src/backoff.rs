use std::hint;
use std::thread;

/// Exponential backoff for callers retrying a transient ring failure.
///
/// The ring never waits on its own: `reserve` reports `Full` and `consume`
/// reports `None`, and it is up to the caller how to wait before trying
/// again. `snooze` doubles the number of `PAUSE` hints per call up to
/// `2^SPIN_LIMIT`, then falls back to yielding the thread. It never parks
/// and never gives up; [`is_completed`](Self::is_completed) only tells the
/// caller that spinning has stopped paying off.
#[derive(Debug, Default)]
pub struct Backoff {
    step: u32,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6; // 2^6 = 64 spins max before yielding
    const YIELD_LIMIT: u32 = 10;

    #[inline]
    pub fn new() -> Self {
        Self { step: 0 }
    }

    /// Busy-wait `2^step` pause hints, for short CAS conflicts.
    #[inline]
    pub fn spin(&mut self) {
        for _ in 0..1u32 << self.step.min(Self::SPIN_LIMIT) {
            hint::spin_loop();
        }
        if self.step <= Self::SPIN_LIMIT {
            self.step += 1;
        }
    }

    /// Spin while that is cheap, then yield to the scheduler.
    #[inline]
    pub fn snooze(&mut self) {
        if self.step <= Self::SPIN_LIMIT {
            self.spin();
        } else {
            thread::yield_now();
            if self.step <= Self::YIELD_LIMIT {
                self.step += 1;
            }
        }
    }

    /// True once the caller has been yielding for a while; a hint to switch
    /// to a coarser wait such as sleeping.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.step > Self::YIELD_LIMIT
    }

    /// Start over after a successful operation.
    #[inline]
    pub fn reset(&mut self) {
        self.step = 0;
    }
}

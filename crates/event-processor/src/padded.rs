//! Cache-line padded storage cell.
//!
//! Every slot of the ring and every commit marker lives in its own
//! [`Padded`] cell so that producers writing adjacent slots never share a
//! cache line. The line size is a build-time constant rather than a
//! platform query; the assertions at the bottom of this module fail the
//! build if the layout ever drifts from it.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::AtomicI64;

/// Assumed size of a destructive-interference cache line, in bytes.
///
/// Must match the `align` in [`Padded`]'s `repr`.
pub const CACHE_LINE_SIZE: usize = 64;

/// A value aligned and padded to [`CACHE_LINE_SIZE`].
///
/// For any `T` no larger than a cache line the cell is exactly one line
/// wide. Larger values span a whole number of lines, which still keeps
/// neighbouring cells apart but no longer one-slot-per-line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(C, align(64))]
pub struct Padded<T> {
    value: T,
}

impl<T> Padded<T> {
    /// Wraps `value` in its own cache line.
    #[inline]
    pub const fn new(value: T) -> Self {
        Self { value }
    }

    /// Unwraps the value.
    #[inline]
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> From<T> for Padded<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T> Deref for Padded<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Padded<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

const _: () = {
    use std::mem::{align_of, size_of};
    assert!(align_of::<Padded<u8>>() == CACHE_LINE_SIZE);
    assert!(size_of::<Padded<i64>>() == CACHE_LINE_SIZE);
    assert!(size_of::<Padded<AtomicI64>>() == CACHE_LINE_SIZE);
};

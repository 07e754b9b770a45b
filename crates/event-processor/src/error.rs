//! Error types for ring operations.

use thiserror::Error;

/// Reasons a reservation can fail.
///
/// `Full` is backpressure and is expected to happen often under load; the
/// caller retries once consumers catch up. The other variants are caller
/// configuration errors that no amount of retrying will fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReserveError {
    /// A reservation must cover at least one slot.
    #[error("cannot reserve zero slots")]
    ZeroCount,

    /// The request is larger than the ring and can never be satisfied.
    #[error("cannot reserve {requested} slots, ring capacity is {capacity}")]
    ExceedsCapacity {
        /// Number of slots requested.
        requested: usize,
        /// Ring capacity.
        capacity: usize,
    },

    /// Not enough free slots right now.
    #[error("ring buffer is full")]
    Full,
}

impl ReserveError {
    /// Returns `true` if retrying later may succeed.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Full)
    }
}

/// Error returned by [`EventRing::try_push`](crate::EventRing::try_push).
///
/// Hands the rejected payload back so it is not lost.
#[derive(Debug, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct PushError<E> {
    /// The payload that was not enqueued.
    pub item: E,
    /// Why the push failed.
    pub reason: ReserveError,
}

impl<E> PushError<E> {
    /// Consumes the error, returning the rejected payload.
    pub fn into_inner(self) -> E {
        self.item
    }
}

use crate::{EventRing, Sequence};
use std::mem::MaybeUninit;
use std::ops::Range;

/// Exclusive write access to a reserved batch of slots.
///
/// Obtained from [`EventRing::try_reserve`]. The producer fills every slot
/// in [`sequences()`](Self::sequences), then commits. The batch may wrap
/// around the end of the ring, so slots are addressed by sequence number
/// rather than handed out as one slice.
///
/// A reservation that is dropped without committing is never published and
/// the commit frontier can not pass it, so every consumer stalls at its
/// first sequence number.
///
/// # Example
///
/// ```
/// use event_processor::EventRing;
///
/// let ring = EventRing::<u64>::with_capacity_exp(4).unwrap();
/// let mut reservation = ring.try_reserve(3).unwrap();
/// for sn in reservation.sequences() {
///     reservation.write(sn, sn as u64 * 10);
/// }
/// // SAFETY: every slot was written above.
/// unsafe { reservation.commit() };
///
/// assert_eq!(ring.consume(), Some(0));
/// assert_eq!(ring.consume(), Some(10));
/// ```
#[must_use = "an uncommitted reservation stalls every consumer"]
pub struct Reservation<'a, E> {
    ring: &'a EventRing<E>,
    sequence: Sequence,
    len: usize,
}

impl<'a, E> Reservation<'a, E> {
    pub(crate) fn new(ring: &'a EventRing<E>, sequence: Sequence, len: usize) -> Self {
        Self {
            ring,
            sequence,
            len,
        }
    }

    /// First sequence number of the batch.
    #[inline]
    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    /// Number of reserved slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always `false`: empty reservations are rejected by the ring.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The reserved half-open range `[sequence, sequence + len)`.
    #[inline]
    pub fn sequences(&self) -> Range<Sequence> {
        self.sequence..self.sequence + self.len as i64
    }

    /// Slot for `sn`.
    ///
    /// # Panics
    ///
    /// Panics if `sn` is outside [`sequences()`](Self::sequences).
    #[inline]
    pub fn element_at(&mut self, sn: Sequence) -> &mut MaybeUninit<E> {
        let range = self.sequences();
        assert!(
            range.contains(&sn),
            "sequence {} outside reservation [{}, {})",
            sn,
            range.start,
            range.end
        );
        // SAFETY: sn is inside our reservation, and `&mut self` rules out a
        // second live reference to the slot.
        unsafe { self.ring.element_at(sn) }
    }

    /// Writes `value` into the slot for `sn`.
    ///
    /// Writing the same slot twice leaks the first value.
    #[inline]
    pub fn write(&mut self, sn: Sequence, value: E) -> &mut E {
        self.element_at(sn).write(value)
    }

    /// Publishes every slot of the batch.
    ///
    /// # Safety
    ///
    /// Every slot in [`sequences()`](Self::sequences) must have been
    /// initialized, through [`write`](Self::write) or
    /// [`element_at`](Self::element_at).
    pub unsafe fn commit(self) {
        self.ring.commit(self.len, self.sequence);
    }

    /// Fills slot `sn` with `produce(sn)` for the whole batch, then commits.
    ///
    /// Returns the first sequence number. If `produce` panics the batch is
    /// never published.
    pub fn commit_with<F>(mut self, mut produce: F) -> Sequence
    where
        F: FnMut(Sequence) -> E,
    {
        for sn in self.sequences() {
            self.write(sn, produce(sn));
        }
        let sequence = self.sequence;
        // SAFETY: the loop above initialized every slot.
        unsafe { self.commit() };
        sequence
    }
}

impl<E> std::fmt::Debug for Reservation<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reservation")
            .field("sequence", &self.sequence)
            .field("len", &self.len)
            .finish()
    }
}

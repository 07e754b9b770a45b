use crate::invariants::{debug_assert_bounded_outstanding, debug_assert_counters_ordered};
use crate::{Config, ConfigError, Metrics, MetricsSnapshot, Padded, PushError, Reservation, ReserveError};
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{fence, AtomicI64, Ordering};

/// Sequence number of an event. Unbounded, maps to a slot by masking.
pub type Sequence = i64;

/// Marker value for a slot that is not committed (or already absorbed).
const UNCOMMITTED: Sequence = -1;

// =============================================================================
// MEMORY ORDERING & SYNCHRONIZATION STRATEGY
// =============================================================================
//
// Three monotonic i64 counters and one marker per slot:
//
//   consume_sn <= commit_sn <= reserve_sn,   reserve_sn - consume_sn <= C
//
// ## Reserve (any producer)
//
// 1. Load `reserve_sn` (Relaxed) and `consume_sn` (Acquire). The Acquire
//    pairs with the consumer's AcqRel CAS so the consumer's copy of the
//    previous generation happens-before we overwrite the slot.
// 2. Reject if fewer than `count` slots are free.
// 3. CAS `reserve_sn += count` (Acquire). Winning grants exclusive write
//    ownership of `[sn, sn + count)`.
//
// ## Write
//
// Plain writes through `element_at`. Nobody else touches those slots until
// their markers are published.
//
// ## Commit (the owning producer, then anyone)
//
// 1. Store `marker[idx(s)] = s` (Release) for every owned `s`.
// 2. SeqCst fence, then walk the frontier: CAS `marker[idx(commit_sn)]` from
//    `commit_sn` to UNCOMMITTED (Acquire), store `commit_sn + 1` (Release),
//    SeqCst fence, repeat. Stop at the first marker that is not set.
//
//    The Acquire on the marker CAS makes the committing producer's payload
//    writes visible to whichever thread absorbs the slot, and the Release
//    store of `commit_sn` passes them on to consumers.
//
//    The fences close a store-buffering window: a producer publishing its
//    marker right after another thread gave up on that marker must observe
//    the frontier that thread stored (or the other thread must observe the
//    marker). Without them the frontier can stall with a committed slot in
//    front of it.
//
//    Markers hold full sequence numbers, not flags, so a stale walker can
//    never absorb a slot from a different generation.
//
// ## Consume (any consumer)
//
// 1. Load `commit_sn` (Acquire) and `consume_sn` (Relaxed). Nothing to do
//    unless `consume_sn < commit_sn`.
// 2. Copy the slot out *before* advancing. Once `consume_sn` moves past it a
//    producer may reserve and overwrite the slot.
// 3. CAS `consume_sn += 1` (AcqRel). On failure another consumer took this
//    sequence: the copy is discarded unread and the whole read-then-advance
//    sequence restarts.
//
//    The copy in step 2 is optimistic, like a seqlock read: if we lost the
//    race the slot may be concurrently rewritten, so it is read with
//    `read_volatile` into a `MaybeUninit` and only assumed initialized after
//    the CAS proves no one else advanced past it.
//
// =============================================================================

/// Bounded lock-free multi-producer multi-consumer event ring.
///
/// Producers reserve a contiguous batch of sequence numbers, fill the slots,
/// then commit. Commits may finish in any order; consumers only see events
/// up to the first gap, so consumption order is always sequence order.
///
/// Every operation either completes or reports a transient failure
/// immediately. Waiting is left to the caller (see [`Backoff`](crate::Backoff)).
#[repr(C)]
pub struct EventRing<E> {
    // === PRODUCER HOT ===
    /// Next sequence number not yet handed to any producer
    reserve_sn: CachePadded<AtomicI64>,
    /// Exclusive upper bound of the contiguous committed run
    commit_sn: CachePadded<AtomicI64>,

    // === CONSUMER HOT ===
    /// Next sequence number a consumer will take
    consume_sn: CachePadded<AtomicI64>,

    // === COLD STATE ===
    metrics: Metrics,
    config: Config,

    // === DATA ===
    /// Payload slots. A slot is initialized between its write and its consume.
    slots: Box<[Padded<UnsafeCell<MaybeUninit<E>>>]>,
    /// Per-slot commit markers: the committing sequence number or UNCOMMITTED.
    commits: Box<[Padded<AtomicI64>]>,
}

// Safety: payloads are moved in by one producer and out by one consumer, with
// ownership handed over through the counters. Sharing the ring only ever
// moves `E` between threads, it never shares `&E`.
unsafe impl<E: Send> Send for EventRing<E> {}
unsafe impl<E: Send> Sync for EventRing<E> {}

impl<E> EventRing<E> {
    /// Creates a ring with `config.capacity()` slots.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let capacity = config.capacity();

        let slots = (0..capacity)
            .map(|_| Padded::new(UnsafeCell::new(MaybeUninit::uninit())))
            .collect();

        // Every marker starts as UNCOMMITTED. Slot 0 is the one that matters:
        // with a 0 there the first commit would absorb sequence 0 before its
        // producer committed it.
        let commits = (0..capacity)
            .map(|_| Padded::new(AtomicI64::new(UNCOMMITTED)))
            .collect();

        Ok(Self {
            reserve_sn: CachePadded::new(AtomicI64::new(0)),
            commit_sn: CachePadded::new(AtomicI64::new(0)),
            consume_sn: CachePadded::new(AtomicI64::new(0)),
            metrics: Metrics::new(),
            config,
            slots,
            commits,
        })
    }

    /// Creates a ring with `2^capacity_exp` slots and metrics disabled.
    pub fn with_capacity_exp(capacity_exp: u8) -> Result<Self, ConfigError> {
        Self::new(Config::new(capacity_exp, false))
    }

    // ---------------------------------------------------------------------
    // CONSTANTS & STATUS
    // ---------------------------------------------------------------------

    #[inline]
    pub fn capacity(&self) -> usize {
        self.config.capacity()
    }

    #[inline]
    fn index(&self, sn: Sequence) -> usize {
        (sn as usize) & self.config.mask()
    }

    /// Number of committed events not yet consumed.
    #[inline]
    pub fn len(&self) -> usize {
        let consume = self.consume_sn.load(Ordering::Relaxed);
        let commit = self.commit_sn.load(Ordering::Relaxed);
        commit.saturating_sub(consume).max(0) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when every slot is reserved, committed or awaiting consumption.
    #[inline]
    pub fn is_full(&self) -> bool {
        let consume = self.consume_sn.load(Ordering::Relaxed);
        let reserve = self.reserve_sn.load(Ordering::Relaxed);
        reserve - consume >= self.capacity() as i64
    }

    /// Next sequence number a reservation will start at.
    #[inline]
    pub fn reserve_sequence(&self) -> Sequence {
        self.reserve_sn.load(Ordering::Acquire)
    }

    /// The commit frontier: every sequence below it is readable.
    #[inline]
    pub fn commit_sequence(&self) -> Sequence {
        self.commit_sn.load(Ordering::Acquire)
    }

    /// Next sequence number a consumer will take.
    #[inline]
    pub fn consume_sequence(&self) -> Sequence {
        self.consume_sn.load(Ordering::Acquire)
    }

    // ---------------------------------------------------------------------
    // PRODUCER API (raw)
    // ---------------------------------------------------------------------

    /// Reserve `count` consecutive slots, returning the first sequence number.
    ///
    /// On success the caller exclusively owns `[sn, sn + count)` and must
    /// write every slot (via [`element_at`](Self::element_at)) and then call
    /// [`commit`](Self::commit) exactly once. Prefer
    /// [`try_reserve`](Self::try_reserve), which wraps this in a guard.
    ///
    /// `ReserveError::Full` is backpressure: retry later. The other errors
    /// are permanent.
    pub fn reserve(&self, count: usize) -> Result<Sequence, ReserveError> {
        if count == 0 {
            return Err(ReserveError::ZeroCount);
        }
        let capacity = self.capacity();
        if count > capacity {
            return Err(ReserveError::ExceedsCapacity {
                requested: count,
                capacity,
            });
        }

        let max_outstanding = (capacity - count) as i64;
        let mut reserve_sn = self.reserve_sn.load(Ordering::Relaxed);
        loop {
            let consume_sn = self.consume_sn.load(Ordering::Acquire);
            if reserve_sn - consume_sn > max_outstanding {
                if self.config.enable_metrics {
                    self.metrics.add_reserve_full();
                }
                return Err(ReserveError::Full);
            }

            let next = reserve_sn + count as i64;
            match self.reserve_sn.compare_exchange_weak(
                reserve_sn,
                next,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    debug_assert_bounded_outstanding!(next, consume_sn, capacity as i64);
                    if self.config.enable_metrics {
                        self.metrics.add_reservation(count as u64);
                    }
                    return Ok(reserve_sn);
                }
                Err(actual) => {
                    // Lost the race: re-check space against the new value.
                    reserve_sn = actual;
                    if self.config.enable_metrics {
                        self.metrics.add_reserve_retry();
                    }
                }
            }
        }
    }

    /// The slot for sequence number `sn`.
    ///
    /// # Safety
    ///
    /// `sn` must be inside a range the caller reserved and has not yet
    /// committed, and no other reference to the same slot may be live.
    #[allow(clippy::mut_from_ref)]
    #[inline]
    pub unsafe fn element_at(&self, sn: Sequence) -> &mut MaybeUninit<E> {
        &mut *self.slots[self.index(sn)].get()
    }

    /// Publish `[sn, sn + count)` and advance the commit frontier as far as
    /// the contiguous run of committed slots allows.
    ///
    /// # Safety
    ///
    /// `(count, sn)` must come from one successful [`reserve`](Self::reserve)
    /// that has not been committed yet, and every slot in the range must
    /// have been initialized.
    pub unsafe fn commit(&self, count: usize, sn: Sequence) {
        for s in sn..sn + count as i64 {
            self.commits[self.index(s)].store(s, Ordering::Release);
        }

        let absorbed = self.advance_frontier();

        if self.config.enable_metrics {
            self.metrics.add_commit(absorbed);
        }
    }

    /// Absorb committed markers into `commit_sn` until the first gap.
    /// Returns how many slots this call absorbed.
    fn advance_frontier(&self) -> u64 {
        fence(Ordering::SeqCst);

        let start = self.commit_sn.load(Ordering::Relaxed);
        let mut commit_sn = start;
        while commit_sn < self.reserve_sn.load(Ordering::Relaxed) {
            let marker = &self.commits[self.index(commit_sn)];
            if marker
                .compare_exchange(commit_sn, UNCOMMITTED, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                // Not committed yet (or another thread already absorbed it).
                break;
            }
            commit_sn += 1;
            self.commit_sn.store(commit_sn, Ordering::Release);
            fence(Ordering::SeqCst);
        }

        if cfg!(debug_assertions) && commit_sn > start {
            // Smallest counter first, with Acquire, so each later load is
            // ordered after whatever produced the earlier value.
            let consume = self.consume_sn.load(Ordering::Acquire);
            let commit = self.commit_sn.load(Ordering::Acquire);
            let reserve = self.reserve_sn.load(Ordering::Relaxed);
            debug_assert_counters_ordered!(consume, commit, reserve);
        }

        (commit_sn - start) as u64
    }

    // ---------------------------------------------------------------------
    // PRODUCER API (guarded)
    // ---------------------------------------------------------------------

    /// Reserve `count` slots behind a [`Reservation`] guard.
    pub fn try_reserve(&self, count: usize) -> Result<Reservation<'_, E>, ReserveError> {
        let sn = self.reserve(count)?;
        Ok(Reservation::new(self, sn, count))
    }

    /// Reserve `count` slots, fill slot `sn` with `produce(sn)`, commit.
    ///
    /// Returns the first sequence number of the batch.
    pub fn try_publish<F>(&self, count: usize, produce: F) -> Result<Sequence, ReserveError>
    where
        F: FnMut(Sequence) -> E,
    {
        Ok(self.try_reserve(count)?.commit_with(produce))
    }

    /// Send a single event.
    ///
    /// Hands the event back inside the error if the ring is full.
    pub fn try_push(&self, item: E) -> Result<Sequence, PushError<E>> {
        match self.reserve(1) {
            Ok(sn) => {
                // SAFETY: sn was just reserved by this call and is written
                // exactly once before its single commit.
                unsafe {
                    self.element_at(sn).write(item);
                    self.commit(1, sn);
                }
                Ok(sn)
            }
            Err(reason) => Err(PushError { item, reason }),
        }
    }

    // ---------------------------------------------------------------------
    // CONSUMER API
    // ---------------------------------------------------------------------

    /// Take the oldest committed event, or `None` if nothing is ready.
    ///
    /// Ownership of the event moves to the caller. `None` is transient:
    /// retry once a producer commits.
    pub fn consume(&self) -> Option<E> {
        loop {
            let commit_sn = self.commit_sn.load(Ordering::Acquire);
            let consume_sn = self.consume_sn.load(Ordering::Relaxed);

            // `>=` rather than `==`: the two loads are not a snapshot, and a
            // consume_sn ahead of our commit_sn means our Acquire did not
            // cover that slot.
            if consume_sn >= commit_sn {
                return None;
            }

            // Copy before advancing; see the strategy notes at the top.
            let slot = self.slots[self.index(consume_sn)].get();
            // SAFETY: slot points into our allocation. The bytes may be torn
            // if we already lost the race, which is fine for MaybeUninit; they
            // are only interpreted after the CAS below succeeds.
            let item = unsafe { ptr::read_volatile(slot) };

            if self
                .consume_sn
                .compare_exchange(consume_sn, consume_sn + 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                if self.config.enable_metrics {
                    self.metrics.add_consumed();
                }
                // SAFETY: the CAS proves no consumer passed consume_sn, so no
                // producer could have reserved the slot again; it held the
                // committed payload the Acquire on commit_sn made visible.
                // The slot's own bits are now stale and never dropped.
                return Some(unsafe { item.assume_init() });
            }

            if self.config.enable_metrics {
                self.metrics.add_consume_retry();
            }
        }
    }

    /// Consume up to `max_items` events, passing each to `handler`.
    ///
    /// Returns the number consumed. Stops early when the ring runs dry.
    pub fn consume_up_to<F>(&self, max_items: usize, mut handler: F) -> usize
    where
        F: FnMut(E),
    {
        let mut count = 0;
        while count < max_items {
            match self.consume() {
                Some(item) => handler(item),
                None => break,
            }
            count += 1;
        }
        count
    }

    /// Consume every event that is ready right now.
    pub fn drain<F>(&self, handler: F) -> usize
    where
        F: FnMut(E),
    {
        self.consume_up_to(usize::MAX, handler)
    }

    // ---------------------------------------------------------------------
    // METRICS
    // ---------------------------------------------------------------------

    /// Get a snapshot of metrics if enabled.
    pub fn metrics(&self) -> MetricsSnapshot {
        if self.config.enable_metrics {
            self.metrics.snapshot()
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl<E> std::fmt::Debug for EventRing<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRing")
            .field("capacity", &self.capacity())
            .field("reserve_sn", &self.reserve_sn.load(Ordering::Relaxed))
            .field("commit_sn", &self.commit_sn.load(Ordering::Relaxed))
            .field("consume_sn", &self.consume_sn.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<E> Drop for EventRing<E> {
    fn drop(&mut self) {
        let consume = *self.consume_sn.get_mut();
        let commit = *self.commit_sn.get_mut();
        let reserve = *self.reserve_sn.get_mut();

        // Absorbed but never consumed.
        for sn in consume..commit {
            let idx = self.index(sn);
            // SAFETY: slots in [consume, commit) hold committed payloads that
            // no consumer took.
            unsafe { ptr::drop_in_place(self.slots[idx].get_mut().as_mut_ptr()) };
        }

        // Committed out of order behind a gap. Reserved-but-uncommitted slots
        // may be partially written; they are leaked.
        for sn in commit..reserve {
            let idx = self.index(sn);
            if *self.commits[idx].get_mut() == sn {
                // SAFETY: a marker equal to sn means its producer committed it.
                unsafe { ptr::drop_in_place(self.slots[idx].get_mut().as_mut_ptr()) };
            }
        }
    }
}

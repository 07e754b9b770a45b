//! Debug assertion macros for event ring invariants.
//!
//! Active only with `debug_assertions`; they compile to nothing in release
//! builds. Each macro names the property it guards so a failing assertion
//! points straight at the broken rule.

// =============================================================================
// Counter ordering: consume <= commit <= reserve
// =============================================================================

/// Assert the three counters are ordered.
///
/// The arguments are separate loads, not one snapshot. Callers load the
/// smaller counter first: a later load of a monotonic counter can only be
/// larger, so the check never fires spuriously.
///
/// Used in: `commit()` after advancing the frontier
macro_rules! debug_assert_counters_ordered {
    ($consume:expr, $commit:expr, $reserve:expr) => {
        debug_assert!(
            $consume <= $commit && $commit <= $reserve,
            "counter order violated: consume {} commit {} reserve {}",
            $consume,
            $commit,
            $reserve
        )
    };
}

// =============================================================================
// Bounded outstanding: reserve - consume <= capacity
// =============================================================================

/// Assert a reservation never claims more than the free space.
///
/// Used in: `reserve()` after a successful CAS
macro_rules! debug_assert_bounded_outstanding {
    ($reserve:expr, $consume:expr, $capacity:expr) => {
        debug_assert!(
            $reserve - $consume <= $capacity,
            "outstanding bound violated: reserve {} consume {} exceeds capacity {}",
            $reserve,
            $consume,
            $capacity
        )
    };
}

pub(crate) use debug_assert_bounded_outstanding;
pub(crate) use debug_assert_counters_ordered;

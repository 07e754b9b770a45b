//! Event Processor - Lock-Free Multi-Producer Multi-Consumer Event Ring
//!
//! A bounded ring where any number of producers reserve contiguous batches
//! of sequence numbers, fill them in parallel and commit in any order, while
//! any number of consumers take events out in strict sequence order.
//!
//! Coordination is three atomic counters (`reserve`, `commit`, `consume`)
//! plus one commit marker per slot; there are no locks. Commits that finish
//! out of order wait behind the first uncommitted slot, and whichever
//! producer fills that gap advances the frontier for everyone behind it.
//!
//! # Key Features
//!
//! - Batch reservation with a single CAS per batch
//! - Cooperative commit frontier over per-slot sequence markers
//! - One cache line per slot and per marker (no false sharing)
//! - Failure-as-signal: `Full` / `None` instead of blocking
//! - Move-only payload ownership transfer
//!
//! # Example
//!
//! ```
//! use event_processor::{EventRing, ReserveError};
//!
//! let ring = EventRing::<u64>::with_capacity_exp(2).unwrap(); // 4 slots
//!
//! // Batch publish: slot `sn` gets `f(sn)`
//! let sn = ring.try_publish(3, |sn| sn as u64 * 100).unwrap();
//! assert_eq!(sn, 0);
//!
//! // Only one slot left
//! assert_eq!(ring.reserve(2), Err(ReserveError::Full));
//!
//! let consumed = ring.drain(|item| println!("Received: {}", item));
//! assert_eq!(consumed, 3);
//! ```

mod backoff;
mod config;
mod error;
mod invariants;
mod metrics;
mod padded;
mod reservation;
mod ring;

pub use backoff::Backoff;
pub use config::{Config, ConfigError, HIGH_THROUGHPUT_CONFIG, LOW_LATENCY_CONFIG, MAX_CAPACITY_EXP};
pub use error::{PushError, ReserveError};
pub use metrics::{Metrics, MetricsSnapshot};
pub use padded::{Padded, CACHE_LINE_SIZE};
pub use reservation::Reservation;
pub use ring::{EventRing, Sequence};

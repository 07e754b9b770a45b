//! Many producers, one consumer, polymorphic events.
//!
//! Each producer thread reserves batches of `id % 5 + 1` events and keeps
//! going until the sequence numbers it is handed pass `--limit`. Once every
//! producer has joined, main publishes `None` as the shutdown sentinel and
//! the consumer exits after processing everything before it.
//!
//! Run with: `RUST_LOG=info cargo run --release -p event-processor --bin demo`

use clap::Parser;
use event_processor::{Backoff, EventRing, ReserveError, Sequence};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Parser)]
#[command(about = "Drive an EventRing with many producers and one consumer")]
struct Args {
    /// Ring capacity as a power of two
    #[arg(long, default_value_t = 4)]
    capacity_exp: u8,

    /// Number of producer threads
    #[arg(long, default_value_t = 16)]
    producers: usize,

    /// Producers stop once their reservation starts at or past this sequence
    #[arg(long, default_value_t = 1 << 20)]
    limit: Sequence,
}

/// Something the consumer knows how to handle without knowing its type.
trait Event: Send {
    fn process(&self, stats: &Stats);
}

#[derive(Debug, Default)]
struct Stats {
    ticks: AtomicU64,
    checksum: AtomicU64,
}

/// A plain event tagged with the sequence it was written at.
struct Tick {
    sn: Sequence,
}

impl Event for Tick {
    fn process(&self, stats: &Stats) {
        stats.ticks.fetch_add(1, Ordering::Relaxed);
        debug!(sn = self.sn, "processed tick");
    }
}

/// An event carrying the producer that wrote it.
struct Tagged {
    sn: Sequence,
    producer: usize,
}

impl Event for Tagged {
    fn process(&self, stats: &Stats) {
        stats
            .checksum
            .fetch_add((self.sn as u64) ^ (self.producer as u64), Ordering::Relaxed);
    }
}

/// `None` is the shutdown sentinel.
type Slot = Option<Box<dyn Event>>;

fn make_event(sn: Sequence, producer: usize) -> Box<dyn Event> {
    if sn % 2 == 0 {
        Box::new(Tick { sn })
    } else {
        Box::new(Tagged { sn, producer })
    }
}

/// Retry a batch until it fits. Only permanent rejections are returned.
fn publish(
    ring: &EventRing<Slot>,
    count: usize,
    mut produce: impl FnMut(Sequence) -> Slot,
) -> Result<Sequence, ReserveError> {
    let mut backoff = Backoff::new();
    loop {
        match ring.try_reserve(count) {
            Ok(reservation) => return Ok(reservation.commit_with(&mut produce)),
            Err(e) if e.is_recoverable() => backoff.snooze(),
            Err(e) => return Err(e),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    info!(?args, "starting event processor demo");

    let ring = Arc::new(EventRing::<Slot>::with_capacity_exp(args.capacity_exp)?);
    let stats = Arc::new(Stats::default());
    let start = Instant::now();

    let consumer = {
        let ring = Arc::clone(&ring);
        let stats = Arc::clone(&stats);
        thread::spawn(move || {
            let mut total = 0u64;
            let mut backoff = Backoff::new();
            loop {
                let Some(slot) = ring.consume() else {
                    backoff.snooze();
                    continue;
                };
                backoff.reset();
                match slot {
                    Some(event) => {
                        event.process(&stats);
                        total += 1;
                    }
                    None => break,
                }
            }
            total
        })
    };

    let producers: Vec<_> = (0..args.producers)
        .map(|id| {
            let ring = Arc::clone(&ring);
            let limit = args.limit;
            thread::spawn(move || {
                let batch = id % 5 + 1;
                let mut published = 0u64;
                loop {
                    let sn = publish(&ring, batch, |sn| Some(make_event(sn, id)))?;
                    published += batch as u64;
                    if sn >= limit {
                        break;
                    }
                }
                debug!(producer = id, published, "producer done");
                Ok::<_, ReserveError>(published)
            })
        })
        .collect();

    let mut produced = 0u64;
    for handle in producers {
        produced += handle.join().map_err(|_| "producer panicked")??;
    }

    publish(&ring, 1, |_| None)?;

    let consumed = consumer.join().map_err(|_| "consumer panicked")?;
    let elapsed = start.elapsed();

    info!(
        produced,
        consumed,
        ticks = stats.ticks.load(Ordering::Relaxed),
        checksum = stats.checksum.load(Ordering::Relaxed),
        ?elapsed,
        "Total events processed: {}",
        consumed
    );
    println!("Total events processed: {consumed}");

    if produced != consumed {
        return Err(format!("lost events: produced {produced}, consumed {consumed}").into());
    }
    Ok(())
}

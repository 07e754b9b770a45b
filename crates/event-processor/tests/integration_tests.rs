use event_processor::{Backoff, Config, EventRing, ReserveError, Sequence};
use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

/// Payload carrying who wrote it and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Item {
    producer: usize,
    seq_in_producer: u64,
    sn: Sequence,
}

fn publish_blocking<E>(ring: &EventRing<E>, count: usize, produce: impl FnMut(Sequence) -> E) -> Sequence {
    let mut produce = produce;
    let mut backoff = Backoff::new();
    loop {
        match ring.try_reserve(count) {
            Ok(r) => return r.commit_with(&mut produce),
            Err(ReserveError::Full) => backoff.snooze(),
            Err(e) => panic!("unexpected reserve error: {e}"),
        }
    }
}

#[test]
fn test_round_trip_capacity_four() {
    let ring = EventRing::<&'static str>::with_capacity_exp(2).unwrap();

    let sn = ring.reserve(1).unwrap();
    assert_eq!(sn, 0);
    unsafe {
        ring.element_at(sn).write("P0");
        ring.commit(1, sn);
    }

    assert_eq!(ring.consume(), Some("P0"));
    assert_eq!(ring.consume(), None);
}

#[test]
fn test_backpressure_then_release() {
    let ring = EventRing::<u32>::with_capacity_exp(2).unwrap();
    for i in 0..4 {
        let sn = ring.reserve(1).unwrap();
        unsafe {
            ring.element_at(sn).write(i);
            ring.commit(1, sn);
        }
    }

    assert_eq!(ring.reserve(1), Err(ReserveError::Full));
    assert_eq!(ring.consume(), Some(0));
    assert_eq!(ring.reserve(1), Ok(4));
}

#[test]
fn test_out_of_order_commit_absorbs_both() {
    let ring = EventRing::<u32>::with_capacity_exp(2).unwrap();
    let first = ring.reserve(1).unwrap();
    let second = ring.reserve(1).unwrap();

    unsafe {
        ring.element_at(second).write(2);
        ring.commit(1, second);
    }
    assert_eq!(ring.commit_sequence(), 0);

    unsafe {
        ring.element_at(first).write(1);
        ring.commit(1, first);
    }
    assert_eq!(ring.commit_sequence(), 2);
    assert_eq!(ring.reserve_sequence(), 2);
}

#[test]
fn test_capacity_rejection_in_any_state() {
    let ring = EventRing::<u8>::with_capacity_exp(3).unwrap();
    let too_big = ReserveError::ExceedsCapacity {
        requested: 9,
        capacity: 8,
    };

    assert_eq!(ring.reserve(9), Err(too_big));

    ring.try_publish(5, |_| 0).unwrap();
    assert_eq!(ring.reserve(9), Err(too_big));

    ring.try_publish(3, |_| 0).unwrap();
    assert!(ring.is_full());
    assert_eq!(ring.reserve(9), Err(too_big));

    ring.drain(|_| {});
    assert_eq!(ring.reserve(9), Err(too_big));
    assert!(!too_big.is_recoverable());
}

#[test]
fn test_invalid_config_rejected() {
    let err = EventRing::<u8>::new(Config::new(60, false)).unwrap_err();
    assert!(err.to_string().contains("60"));
}

#[test]
fn test_concurrent_reservations_never_overlap() {
    const N_PRODUCERS: usize = 8;
    const ROUNDS: usize = 2_000;

    let ring = Arc::new(EventRing::<u8>::with_capacity_exp(6).unwrap());
    let ranges = Arc::new(Mutex::new(Vec::new()));
    let done = Arc::new(AtomicBool::new(false));

    // Keep the ring drained so producers keep making progress.
    let drainer = {
        let ring = Arc::clone(&ring);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            while !done.load(Ordering::Acquire) {
                ring.drain(|_| {});
                thread::yield_now();
            }
            ring.drain(|_| {});
        })
    };

    let handles: Vec<_> = (0..N_PRODUCERS)
        .map(|id| {
            let ring = Arc::clone(&ring);
            let ranges = Arc::clone(&ranges);
            thread::spawn(move || {
                let batch = id % 4 + 1;
                let mut mine = Vec::with_capacity(ROUNDS);
                for _ in 0..ROUNDS {
                    let sn = publish_blocking(&ring, batch, |_| 0);
                    mine.push((sn, sn + batch as i64));
                }
                ranges.lock().unwrap().extend(mine);
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    done.store(true, Ordering::Release);
    drainer.join().unwrap();

    let mut ranges = ranges.lock().unwrap().clone();
    ranges.sort_unstable();
    for pair in ranges.windows(2) {
        assert!(pair[0].1 <= pair[1].0, "overlap: {:?} and {:?}", pair[0], pair[1]);
    }
    // Disjoint and gap-free: together they tile [0, reserve_sn).
    assert_eq!(ranges.first().unwrap().0, 0);
    for pair in ranges.windows(2) {
        assert_eq!(pair[0].1, pair[1].0);
    }
    assert_eq!(ranges.last().unwrap().1, ring.reserve_sequence());
}

#[test]
fn test_stress_conservation_and_order() {
    const N_PRODUCERS: usize = 6;
    const N_CONSUMERS: usize = 3;
    const ITEMS_PER_PRODUCER: u64 = 20_000;

    let ring = Arc::new(EventRing::<Option<Item>>::with_capacity_exp(5).unwrap());
    let capacity = ring.capacity();
    let start = Arc::new(Barrier::new(N_PRODUCERS + N_CONSUMERS));

    let consumers: Vec<_> = (0..N_CONSUMERS)
        .map(|_| {
            let ring = Arc::clone(&ring);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                let mut seen = Vec::new();
                let mut backoff = Backoff::new();
                loop {
                    match ring.consume() {
                        Some(Some(item)) => {
                            seen.push(item);
                            backoff.reset();
                        }
                        // One shutdown sentinel per consumer.
                        Some(None) => break,
                        None => backoff.snooze(),
                    }
                }
                seen
            })
        })
        .collect();

    let producers: Vec<_> = (0..N_PRODUCERS)
        .map(|producer| {
            let ring = Arc::clone(&ring);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                let mut rng = rand::thread_rng();
                let mut next = 0u64;
                while next < ITEMS_PER_PRODUCER {
                    let remaining = (ITEMS_PER_PRODUCER - next) as usize;
                    let batch = rng.gen_range(1..=capacity).min(remaining);
                    let mut k = next;
                    publish_blocking(&ring, batch, |sn| {
                        let item = Item {
                            producer,
                            seq_in_producer: k,
                            sn,
                        };
                        k += 1;
                        Some(item)
                    });
                    next += batch as u64;
                }
            })
        })
        .collect();

    for p in producers {
        p.join().unwrap();
    }
    for _ in 0..N_CONSUMERS {
        publish_blocking(&ring, 1, |_| None);
    }

    let mut all = Vec::new();
    for c in consumers {
        let seen = c.join().unwrap();
        // Each consumer observes strictly increasing sequence numbers.
        assert!(
            seen.windows(2).all(|w| w[0].sn < w[1].sn),
            "consumer saw sequence numbers out of order"
        );
        all.extend(seen);
    }

    assert_eq!(all.len() as u64, N_PRODUCERS as u64 * ITEMS_PER_PRODUCER);

    // No loss, no duplication: every (producer, index) exactly once.
    let unique: HashSet<(usize, u64)> = all.iter().map(|i| (i.producer, i.seq_in_producer)).collect();
    assert_eq!(unique.len(), all.len());
    for producer in 0..N_PRODUCERS {
        for k in 0..ITEMS_PER_PRODUCER {
            assert!(unique.contains(&(producer, k)), "missing item {k} of producer {producer}");
        }
    }

    // Union of consumed sequence numbers is gap-free.
    let mut sns: Vec<Sequence> = all.iter().map(|i| i.sn).collect();
    sns.sort_unstable();
    assert!(sns.iter().enumerate().all(|(i, &sn)| sn == i as i64));

    assert!(ring.is_empty());
    assert_eq!(ring.consume_sequence(), ring.reserve_sequence());
}

#[test]
fn test_multi_consumer_race_on_tiny_ring() {
    // Two slots and many consumers: a consumer that loses the consume CAS has
    // usually copied a slot that is about to be rewritten. Boxed payloads make
    // a reused stale copy show up as a duplicate (or a double free).
    const N_CONSUMERS: usize = 4;
    const TOTAL: u64 = 50_000;

    let ring = Arc::new(EventRing::<Box<u64>>::new(Config::new(1, true)).unwrap());
    let done = Arc::new(AtomicBool::new(false));

    let consumers: Vec<_> = (0..N_CONSUMERS)
        .map(|_| {
            let ring = Arc::clone(&ring);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut seen = Vec::new();
                loop {
                    if let Some(item) = ring.consume() {
                        seen.push(*item);
                    } else if done.load(Ordering::Acquire) && ring.is_empty() {
                        break;
                    } else {
                        std::hint::spin_loop();
                    }
                }
                seen
            })
        })
        .collect();

    for value in 0..TOTAL {
        let mut item = Box::new(value);
        let mut backoff = Backoff::new();
        loop {
            match ring.try_push(item) {
                Ok(sn) => {
                    assert_eq!(sn, value as i64);
                    break;
                }
                Err(e) => {
                    item = e.into_inner();
                    backoff.snooze();
                }
            }
        }
    }
    done.store(true, Ordering::Release);

    let mut all = Vec::new();
    for c in consumers {
        let seen = c.join().unwrap();
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        all.extend(seen);
    }
    all.sort_unstable();
    assert_eq!(all, (0..TOTAL).collect::<Vec<_>>());

    let metrics = ring.metrics();
    assert_eq!(metrics.consumed, TOTAL);
    assert_eq!(metrics.reservations, TOTAL);
}

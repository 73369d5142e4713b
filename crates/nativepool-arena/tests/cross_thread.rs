//! Integration test: sharing pools and handles across threads.
//!
//! Handles are plain values and travel over channels freely. The pool
//! itself is either moved (and adopted) or shared behind
//! `NativeMemoryPool`; touching a plain `MemoryPool` from a thread that
//! does not own it panics.

use std::thread;

use crossbeam_channel::{bounded, unbounded};
use nativepool_arena::{MemoryBlock, MemoryPool, NativeMemoryPool, PoolConfig};
use nativepool_test_utils::scenario_config;

#[test]
fn producer_allocates_consumer_releases() {
    let pool = NativeMemoryPool::new(PoolConfig::new(16 * 1024)).unwrap();
    let (tx, rx) = bounded::<MemoryBlock>(8);

    let producer = {
        let pool = pool.clone();
        thread::spawn(move || {
            for i in 0..200u8 {
                let block = pool.get(24);
                assert!(!block.is_invalid());
                pool.with_data_mut(block, |bytes| bytes.fill(i)).unwrap();
                tx.send(block).unwrap();
            }
        })
    };

    let consumer = {
        let pool = pool.clone();
        thread::spawn(move || {
            let mut seen = 0u32;
            for (i, block) in rx.iter().enumerate() {
                let expected = i as u8;
                let ok = pool
                    .with_data(block, |bytes| bytes.iter().all(|&b| b == expected))
                    .unwrap();
                assert!(ok, "block {block} carried wrong bytes");
                pool.try_reserve(block).unwrap();
                seen += 1;
            }
            seen
        })
    };

    producer.join().unwrap();
    assert_eq!(consumer.join().unwrap(), 200);

    let stats = pool.stats();
    assert_eq!(stats.live_blocks, 0);
    assert_eq!(stats.free_blocks, 1);
    assert!(pool.lock().verify().is_ok());
}

#[test]
fn concurrent_churn_keeps_pool_consistent() {
    let pool = NativeMemoryPool::new(PoolConfig::new(64 * 1024)).unwrap();
    let (tx, rx) = unbounded::<MemoryBlock>();

    let workers: Vec<_> = (0..4)
        .map(|w| {
            let pool = pool.clone();
            let tx = tx.clone();
            thread::spawn(move || {
                let mut held = Vec::new();
                for i in 0..300usize {
                    let block = pool.get(16 + (i * 7 + w) % 200);
                    assert!(!block.is_invalid());
                    held.push(block);
                    if held.len() > 8 {
                        pool.reserve(held.remove(0));
                    }
                }
                for block in held {
                    tx.send(block).unwrap();
                }
            })
        })
        .collect();
    drop(tx);
    for w in workers {
        w.join().unwrap();
    }

    let leftovers: Vec<_> = rx.iter().collect();
    assert_eq!(leftovers.len(), 4 * 8);
    {
        let guard = pool.lock();
        assert!(guard.verify().is_ok());
        assert_eq!(guard.stats().growth_count, 0);
        for block in &leftovers {
            assert!(guard.is_live(*block));
        }
    }
    for block in leftovers {
        pool.reserve(block);
    }
    assert_eq!(pool.stats().used_bytes, 0);
}

#[test]
fn moved_pool_must_be_adopted() {
    let mut pool = MemoryPool::new(scenario_config()).unwrap();
    let block = pool.get(32);

    let (tx, rx) = bounded::<MemoryPool>(1);
    let worker = thread::spawn(move || {
        let mut pool = rx.recv().unwrap();
        pool.adopt_current_thread();
        pool.try_reserve(block).unwrap();
        pool.get(64)
    });
    tx.send(pool).unwrap();
    let fresh = worker.join().unwrap();
    assert!(!fresh.is_invalid());
}

#[test]
fn mutation_from_foreign_thread_panics() {
    let pool = MemoryPool::new(scenario_config()).unwrap();
    let result = thread::spawn(move || {
        let mut pool = pool;
        pool.get(16)
    })
    .join();
    let payload = result.unwrap_err();
    let message = payload
        .downcast_ref::<String>()
        .cloned()
        .unwrap_or_default();
    assert!(message.contains("nativepool"), "unexpected panic: {message}");
    assert!(message.contains("`get`"), "unexpected panic: {message}");
}

#[test]
fn handles_are_plain_values() {
    let pool = NativeMemoryPool::new(scenario_config()).unwrap();
    let block = pool.get(100);
    let copies: Vec<MemoryBlock> = (0..4).map(|_| block).collect();
    let handles: Vec<_> = copies
        .into_iter()
        .map(|copy| {
            let pool = pool.clone();
            thread::spawn(move || pool.resolve(copy).map(|r| r.len))
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), Ok(112));
    }
}

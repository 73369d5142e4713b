//! Benchmark profiles and utilities for the nativepool allocator.
//!
//! Provides pre-built [`PoolConfig`] profiles and request-size
//! workloads for benchmarking and demos:
//!
//! - [`reference_profile`]: 64 KiB pool, 8 size classes
//! - [`stress_profile`]: 1 MiB pool, 16 size classes
//! - [`request_sizes`]: deterministic request lengths via seed

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use nativepool_arena::PoolConfig;
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Reference benchmark profile: 64 KiB, 8 size classes, doubling growth.
pub fn reference_profile() -> PoolConfig {
    PoolConfig::new(64 * 1024).with_bucket_count(8)
}

/// Stress benchmark profile: 1 MiB, 16 size classes.
///
/// Same growth policy as [`reference_profile`] at 16x the capacity.
pub fn stress_profile() -> PoolConfig {
    PoolConfig::new(1024 * 1024).with_bucket_count(16)
}

/// Generate `n` deterministic request lengths.
///
/// Lengths are skewed towards small blocks: three quarters fall in
/// `1..=64`, the rest in `65..=max_len`. The same seed always yields
/// the same sequence.
pub fn request_sizes(n: usize, max_len: usize, seed: u64) -> Vec<usize> {
    let max_len = max_len.max(65);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            if rng.next_u32() % 4 == 0 {
                65 + (rng.next_u64() % (max_len as u64 - 64)) as usize
            } else {
                1 + (rng.next_u32() % 64) as usize
            }
        })
        .collect()
}

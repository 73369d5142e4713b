//! Run a seeded churn workload and print pool statistics.
//!
//! Pool logs go through `tracing`; set `RUST_LOG=nativepool_arena=debug`
//! to watch growth events.
//!
//! Usage: cargo run -p nativepool-bench --example churn_report -- [seed] [steps]

use nativepool_arena::MemoryPool;
use nativepool_bench::reference_profile;
use nativepool_test_utils::fixtures::{ChurnGenerator, ChurnOp};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let seed = args.next().map(|s| s.parse::<u64>()).transpose()?.unwrap_or(42);
    let steps = args.next().map(|s| s.parse::<usize>()).transpose()?.unwrap_or(10_000);

    let mut pool = MemoryPool::new(reference_profile())?;
    let mut generator = ChurnGenerator::new(seed, 2048).with_get_percent(55);
    let mut live = Vec::new();
    let mut invalidated = 0usize;

    for step in 0..steps {
        match generator.next_op() {
            ChurnOp::Get(len) => {
                let id = pool.id();
                let block = pool.try_get(len)?;
                if pool.id() != id {
                    invalidated += live.len();
                    live.clear();
                }
                live.push(block);
            }
            ChurnOp::Reserve(i) => {
                if !live.is_empty() {
                    pool.try_reserve(live.swap_remove(i % live.len()))?;
                }
            }
        }
        if step % 1000 == 999 {
            let stats = pool.stats();
            tracing::info!(
                step = step + 1,
                capacity = stats.capacity,
                live = stats.live_blocks,
                used = stats.used_bytes,
                free_blocks = stats.free_blocks,
                largest_free = stats.largest_free,
                "checkpoint"
            );
        }
    }

    pool.verify()?;
    let stats = pool.stats();
    println!("seed             {seed}");
    println!("steps            {steps}");
    println!("capacity         {}", stats.capacity);
    println!("growth events    {}", stats.growth_count);
    println!("handles dropped  {invalidated}");
    println!("live blocks      {}", stats.live_blocks);
    println!("used bytes       {}", stats.used_bytes);
    println!("free blocks      {}", stats.free_blocks);
    println!("largest free     {}", stats.largest_free);

    for block in live {
        pool.reserve(block);
    }
    Ok(())
}

//! Pool configuration parameters.

use nativepool_core::PoolError;

/// Configuration for a [`MemoryPool`](crate::MemoryPool).
///
/// Controls initial capacity, size-class layout, and growth. None of these
/// values affect correctness, only fragmentation and lookup cost.
/// Validated at construction; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Initial byte capacity of the arena.
    ///
    /// Default: 65_536. Must be non-zero, a multiple of `granularity`,
    /// and no larger than `max_capacity`.
    pub pool_size: u32,

    /// Number of size classes in the bucket index.
    ///
    /// Default: 8. Must be in `1..=32`. Thresholds are spaced evenly in
    /// log2 between 16 bytes and the pool capacity.
    pub initial_bucket_count: u32,

    /// Every block length is rounded up to a multiple of this.
    ///
    /// Default: 16. Must be a power of two.
    pub granularity: u32,

    /// Capacity multiplier applied when an allocation misses.
    ///
    /// Default: 2 (doubling). Must be at least 2.
    pub growth_factor: u32,

    /// Upper bound on capacity after any number of resizes.
    ///
    /// Default: 1 GiB.
    pub max_capacity: u32,
}

impl PoolConfig {
    /// Default initial capacity: 64 KiB.
    pub const DEFAULT_POOL_SIZE: u32 = 64 * 1024;

    /// Default number of size classes.
    pub const DEFAULT_BUCKET_COUNT: u32 = 8;

    /// Default block length granularity.
    pub const DEFAULT_GRANULARITY: u32 = 16;

    /// Default growth multiplier.
    pub const DEFAULT_GROWTH_FACTOR: u32 = 2;

    /// Default capacity ceiling: 1 GiB.
    pub const DEFAULT_MAX_CAPACITY: u32 = 1 << 30;

    /// Largest accepted bucket count.
    pub const MAX_BUCKET_COUNT: u32 = 32;

    /// Create a config with the given initial capacity.
    ///
    /// Uses default values for all other parameters.
    pub fn new(pool_size: u32) -> Self {
        Self {
            pool_size,
            initial_bucket_count: Self::DEFAULT_BUCKET_COUNT,
            granularity: Self::DEFAULT_GRANULARITY,
            growth_factor: Self::DEFAULT_GROWTH_FACTOR,
            max_capacity: Self::DEFAULT_MAX_CAPACITY,
        }
    }

    /// Set the number of size classes.
    pub fn with_bucket_count(mut self, count: u32) -> Self {
        self.initial_bucket_count = count;
        self
    }

    /// Set the block length granularity.
    pub fn with_granularity(mut self, granularity: u32) -> Self {
        self.granularity = granularity;
        self
    }

    /// Set the growth multiplier.
    pub fn with_growth_factor(mut self, factor: u32) -> Self {
        self.growth_factor = factor;
        self
    }

    /// Set the capacity ceiling.
    pub fn with_max_capacity(mut self, max_capacity: u32) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Check every documented constraint.
    pub fn validate(&self) -> Result<(), PoolError> {
        if !self.granularity.is_power_of_two() {
            return Err(invalid(format!(
                "granularity must be a power of two (got {})",
                self.granularity
            )));
        }
        if self.pool_size == 0 || self.pool_size % self.granularity != 0 {
            return Err(invalid(format!(
                "pool_size must be a non-zero multiple of granularity {} (got {})",
                self.granularity, self.pool_size
            )));
        }
        if self.pool_size > self.max_capacity {
            return Err(invalid(format!(
                "pool_size ({}) exceeds max_capacity ({})",
                self.pool_size, self.max_capacity
            )));
        }
        if self.initial_bucket_count == 0 || self.initial_bucket_count > Self::MAX_BUCKET_COUNT {
            return Err(invalid(format!(
                "initial_bucket_count must be in 1..={} (got {})",
                Self::MAX_BUCKET_COUNT,
                self.initial_bucket_count
            )));
        }
        if self.growth_factor < 2 {
            return Err(invalid(format!(
                "growth_factor must be >= 2 (got {})",
                self.growth_factor
            )));
        }
        Ok(())
    }

    /// Round a request up to the granularity.
    ///
    /// Returns `None` if the rounded length exceeds `max_capacity`;
    /// growth could never satisfy such a request.
    pub fn round_request(&self, len: usize) -> Option<u32> {
        let g = self.granularity as usize;
        let rounded = len.checked_add(g - 1)? & !(g - 1);
        if rounded > self.max_capacity as usize {
            return None;
        }
        u32::try_from(rounded).ok()
    }

    /// Capacity after one growth step from `current`, or `None` if the
    /// ceiling has already been reached.
    pub fn grown_capacity(&self, current: u32) -> Option<u32> {
        let next = current
            .saturating_mul(self.growth_factor)
            .min(self.max_capacity);
        // Keep the capacity a multiple of the granularity after clamping.
        let next = next & !(self.granularity - 1);
        (next > current).then_some(next)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_POOL_SIZE)
    }
}

fn invalid(reason: String) -> PoolError {
    PoolError::InvalidConfig { reason }
}

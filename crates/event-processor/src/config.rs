use thiserror::Error;

/// Largest accepted capacity exponent (256M slots, 16 GiB of padded slots
/// for word-sized payloads).
pub const MAX_CAPACITY_EXP: u8 = 28;

/// Error returned when a [`Config`] cannot back a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The capacity exponent is larger than [`MAX_CAPACITY_EXP`].
    #[error("capacity exponent {exp} exceeds the maximum of {max}")]
    CapacityTooLarge {
        /// The requested exponent.
        exp: u8,
        /// The largest accepted exponent.
        max: u8,
    },
}

/// Configuration for [`EventRing`](crate::EventRing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Ring size as power of 2 (default: 16 = 64K slots)
    pub capacity_exp: u8,
    /// Enable metrics collection (slight overhead)
    pub enable_metrics: bool,
}

impl Config {
    /// Creates a new configuration with custom settings.
    pub const fn new(capacity_exp: u8, enable_metrics: bool) -> Self {
        Self {
            capacity_exp,
            enable_metrics,
        }
    }

    /// Returns the number of slots in the ring.
    #[inline]
    pub const fn capacity(&self) -> usize {
        1 << self.capacity_exp
    }

    /// Returns the mask mapping a sequence number to a slot index.
    #[inline]
    pub const fn mask(&self) -> usize {
        self.capacity() - 1
    }

    /// Checks that the capacity can be allocated and addressed by `i64`
    /// sequence arithmetic.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity_exp > MAX_CAPACITY_EXP {
            return Err(ConfigError::CapacityTooLarge {
                exp: self.capacity_exp,
                max: MAX_CAPACITY_EXP,
            });
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity_exp: 16, // 64K slots
            enable_metrics: false,
        }
    }
}

/// Low latency configuration (4K slots, 256 KiB of slots fits in L2)
pub const LOW_LATENCY_CONFIG: Config = Config::new(12, false);

/// High throughput configuration (256K slots)
pub const HIGH_THROUGHPUT_CONFIG: Config = Config::new(18, false);

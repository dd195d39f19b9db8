
use crate::Ticks;

/// Time between ticks on the CD backoff timer in us
pub const CD_TICK_TIME: u16 = 10;

/// Minimum ticks for CD backoff check.
/// Minimum time is 1560 us (26 bits) for slaves.
pub const CD_BACKOFF_MIN: Ticks = 1560 / CD_TICK_TIME;

/// Maximum ticks for CD backoff check.
/// Maximum time is 2760 us (46 bits) for slaves.
pub const CD_BACKOFF_MAX: Ticks = 2760 / CD_TICK_TIME;

/// Attempts for transmitting a packet before giving up.
/// LN specification only states AT LEAST 25.
pub const TX_ATTEMPTS_MAX: u8 = 50;

/// Link layer configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Backoff window floor in ticks
    pub backoff_min: Ticks,

    /// Backoff window for the first attempt, in ticks
    pub backoff_max: Ticks,

    /// Base window decrement per collision, in ticks (half a bit
    /// time; 0-3 ticks of jitter are added on top)
    pub backoff_step: Ticks,

    /// Maximum number of attempts for one packet
    pub max_attempts: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backoff_min: CD_BACKOFF_MIN,
            backoff_max: CD_BACKOFF_MAX,
            backoff_step: 30 / CD_TICK_TIME,
            max_attempts: TX_ATTEMPTS_MAX,
        }
    }
}

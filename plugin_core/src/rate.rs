//! Bits-per-second to per-byte delay conversion shared by every byte-paced strategy.

use std::time::Duration;

/// Slowest supported rate. Anything lower (including zero and negative input) is clamped to it.
pub const MIN_BPS: i64 = 1;

/// Default rate when a plugin configuration omits `bps`.
pub const DEFAULT_BPS: i64 = 1;

pub fn clamp_bps(bps: i64) -> u64 {
    bps.max(MIN_BPS) as u64
}

/// Time to wait after each byte so the stream averages `bps` bits per second.
///
/// One byte carries eight bits, so the delay is `8 / bps` seconds.
pub fn byte_delay(bps: i64) -> Duration {
    Duration::from_secs_f64(8.0 / clamp_bps(bps) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_bit_per_second_is_eight_seconds_per_byte() {
        assert_eq!(byte_delay(1), Duration::from_secs(8));
    }

    #[test]
    fn eight_hundred_bits_per_second_is_ten_ms_per_byte() {
        assert_eq!(byte_delay(800), Duration::from_millis(10));
    }

    #[test]
    fn non_positive_rates_clamp_to_minimum() {
        assert_eq!(clamp_bps(0), 1);
        assert_eq!(clamp_bps(-40), 1);
        assert_eq!(byte_delay(0), byte_delay(MIN_BPS));
        assert_eq!(byte_delay(-5), Duration::from_secs(8));
    }
}

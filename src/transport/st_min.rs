//! STmin (separation time minimum) translation.
//!
//! Raw values `0x00..=0x7F` are whole milliseconds, `0xF1..=0xF9` are 100 µs steps from
//! 100 µs to 900 µs. Every other raw value is reserved; receivers must still accept it and
//! treat it as the longest separation time.

use std::time::Duration;

use tracing::warn;

use crate::error::{IsoTpError, Result};

/// Highest raw value in the millisecond range.
pub const MAX_MILLISECONDS_RAW: u8 = 0x7F;
const MIN_MICROSECONDS_RAW: u8 = 0xF1;
const MAX_MICROSECONDS_RAW: u8 = 0xF9;
const NANOS_PER_MILLISECOND: u128 = 1_000_000;
const NANOS_PER_STEP: u128 = 100_000;

/// Separation time used for reserved raw values.
pub const FALLBACK_TIME: Duration = Duration::from_millis(MAX_MILLISECONDS_RAW as u64);

/// True for raw values with no defined separation time.
pub fn is_reserved(raw: u8) -> bool {
    !matches!(raw, 0x00..=MAX_MILLISECONDS_RAW | MIN_MICROSECONDS_RAW..=MAX_MICROSECONDS_RAW)
}

/// Separation time described by a raw STmin byte.
///
/// Reserved values resolve to [`FALLBACK_TIME`] and are reported with a warning.
pub fn to_time(raw: u8) -> Duration {
    match raw {
        0x00..=MAX_MILLISECONDS_RAW => Duration::from_millis(raw as u64),
        MIN_MICROSECONDS_RAW..=MAX_MICROSECONDS_RAW => {
            Duration::from_micros((raw - 0xF0) as u64 * 100)
        }
        _ => {
            warn!(raw = %format!("{:#04X}", raw), "Unrecognized STmin value, using maximum");
            FALLBACK_TIME
        }
    }
}

/// Raw STmin byte for a separation time.
///
/// Only whole milliseconds up to 127 ms and 100 µs steps from 100 µs to 900 µs are
/// representable.
pub fn to_raw(time: Duration) -> Result<u8> {
    let nanos = time.as_nanos();
    if nanos % NANOS_PER_MILLISECOND == 0 {
        let millis = nanos / NANOS_PER_MILLISECOND;
        if millis <= MAX_MILLISECONDS_RAW as u128 {
            return Ok(millis as u8);
        }
    } else if nanos % NANOS_PER_STEP == 0 && nanos < NANOS_PER_MILLISECOND {
        return Ok(0xF0 + (nanos / NANOS_PER_STEP) as u8);
    }
    Err(IsoTpError::invalid_value(
        "STmin",
        format!("{:?} is not representable", time),
    ))
}

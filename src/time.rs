//! Recording timestamps and sample/timestamp conversion.
//!
//! Conversion is a pure function of one stream's declared sample rate.
//! There is no drift correction and no cross-stream resampling.

/// A second/nanosecond timestamp, as stored on disk.
///
/// Depending on context this is either absolute (seconds since the epoch,
/// e.g. the recording start time) or relative to the start of the recording
/// (e.g. frame timestamps, cue entries).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timespec {
    /// Seconds.
    pub sec: i64,
    /// Nanoseconds.
    pub nsec: i64,
}

impl Timespec {
    /// Create a timestamp from seconds and nanoseconds.
    pub const fn new(sec: i64, nsec: i64) -> Self {
        Timespec { sec, nsec }
    }

    /// Convert from fractional seconds.
    pub fn from_secs_f64(t: f64) -> Self {
        let sec = t.trunc();
        Timespec {
            sec: sec as i64,
            nsec: ((t - sec) * 1.0e9) as i64,
        }
    }

    /// Convert to fractional seconds.
    pub fn as_secs_f64(&self) -> f64 {
        self.sec as f64 + self.nsec as f64 * 1.0e-9
    }

    /// True when both fields are zero.
    pub const fn is_zero(&self) -> bool {
        self.sec == 0 && self.nsec == 0
    }
}

/// Get the timestamp of a sample index at the given sample rate.
///
/// Whole seconds are truncated, the remainder is rounded to nanoseconds.
pub fn timestamp_from_sample(samplerate: f64, sample: u64) -> Timespec {
    let t = sample as f64 / samplerate;
    let sec = t as i64;
    Timespec {
        sec,
        nsec: ((t - sec as f64) * 1.0e9 + 0.5) as i64,
    }
}

/// Get the sample index of a timestamp at the given sample rate, rounded to
/// the nearest sample.
pub fn sample_from_timestamp(samplerate: f64, timestamp: Timespec) -> u64 {
    (samplerate * timestamp.as_secs_f64() + 0.5) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_secs_round_trip() {
        let ts = Timespec::from_secs_f64(1.5);
        assert_eq!(ts.sec, 1);
        assert_relative_eq!(ts.nsec as f64, 5.0e8, max_relative = 1e-6);
        assert_relative_eq!(ts.as_secs_f64(), 1.5, max_relative = 1e-12);
    }

    #[test]
    fn test_timestamp_from_sample() {
        let ts = timestamp_from_sample(1000.0, 1500);
        assert_eq!(ts.sec, 1);
        assert_eq!(ts.nsec, 500_000_000);

        let ts = timestamp_from_sample(1000.0, 0);
        assert!(ts.is_zero());
    }

    #[test]
    fn test_inverse_law() {
        // sample -> timestamp -> sample must be exact within one sample.
        for rate in [1000.0, 44_100.0, 1.0e6, 98_304_000.0 / 256.0] {
            for sample in [0u64, 1, 99, 100, 12_345, 1_000_000] {
                let ts = timestamp_from_sample(rate, sample);
                let back = sample_from_timestamp(rate, ts);
                assert!(
                    back.abs_diff(sample) <= 1,
                    "rate {rate}: {sample} -> {back}"
                );
            }
        }
    }
}

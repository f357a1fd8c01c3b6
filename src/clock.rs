//! Time type shared by both channels.
//!
//! [`ClockTime`] is a nanosecond count (8 bytes, Copy). It is used for
//! channel-local timestamps and durations as well as for the common running
//! time both channels are mapped into. An unknown time is expressed as
//! `Option<ClockTime>`, never as a sentinel value.

use std::time::Duration;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Time in nanoseconds (8 bytes, Copy).
///
/// Arithmetic through the operators saturates: addition stops at
/// [`ClockTime::MAX`], subtraction stops at [`ClockTime::ZERO`]. Use the
/// `checked_*` methods when overflow must be detected.
///
/// # Examples
///
/// ```rust
/// use tandem::clock::ClockTime;
///
/// let t1 = ClockTime::from_secs(1);
/// let t2 = ClockTime::from_millis(500);
/// let t3 = t1 + t2;
///
/// assert_eq!(t3.millis(), 1500);
/// assert_eq!(format!("{}", t3), "1.500s");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ClockTime(u64);

impl ClockTime {
    /// Zero time.
    pub const ZERO: Self = Self(0);

    /// Maximum representable time.
    pub const MAX: Self = Self(u64::MAX);

    /// Create from nanoseconds.
    #[inline]
    pub const fn from_nanos(ns: u64) -> Self {
        Self(ns)
    }

    /// Create from microseconds.
    #[inline]
    pub const fn from_micros(us: u64) -> Self {
        Self(us.saturating_mul(1_000))
    }

    /// Create from milliseconds.
    #[inline]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms.saturating_mul(1_000_000))
    }

    /// Create from seconds.
    #[inline]
    pub const fn from_secs(s: u64) -> Self {
        Self(s.saturating_mul(NANOS_PER_SEC))
    }

    /// Duration of a single frame at `num / den` frames per second.
    ///
    /// Returns `None` for a zero numerator or denominator.
    ///
    /// ```rust
    /// use tandem::clock::ClockTime;
    ///
    /// assert_eq!(ClockTime::from_frame_rate(25, 1), Some(ClockTime::from_millis(40)));
    /// assert_eq!(ClockTime::from_frame_rate(0, 1), None);
    /// ```
    pub fn from_frame_rate(num: u32, den: u32) -> Option<Self> {
        if num == 0 || den == 0 {
            return None;
        }
        let nanos = (den as u128 * NANOS_PER_SEC as u128) / num as u128;
        u64::try_from(nanos).ok().map(Self)
    }

    /// Get as nanoseconds.
    #[inline]
    pub const fn nanos(self) -> u64 {
        self.0
    }

    /// Get as microseconds (truncated).
    #[inline]
    pub const fn micros(self) -> u64 {
        self.0 / 1_000
    }

    /// Get as milliseconds (truncated).
    #[inline]
    pub const fn millis(self) -> u64 {
        self.0 / 1_000_000
    }

    /// Get as seconds (truncated).
    #[inline]
    pub const fn secs(self) -> u64 {
        self.0 / NANOS_PER_SEC
    }

    /// Saturating addition.
    #[inline]
    pub const fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// Saturating subtraction.
    #[inline]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// Checked addition. Returns `None` on overflow.
    #[inline]
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Checked subtraction. Returns `None` on underflow.
    #[inline]
    pub const fn checked_sub(self, rhs: Self) -> Option<Self> {
        match self.0.checked_sub(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Multiply by a playback rate, rounding to the nearest nanosecond.
    ///
    /// A rate of exactly `1.0` is passed through without going through
    /// floating point. Returns `None` for a non-finite or negative rate, or
    /// when the product does not fit.
    pub fn scale(self, rate: f64) -> Option<Self> {
        if rate == 1.0 {
            return Some(self);
        }
        if !rate.is_finite() || rate < 0.0 {
            return None;
        }
        let scaled = (self.0 as f64 * rate).round();
        if scaled >= u64::MAX as f64 {
            return None;
        }
        Some(Self(scaled as u64))
    }
}

impl std::ops::Add for ClockTime {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }
}

impl std::ops::AddAssign for ClockTime {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = self.saturating_add(rhs);
    }
}

impl std::ops::Sub for ClockTime {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        self.saturating_sub(rhs)
    }
}

impl std::ops::SubAssign for ClockTime {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = self.saturating_sub(rhs);
    }
}

/// Wall-clock waits, such as a driver latency, expressed as running time.
/// Saturates at [`ClockTime::MAX`].
impl From<Duration> for ClockTime {
    #[inline]
    fn from(d: Duration) -> Self {
        Self(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }
}

impl std::fmt::Display for ClockTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ms = (self.0 / 1_000_000) % 1000;
        write!(f, "{}.{:03}s", self.secs(), ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_time_creation() {
        assert_eq!(ClockTime::from_nanos(1_000).nanos(), 1_000);
        assert_eq!(ClockTime::from_micros(1_000).nanos(), 1_000_000);
        assert_eq!(ClockTime::from_millis(1_000).nanos(), 1_000_000_000);
        assert_eq!(ClockTime::from_secs(1).nanos(), 1_000_000_000);
    }

    #[test]
    fn test_clock_time_units() {
        let t = ClockTime::from_millis(1500);
        assert_eq!(t.secs(), 1);
        assert_eq!(t.millis(), 1500);
        assert_eq!(t.micros(), 1_500_000);
    }

    #[test]
    fn test_clock_time_saturating() {
        let t = ClockTime::from_secs(1);

        assert_eq!(ClockTime::from_millis(100) - t, ClockTime::ZERO);
        assert_eq!(ClockTime::MAX + t, ClockTime::MAX);

        let mut acc = ClockTime::ZERO;
        acc += t;
        acc -= ClockTime::from_millis(250);
        assert_eq!(acc, ClockTime::from_millis(750));
    }

    #[test]
    fn test_clock_time_checked() {
        assert_eq!(ClockTime::MAX.checked_add(ClockTime::from_nanos(1)), None);
        assert_eq!(ClockTime::ZERO.checked_sub(ClockTime::from_nanos(1)), None);
        assert_eq!(
            ClockTime::from_secs(2).checked_sub(ClockTime::from_secs(1)),
            Some(ClockTime::from_secs(1))
        );
    }

    #[test]
    fn test_frame_rate_durations() {
        assert_eq!(
            ClockTime::from_frame_rate(25, 1),
            Some(ClockTime::from_millis(40))
        );
        // 29.97 fps truncates to whole nanoseconds
        assert_eq!(
            ClockTime::from_frame_rate(30_000, 1_001),
            Some(ClockTime::from_nanos(33_366_666))
        );
        assert_eq!(ClockTime::from_frame_rate(25, 0), None);
    }

    #[test]
    fn test_scale() {
        let t = ClockTime::from_secs(2);
        assert_eq!(t.scale(1.0), Some(t));
        assert_eq!(t.scale(0.5), Some(ClockTime::from_secs(1)));
        assert_eq!(t.scale(2.0), Some(ClockTime::from_secs(4)));
        assert_eq!(t.scale(-1.0), None);
        assert_eq!(t.scale(f64::NAN), None);
        assert_eq!(ClockTime::MAX.scale(2.0), None);
    }

    #[test]
    fn test_clock_time_display() {
        assert_eq!(format!("{}", ClockTime::from_millis(1500)), "1.500s");
        assert_eq!(format!("{}", ClockTime::ZERO), "0.000s");
    }

    #[test]
    fn test_clock_time_from_duration() {
        let t: ClockTime = Duration::from_millis(1500).into();
        assert_eq!(t, ClockTime::from_millis(1500));
        assert_eq!(ClockTime::from(Duration::MAX), ClockTime::MAX);
    }
}

//! Mapping of channel-local timestamps into running time.
//!
//! Each channel has one live [`TimeSegment`]. A segment is replaced as a
//! whole whenever the channel announces a new one; it is never edited in
//! place, so every computation sees either the old or the new mapping.
//!
//! # Running Time
//!
//! ```text
//! running = (local - base) * rate + offset      for base <= local <= stop
//! ```
//!
//! Timestamps before `base`, or after `stop` when a stop is set, have no
//! running time. Reverse playback is not supported: a segment with a rate
//! that is not strictly positive is rejected by [`TimeSegment::validate`].

use crate::channel::ChannelId;
use crate::clock::ClockTime;
use crate::error::{Error, Result};

/// Time segment of a channel (whole-value replace semantics).
///
/// # Example
///
/// ```rust
/// use tandem::clock::ClockTime;
/// use tandem::segment::TimeSegment;
///
/// let segment = TimeSegment::new()
///     .with_base(ClockTime::from_secs(10))
///     .with_offset(ClockTime::from_secs(1));
///
/// assert_eq!(
///     segment.to_running_time(ClockTime::from_secs(12)),
///     Some(ClockTime::from_secs(3))
/// );
/// assert_eq!(segment.to_running_time(ClockTime::from_secs(9)), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSegment {
    /// Local timestamp that maps to `offset`.
    pub base: ClockTime,
    /// Running time of `base`.
    pub offset: ClockTime,
    /// Rate applied to the local span since `base` (must be > 0).
    pub rate: f64,
    /// Last local timestamp inside the segment, if bounded.
    pub stop: Option<ClockTime>,
}

impl TimeSegment {
    /// Identity segment: base 0, offset 0, rate 1.0, unbounded.
    pub const fn new() -> Self {
        Self {
            base: ClockTime::ZERO,
            offset: ClockTime::ZERO,
            rate: 1.0,
            stop: None,
        }
    }

    /// Set the base.
    pub fn with_base(mut self, base: ClockTime) -> Self {
        self.base = base;
        self
    }

    /// Set the offset.
    pub fn with_offset(mut self, offset: ClockTime) -> Self {
        self.offset = offset;
        self
    }

    /// Set the rate.
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    /// Set the stop bound.
    pub fn with_stop(mut self, stop: ClockTime) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Check the segment is usable.
    ///
    /// `channel` is only used to annotate the error.
    pub fn validate(&self, channel: Option<ChannelId>) -> Result<()> {
        if !self.rate.is_finite() || self.rate <= 0.0 {
            return Err(Error::UnsupportedRate {
                channel,
                rate: self.rate,
            });
        }
        if let Some(stop) = self.stop {
            if stop < self.base {
                return Err(Error::InvalidSegment(format!(
                    "stop {} precedes base {}",
                    stop, self.base
                )));
            }
        }
        Ok(())
    }

    /// Whether a local timestamp lies inside the segment.
    #[inline]
    pub fn contains(&self, local: ClockTime) -> bool {
        local >= self.base && self.stop.is_none_or(|stop| local <= stop)
    }

    /// Convert a local timestamp to running time.
    ///
    /// Returns `None` when `local` is outside the segment or the result
    /// does not fit in a [`ClockTime`].
    pub fn to_running_time(&self, local: ClockTime) -> Option<ClockTime> {
        if !self.contains(local) {
            return None;
        }
        let span = local.checked_sub(self.base)?.scale(self.rate)?;
        span.checked_add(self.offset)
    }

    /// Clamp a local timestamp to the stop bound.
    #[inline]
    pub fn clamp_to_stop(&self, local: ClockTime) -> ClockTime {
        match self.stop {
            Some(stop) if local > stop => stop,
            _ => local,
        }
    }
}

impl Default for TimeSegment {
    fn default() -> Self {
        Self::new()
    }
}

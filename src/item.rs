//! Timestamped items carried by both channels.

use crate::clock::ClockTime;

/// A timestamped item pulled from a channel.
///
/// Primary items are frames; auxiliary items are sparse packets. An
/// auxiliary item marked as a gap states that there is no data for
/// `[timestamp, timestamp + duration)` and must carry a duration.
#[derive(Debug, Clone, PartialEq)]
pub struct Item<T> {
    /// Channel-local presentation timestamp.
    pub timestamp: Option<ClockTime>,
    /// Duration of the item's content.
    pub duration: Option<ClockTime>,
    /// The carried data.
    pub payload: T,
    /// Explicit absence of data over `duration`.
    pub is_gap: bool,
}

impl<T> Item<T> {
    /// Create an untimed item.
    pub fn new(payload: T) -> Self {
        Self {
            timestamp: None,
            duration: None,
            payload,
            is_gap: false,
        }
    }

    /// Create an item with a timestamp.
    pub fn at(timestamp: ClockTime, payload: T) -> Self {
        Self::new(payload).with_timestamp(timestamp)
    }

    /// Set the timestamp.
    pub fn with_timestamp(mut self, timestamp: ClockTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the duration.
    pub fn with_duration(mut self, duration: ClockTime) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Mark the item as a gap.
    pub fn into_gap(mut self) -> Self {
        self.is_gap = true;
        self
    }

    /// Timing view of this item.
    #[inline]
    pub fn timing(&self) -> ItemTiming {
        ItemTiming {
            timestamp: self.timestamp,
            duration: self.duration,
            is_gap: self.is_gap,
        }
    }

    /// Replace the payload, keeping the timing.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Item<U> {
        Item {
            timestamp: self.timestamp,
            duration: self.duration,
            payload: f(self.payload),
            is_gap: self.is_gap,
        }
    }
}

impl<T: Default> Item<T> {
    /// Create a gap item with an empty payload.
    pub fn gap(timestamp: ClockTime, duration: ClockTime) -> Self {
        Self::at(timestamp, T::default())
            .with_duration(duration)
            .into_gap()
    }
}

/// Timing fields of an item, returned by a non-consuming peek.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemTiming {
    /// Channel-local presentation timestamp.
    pub timestamp: Option<ClockTime>,
    /// Duration of the item's content.
    pub duration: Option<ClockTime>,
    /// Explicit absence of data.
    pub is_gap: bool,
}

//! Interval resolution for the primary channel.
//!
//! Each primary item owns the running-time window `[start, end)`. The start
//! comes from the item's own timestamp. The end comes from, in order:
//!
//! 1. the item's explicit duration, clamped to the segment stop;
//! 2. the start of the next primary item, peeked without consuming it;
//! 3. `start + nominal_frame_duration` once the primary channel is at end
//!    of stream and no successor will ever arrive.
//!
//! When none of these is available yet the resolver reports
//! [`Resolution::NeedMore`] and keeps the half-resolved frame.

use crate::channel::{Channel, ChannelId};
use crate::clock::ClockTime;
use crate::error::Result;
use crate::item::{Item, ItemTiming};
use crate::segment::TimeSegment;

/// Running-time window of a primary item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    /// Inclusive start.
    pub start: ClockTime,
    /// Exclusive end, `None` while unknown.
    pub end: Option<ClockTime>,
}

impl Interval {
    /// Create an interval with an unknown end.
    pub fn new(start: ClockTime) -> Self {
        Self { start, end: None }
    }

    /// Create an interval with a known end.
    pub fn bounded(start: ClockTime, end: ClockTime) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// Whether the end is known.
    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.end.is_some()
    }

    /// Length of the interval, once resolved.
    pub fn duration(&self) -> Option<ClockTime> {
        self.end.map(|end| end.saturating_sub(self.start))
    }

    /// Whether a running time falls inside `[start, end)`.
    ///
    /// Always `false` while the end is unknown.
    pub fn contains(&self, time: ClockTime) -> bool {
        self.end.is_some_and(|end| time >= self.start && time < end)
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.end {
            Some(end) => write!(f, "[{}, {})", self.start, end),
            None => write!(f, "[{}, ?)", self.start),
        }
    }
}

/// The primary item currently being merged, with its matched auxiliary items.
#[derive(Debug)]
pub struct PendingFrame<P, A> {
    primary: Item<P>,
    interval: Interval,
    matched: Vec<Item<A>>,
}

impl<P, A> PendingFrame<P, A> {
    /// Create a pending frame with nothing matched yet.
    pub fn new(primary: Item<P>, interval: Interval) -> Self {
        Self {
            primary,
            interval,
            matched: Vec::new(),
        }
    }

    /// The primary item.
    pub fn primary(&self) -> &Item<P> {
        &self.primary
    }

    /// The frame's interval.
    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// Matched auxiliary items, in match order.
    pub fn matched(&self) -> &[Item<A>] {
        &self.matched
    }

    /// Append a matched auxiliary item.
    pub fn push_matched(&mut self, item: Item<A>) {
        self.matched.push(item);
    }

    /// Split into the primary item and the matched list.
    pub fn into_parts(self) -> (Item<P>, Vec<Item<A>>) {
        (self.primary, self.matched)
    }
}

/// Outcome of [`IntervalResolver::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A pending frame with a known end is available.
    Ready,
    /// More primary data is needed.
    NeedMore,
    /// The primary channel is exhausted and no frame is pending.
    Eos,
}

/// Counters kept by the resolver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverStats {
    /// Primary items dropped because their start could not be resolved.
    pub primary_dropped: u64,
    /// Intervals closed with the end-of-stream fallback.
    pub eos_fallbacks: u64,
}

/// Resolves the interval of the pending primary item.
#[derive(Debug, Clone)]
pub struct IntervalResolver {
    segment: TimeSegment,
    nominal_frame_duration: ClockTime,
    stats: ResolverStats,
}

impl IntervalResolver {
    /// Create a resolver.
    pub fn new(segment: TimeSegment, nominal_frame_duration: ClockTime) -> Self {
        Self {
            segment,
            nominal_frame_duration,
            stats: ResolverStats::default(),
        }
    }

    /// The live primary segment.
    pub fn segment(&self) -> &TimeSegment {
        &self.segment
    }

    /// Replace the primary segment.
    pub fn set_segment(&mut self, segment: TimeSegment) -> Result<()> {
        segment.validate(Some(ChannelId::Primary))?;
        tracing::info!(
            base = %segment.base,
            offset = %segment.offset,
            rate = segment.rate,
            "primary segment updated"
        );
        self.segment = segment;
        Ok(())
    }

    /// Fallback frame duration used at end of stream.
    pub fn nominal_frame_duration(&self) -> ClockTime {
        self.nominal_frame_duration
    }

    /// Set the fallback frame duration.
    pub fn set_nominal_frame_duration(&mut self, duration: ClockTime) {
        self.nominal_frame_duration = duration;
    }

    /// Counters since creation.
    pub fn stats(&self) -> ResolverStats {
        self.stats
    }

    /// Make sure `pending` holds a frame whose end is known.
    ///
    /// Pulls a new primary item when nothing is pending. Never blocks.
    pub fn resolve<Q, A>(
        &mut self,
        primary: &mut Q,
        pending: &mut Option<PendingFrame<Q::Payload, A>>,
    ) -> Result<Resolution>
    where
        Q: Channel,
    {
        if pending.is_none() {
            match self.pull_frame(primary)? {
                Some(frame) => *pending = Some(frame),
                None if primary.is_exhausted() => return Ok(Resolution::Eos),
                None => return Ok(Resolution::NeedMore),
            }
        }

        let Some(frame) = pending.as_mut() else {
            return Ok(Resolution::NeedMore);
        };
        if frame.interval.is_resolved() {
            return Ok(Resolution::Ready);
        }

        match self.successor_start(primary)? {
            Some(next) => {
                let start = frame.interval.start;
                if next < start {
                    tracing::warn!(
                        start = %start,
                        next = %next,
                        "successor starts before pending frame, closing it empty"
                    );
                    frame.interval.end = Some(start);
                } else {
                    frame.interval.end = Some(next);
                }
            }
            None if primary.is_exhausted() => {
                let end = frame
                    .interval
                    .start
                    .saturating_add(self.nominal_frame_duration);
                tracing::debug!(
                    start = %frame.interval.start,
                    end = %end,
                    "end of stream, using nominal frame duration"
                );
                frame.interval.end = Some(end);
                self.stats.eos_fallbacks += 1;
            }
            None => return Ok(Resolution::NeedMore),
        }

        tracing::debug!(interval = %frame.interval, "interval resolved");
        Ok(Resolution::Ready)
    }

    fn apply_segments<Q: Channel>(&mut self, primary: &mut Q) -> Result<()> {
        while let Some(segment) = primary.take_segment() {
            self.set_segment(segment)?;
        }
        Ok(())
    }

    /// Pull primary items until one has a resolvable start.
    fn pull_frame<Q, A>(&mut self, primary: &mut Q) -> Result<Option<PendingFrame<Q::Payload, A>>>
    where
        Q: Channel,
    {
        loop {
            self.apply_segments(primary)?;
            let Some(item) = primary.pop() else {
                return Ok(None);
            };

            let Some(start) = self.start_of(item.timing()) else {
                self.drop_primary(item.timestamp);
                continue;
            };

            let mut interval = Interval::new(start);
            if let (Some(ts), Some(duration)) = (item.timestamp, item.duration) {
                let local_end = self.segment.clamp_to_stop(ts.saturating_add(duration));
                interval.end = self.segment.to_running_time(local_end);
            }
            tracing::trace!(interval = %interval, "primary item pulled");
            return Ok(Some(PendingFrame::new(item, interval)));
        }
    }

    /// Start of the next primary item, dropping successors that can never
    /// form an interval.
    fn successor_start<Q: Channel>(&mut self, primary: &mut Q) -> Result<Option<ClockTime>> {
        loop {
            self.apply_segments(primary)?;
            let Some(timing) = primary.peek() else {
                return Ok(None);
            };
            if let Some(start) = self.start_of(timing) {
                return Ok(Some(start));
            }
            primary.pop();
            self.drop_primary(timing.timestamp);
        }
    }

    fn start_of(&self, timing: ItemTiming) -> Option<ClockTime> {
        timing
            .timestamp
            .and_then(|ts| self.segment.to_running_time(ts))
    }

    fn drop_primary(&mut self, timestamp: Option<ClockTime>) {
        self.stats.primary_dropped += 1;
        tracing::warn!(
            timestamp = ?timestamp,
            "dropping primary item without a resolvable start"
        );
    }
}

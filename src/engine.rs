//! The merge engine state machine.
//!
//! [`MergeEngine`] pulls primary items, resolves their `[start, end)`
//! running-time interval and attaches every auxiliary item falling inside
//! it. Each closed interval is handed to the [`Emitter`] exactly once, in
//! interval order.
//!
//! # States
//!
//! ```text
//! AwaitingPrimary -> ResolvingBoundary -> CollectingAuxiliary -> Closing
//!        ^                                                          |
//!        +----------------------------------------------------------+
//!
//! AwaitingPrimary -> Drained     (primary exhausted, nothing pending)
//! any             -> Halted      (fatal error)
//! ```
//!
//! The engine never blocks. [`MergeEngine::step`] returns
//! [`StepResult::NeedMore`] whenever a channel has no data yet, and the
//! caller decides how to wait before stepping again. A live caller that
//! gave up waiting for auxiliary data passes `timeout = true`, which
//! closes the pending interval with what was collected so far.
//!
//! # Auxiliary Matching
//!
//! With `aux_time` the running time of the head auxiliary item and the
//! window floor being `previous_end`, or before the first close the
//! running time chosen by [`StartTimeSelection`] (the first frame's start
//! by default):
//!
//! - a gap item is consumed once `aux_time + duration < end`, otherwise
//!   the interval closes;
//! - a consumable gap ending at or before the floor is dropped as stale
//!   instead of being recorded. This is stricter than consuming and
//!   recording every gap: a gap the previous frame should have carried
//!   never lands on a later one. A gap whose timestamp falls outside the
//!   auxiliary segment is dropped the same way;
//! - `aux_time >= end` closes the interval (the item belongs to a later
//!   frame);
//! - `aux_time < floor` drops the item as stale;
//! - anything else is matched.

use crate::channel::{Channel, ChannelId};
use crate::clock::ClockTime;
use crate::config::{MergeConfig, StartTimeSelection};
use crate::emitter::Emitter;
use crate::error::{Error, Result};
use crate::item::ItemTiming;
use crate::observability::{MergeMetrics, span_engine, trace_halt, trace_state_change};
use crate::resolver::{Interval, IntervalResolver, PendingFrame, Resolution, ResolverStats};
use crate::segment::TimeSegment;
use tracing::Span;

/// State of a [`MergeEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    /// No primary item is pending.
    AwaitingPrimary,
    /// A primary item is pending but its end is unknown.
    ResolvingBoundary,
    /// Auxiliary items are being matched against the pending interval.
    CollectingAuxiliary,
    /// The pending interval is complete and about to be emitted.
    Closing,
    /// The primary channel is exhausted and nothing is pending.
    Drained,
    /// A fatal error stopped the engine.
    Halted,
}

impl MergeState {
    /// Returns the name of this state.
    pub fn name(&self) -> &'static str {
        match self {
            MergeState::AwaitingPrimary => "AwaitingPrimary",
            MergeState::ResolvingBoundary => "ResolvingBoundary",
            MergeState::CollectingAuxiliary => "CollectingAuxiliary",
            MergeState::Closing => "Closing",
            MergeState::Drained => "Drained",
            MergeState::Halted => "Halted",
        }
    }
}

impl std::fmt::Display for MergeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a single [`MergeEngine::step`].
#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    /// One interval was closed and emitted.
    Progress,
    /// A channel has no data yet; see [`MergeEngine::waiting_on`].
    NeedMore,
    /// The primary channel is exhausted and every interval was emitted.
    Eos,
    /// The engine is halted.
    Error(Error),
}

/// Counters kept by a merge engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Intervals handed to the emitter.
    pub frames_emitted: u64,
    /// Auxiliary data items matched.
    pub aux_matched: u64,
    /// Gap items recorded on a frame.
    pub aux_gaps: u64,
    /// Auxiliary items dropped as stale.
    pub aux_dropped_stale: u64,
    /// Primary items dropped for an unresolvable start.
    pub primary_dropped: u64,
    /// Intervals ended with the nominal frame duration.
    pub eos_fallbacks: u64,
    /// Intervals closed by a caller timeout.
    pub timeouts: u64,
}

/// Whether the collect loop may go on.
enum Collect {
    Close,
    NeedMore,
}

/// Merges a sparse auxiliary channel onto a primary frame channel.
///
/// # Example
///
/// ```rust
/// use tandem::prelude::*;
///
/// let (video_tx, video_rx) = item_queue::<u32>(8);
/// let (cc_tx, cc_rx) = item_queue::<&str>(8);
/// let config = MergeConfig::from_frame_rate(25, 1).unwrap();
/// let mut engine = MergeEngine::new(video_rx, cc_rx, FrameCollector::new(), config).unwrap();
///
/// video_tx.push(Item::at(ClockTime::ZERO, 0).with_duration(ClockTime::from_millis(40))).unwrap();
/// cc_tx.push(Item::at(ClockTime::from_millis(10), "hello")).unwrap();
/// video_tx.finish();
/// cc_tx.finish();
///
/// assert_eq!(engine.step(false), StepResult::Progress);
/// assert_eq!(engine.step(false), StepResult::Eos);
/// assert_eq!(engine.emitter().frames()[0].matched[0].payload, "hello");
/// ```
pub struct MergeEngine<P: Channel, A: Channel, E> {
    name: String,
    primary: P,
    auxiliary: A,
    emitter: E,
    resolver: IntervalResolver,
    aux_segment: TimeSegment,
    pending: Option<PendingFrame<P::Payload, A::Payload>>,
    previous_end: Option<ClockTime>,
    start_time: StartTimeSelection,
    state: MergeState,
    halted: Option<Error>,
    waiting_on: Option<ChannelId>,
    stats: MergeStats,
    metrics: MergeMetrics,
    span: Span,
}

impl<P, A, E> MergeEngine<P, A, E>
where
    P: Channel,
    A: Channel,
    E: Emitter<P::Payload, A::Payload>,
{
    /// Create an engine over two channels.
    ///
    /// Fails if `config` does not validate.
    pub fn new(primary: P, auxiliary: A, emitter: E, config: MergeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            metrics: MergeMetrics::new(&config.name),
            span: span_engine(&config.name),
            resolver: IntervalResolver::new(
                config.primary_segment,
                config.nominal_frame_duration,
            ),
            aux_segment: config.auxiliary_segment,
            start_time: config.start_time_selection,
            name: config.name,
            primary,
            auxiliary,
            emitter,
            pending: None,
            previous_end: None,
            state: MergeState::AwaitingPrimary,
            halted: None,
            waiting_on: None,
            stats: MergeStats::default(),
        })
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Advance the engine, closing at most one interval.
    ///
    /// `timeout` tells the engine the caller stopped waiting for auxiliary
    /// data: an interval still collecting is closed with what it has.
    pub fn step(&mut self, timeout: bool) -> StepResult {
        let span = self.span.clone();
        let _guard = span.enter();

        match self.run_step(timeout) {
            Ok(result) => result,
            Err(err) => StepResult::Error(self.halt(err)),
        }
    }

    /// Discard the pending frame and forget the last closed interval.
    ///
    /// Segments are kept. A halted engine stays halted.
    pub fn flush(&mut self) {
        let span = self.span.clone();
        let _guard = span.enter();

        self.pending = None;
        self.previous_end = None;
        self.waiting_on = None;
        if self.state != MergeState::Halted {
            self.set_state(MergeState::AwaitingPrimary);
        }
        tracing::info!("flushed");
    }

    /// Replace the segment of a channel.
    ///
    /// Affects items pulled afterwards only. An invalid segment halts the
    /// engine.
    pub fn set_segment(&mut self, channel: ChannelId, segment: TimeSegment) -> Result<()> {
        let span = self.span.clone();
        let _guard = span.enter();

        if let Some(err) = &self.halted {
            return Err(err.clone());
        }
        let result = match channel {
            ChannelId::Primary => self.resolver.set_segment(segment),
            ChannelId::Auxiliary => self.set_aux_segment(segment),
        };
        result.map_err(|err| self.halt(err))
    }

    /// Set the frame duration assumed at end of stream.
    pub fn set_nominal_frame_duration(&mut self, duration: ClockTime) -> Result<()> {
        if duration == ClockTime::ZERO {
            return Err(Error::Config(
                "nominal frame duration must be non-zero".into(),
            ));
        }
        self.resolver.set_nominal_frame_duration(duration);
        Ok(())
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Engine name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state.
    pub fn state(&self) -> MergeState {
        self.state
    }

    /// Channel the last [`StepResult::NeedMore`] was waiting for.
    pub fn waiting_on(&self) -> Option<ChannelId> {
        self.waiting_on
    }

    /// End of the last closed interval.
    pub fn previous_end(&self) -> Option<ClockTime> {
        self.previous_end
    }

    /// Interval of the pending frame.
    pub fn pending_interval(&self) -> Option<Interval> {
        self.pending.as_ref().map(PendingFrame::interval)
    }

    /// Live segment of a channel.
    pub fn segment(&self, channel: ChannelId) -> TimeSegment {
        match channel {
            ChannelId::Primary => *self.resolver.segment(),
            ChannelId::Auxiliary => self.aux_segment,
        }
    }

    /// Frame duration assumed at end of stream.
    pub fn nominal_frame_duration(&self) -> ClockTime {
        self.resolver.nominal_frame_duration()
    }

    /// Counters since creation.
    pub fn stats(&self) -> MergeStats {
        self.stats
    }

    /// The primary channel.
    pub fn primary(&self) -> &P {
        &self.primary
    }

    /// The auxiliary channel.
    pub fn auxiliary(&self) -> &A {
        &self.auxiliary
    }

    /// The emitter.
    pub fn emitter(&self) -> &E {
        &self.emitter
    }

    /// The emitter, mutably.
    pub fn emitter_mut(&mut self) -> &mut E {
        &mut self.emitter
    }

    /// Take the engine apart.
    pub fn into_parts(self) -> (P, A, E) {
        (self.primary, self.auxiliary, self.emitter)
    }

    // ========================================================================
    // State machine
    // ========================================================================

    fn run_step(&mut self, timeout: bool) -> Result<StepResult> {
        loop {
            match self.state {
                MergeState::AwaitingPrimary
                | MergeState::ResolvingBoundary
                | MergeState::Drained => {
                    let before = self.resolver.stats();
                    let resolution = self.resolver.resolve(&mut self.primary, &mut self.pending);
                    self.record_resolver_stats(before);

                    match resolution? {
                        Resolution::Ready => {
                            self.waiting_on = None;
                            self.set_state(MergeState::CollectingAuxiliary);
                        }
                        Resolution::NeedMore => {
                            let next = if self.pending.is_some() {
                                MergeState::ResolvingBoundary
                            } else {
                                MergeState::AwaitingPrimary
                            };
                            self.set_state(next);
                            self.waiting_on = Some(ChannelId::Primary);
                            return Ok(StepResult::NeedMore);
                        }
                        Resolution::Eos => {
                            if self.state != MergeState::Drained {
                                tracing::info!(
                                    frames = self.stats.frames_emitted,
                                    "primary end of stream, drained"
                                );
                            }
                            self.set_state(MergeState::Drained);
                            self.waiting_on = None;
                            return Ok(StepResult::Eos);
                        }
                    }
                }
                MergeState::CollectingAuxiliary => match self.collect(timeout)? {
                    Collect::Close => self.set_state(MergeState::Closing),
                    Collect::NeedMore => {
                        self.waiting_on = Some(ChannelId::Auxiliary);
                        return Ok(StepResult::NeedMore);
                    }
                },
                MergeState::Closing => {
                    self.close()?;
                    return Ok(StepResult::Progress);
                }
                MergeState::Halted => match &self.halted {
                    Some(err) => return Ok(StepResult::Error(err.clone())),
                    None => self.set_state(MergeState::AwaitingPrimary),
                },
            }
        }
    }

    /// Match auxiliary items against the pending interval.
    fn collect(&mut self, timeout: bool) -> Result<Collect> {
        let Some(Interval { start, end }) = self.pending_interval() else {
            return Ok(Collect::Close);
        };
        let end = end.unwrap_or(start);
        let floor = self
            .previous_end
            .unwrap_or_else(|| self.start_time.floor(start));

        loop {
            while let Some(segment) = self.auxiliary.take_segment() {
                Self::apply_aux_segment(&mut self.aux_segment, segment)?;
            }

            let Some(timing) = self.auxiliary.peek() else {
                if self.auxiliary.is_exhausted() {
                    return Ok(Collect::Close);
                }
                if timeout {
                    tracing::debug!(end = %end, "auxiliary timed out, closing interval");
                    self.stats.timeouts += 1;
                    self.metrics.record_timeout();
                    return Ok(Collect::Close);
                }
                return Ok(Collect::NeedMore);
            };
            let aux_time = timing
                .timestamp
                .and_then(|ts| self.aux_segment.to_running_time(ts));

            if timing.is_gap {
                let Some(duration) = timing.duration else {
                    return Err(Error::GapWithoutDuration {
                        timestamp: timing.timestamp,
                    });
                };
                let Some(aux_time) = aux_time else {
                    self.drop_stale(timing, "gap outside segment");
                    continue;
                };
                let gap_end = aux_time.saturating_add(duration);
                if gap_end >= end {
                    return Ok(Collect::Close);
                }
                if gap_end <= floor {
                    self.drop_stale(timing, "gap ended before window");
                    continue;
                }
            } else {
                let Some(aux_time) = aux_time else {
                    return Err(Error::InvalidAuxiliaryTimestamp {
                        timestamp: timing.timestamp,
                    });
                };
                if aux_time >= end {
                    return Ok(Collect::Close);
                }
                if aux_time < floor {
                    let reason = match self.previous_end {
                        Some(_) => "before previous end",
                        None => "before start time",
                    };
                    self.drop_stale(timing, reason);
                    continue;
                }
            }

            let Some(item) = self.auxiliary.pop() else {
                return Ok(Collect::NeedMore);
            };
            tracing::trace!(
                timestamp = ?item.timestamp,
                is_gap = item.is_gap,
                "auxiliary item matched"
            );
            if item.is_gap {
                self.stats.aux_gaps += 1;
            } else {
                self.stats.aux_matched += 1;
            }
            self.metrics.record_matched(item.is_gap);
            if let Some(frame) = self.pending.as_mut() {
                frame.push_matched(item);
            }
        }
    }

    /// Emit the pending frame.
    fn close(&mut self) -> Result<()> {
        let Some(frame) = self.pending.take() else {
            self.set_state(MergeState::AwaitingPrimary);
            return Ok(());
        };
        let interval = frame.interval();
        let end = interval.end.unwrap_or(interval.start);
        let (primary, matched) = frame.into_parts();
        let count = matched.len();

        self.emitter.emit(primary, matched)?;

        self.previous_end = Some(self.previous_end.map_or(end, |prev| prev.max(end)));
        self.stats.frames_emitted += 1;
        self.metrics.record_frame(count);
        tracing::debug!(interval = %interval, matched = count, "interval closed");
        self.set_state(MergeState::AwaitingPrimary);
        Ok(())
    }

    fn set_aux_segment(&mut self, segment: TimeSegment) -> Result<()> {
        Self::apply_aux_segment(&mut self.aux_segment, segment)
    }

    fn apply_aux_segment(live: &mut TimeSegment, segment: TimeSegment) -> Result<()> {
        segment.validate(Some(ChannelId::Auxiliary))?;
        tracing::info!(
            base = %segment.base,
            offset = %segment.offset,
            rate = segment.rate,
            "auxiliary segment updated"
        );
        *live = segment;
        Ok(())
    }

    fn drop_stale(&mut self, timing: ItemTiming, reason: &str) {
        self.auxiliary.pop();
        self.stats.aux_dropped_stale += 1;
        self.metrics.record_aux_dropped();
        tracing::warn!(
            timestamp = ?timing.timestamp,
            previous_end = ?self.previous_end,
            reason,
            "dropping stale auxiliary item"
        );
    }

    fn record_resolver_stats(&mut self, before: ResolverStats) {
        let after = self.resolver.stats();
        let dropped = after.primary_dropped - before.primary_dropped;
        let fallbacks = after.eos_fallbacks - before.eos_fallbacks;
        if dropped > 0 {
            self.stats.primary_dropped += dropped;
            self.metrics.record_primary_dropped(dropped);
        }
        if fallbacks > 0 {
            self.stats.eos_fallbacks += fallbacks;
            self.metrics.record_eos_fallbacks(fallbacks);
        }
    }

    fn halt(&mut self, err: Error) -> Error {
        trace_halt(&err);
        self.metrics.record_error();
        self.set_state(MergeState::Halted);
        self.waiting_on = None;
        self.halted = Some(err.clone());
        err
    }

    fn set_state(&mut self, state: MergeState) {
        if self.state != state {
            trace_state_change(self.state.name(), state.name());
            self.state = state;
        }
    }
}

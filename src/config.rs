//! Merge engine configuration.

use crate::channel::ChannelId;
use crate::clock::ClockTime;
use crate::error::{Error, Result};
use crate::segment::TimeSegment;

/// Where auxiliary matching starts before the first frame has closed.
///
/// Once a frame has been emitted the window floor is always the end of the
/// previous interval; this only decides what happens to auxiliary items
/// that precede the first frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StartTimeSelection {
    /// Start at running time zero, so early auxiliary items are matched to
    /// the first frame.
    Zero,
    /// Start at the first frame's start; earlier auxiliary items are stale.
    #[default]
    First,
    /// Start at a fixed running time. Auxiliary items before it are stale,
    /// even when they fall inside the first frame.
    Set(ClockTime),
}

impl StartTimeSelection {
    /// Window floor for a first frame starting at `first_start`.
    pub fn floor(&self, first_start: ClockTime) -> ClockTime {
        match self {
            StartTimeSelection::Zero => ClockTime::ZERO,
            StartTimeSelection::First => first_start,
            StartTimeSelection::Set(start) => *start,
        }
    }
}

/// Configuration for a [`MergeEngine`](crate::engine::MergeEngine).
///
/// There is no default nominal frame duration: it depends on the content
/// being merged and must be chosen explicitly.
///
/// # Example
///
/// ```rust
/// use tandem::config::MergeConfig;
/// use tandem::clock::ClockTime;
///
/// let config = MergeConfig::from_frame_rate(30000, 1001)
///     .unwrap()
///     .with_name("cc-merge");
/// assert_eq!(config.nominal_frame_duration, ClockTime::from_nanos(33_366_666));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MergeConfig {
    /// Engine name, used in logs and metric labels.
    pub name: String,
    /// Frame duration assumed for the last primary item at end of stream.
    pub nominal_frame_duration: ClockTime,
    /// Initial primary segment.
    pub primary_segment: TimeSegment,
    /// Initial auxiliary segment.
    pub auxiliary_segment: TimeSegment,
    /// Window floor before the first frame closes.
    pub start_time_selection: StartTimeSelection,
}

impl MergeConfig {
    /// Create a configuration with identity segments.
    pub fn new(nominal_frame_duration: ClockTime) -> Self {
        Self {
            name: "merge".to_string(),
            nominal_frame_duration,
            primary_segment: TimeSegment::new(),
            auxiliary_segment: TimeSegment::new(),
            start_time_selection: StartTimeSelection::default(),
        }
    }

    /// Create a configuration whose nominal frame duration is one frame at
    /// `num / den` frames per second.
    pub fn from_frame_rate(num: u32, den: u32) -> Result<Self> {
        let duration = ClockTime::from_frame_rate(num, den)
            .ok_or_else(|| Error::Config(format!("invalid frame rate {}/{}", num, den)))?;
        Ok(Self::new(duration))
    }

    /// Set the engine name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the initial primary segment.
    pub fn with_primary_segment(mut self, segment: TimeSegment) -> Self {
        self.primary_segment = segment;
        self
    }

    /// Set the initial auxiliary segment.
    pub fn with_auxiliary_segment(mut self, segment: TimeSegment) -> Self {
        self.auxiliary_segment = segment;
        self
    }

    /// Set the start time selection.
    pub fn with_start_time_selection(mut self, selection: StartTimeSelection) -> Self {
        self.start_time_selection = selection;
        self
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.nominal_frame_duration == ClockTime::ZERO {
            return Err(Error::Config(
                "nominal frame duration must be non-zero".into(),
            ));
        }
        self.primary_segment.validate(Some(ChannelId::Primary))?;
        self.auxiliary_segment
            .validate(Some(ChannelId::Auxiliary))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let seg = TimeSegment::new().with_offset(ClockTime::from_secs(1));
        let config = MergeConfig::new(ClockTime::from_millis(40))
            .with_name("test")
            .with_auxiliary_segment(seg);

        assert_eq!(config.name, "test");
        assert_eq!(config.auxiliary_segment, seg);
        assert_eq!(config.primary_segment, TimeSegment::new());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_frame_rate() {
        let config = MergeConfig::from_frame_rate(25, 1).unwrap();
        assert_eq!(config.nominal_frame_duration, ClockTime::from_millis(40));
        assert!(matches!(
            MergeConfig::from_frame_rate(0, 1),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_start_time_selection_floor() {
        let first = ClockTime::from_millis(1000);
        assert_eq!(StartTimeSelection::default(), StartTimeSelection::First);
        assert_eq!(StartTimeSelection::Zero.floor(first), ClockTime::ZERO);
        assert_eq!(StartTimeSelection::First.floor(first), first);
        assert_eq!(
            StartTimeSelection::Set(ClockTime::from_millis(800)).floor(first),
            ClockTime::from_millis(800)
        );

        let config = MergeConfig::new(ClockTime::from_millis(40))
            .with_start_time_selection(StartTimeSelection::Zero);
        assert_eq!(config.start_time_selection, StartTimeSelection::Zero);
    }

    #[test]
    fn test_validate() {
        assert!(matches!(
            MergeConfig::new(ClockTime::ZERO).validate(),
            Err(Error::Config(_))
        ));

        let config = MergeConfig::new(ClockTime::from_millis(40))
            .with_primary_segment(TimeSegment::new().with_rate(-1.0));
        assert!(matches!(
            config.validate(),
            Err(Error::UnsupportedRate {
                channel: Some(ChannelId::Primary),
                ..
            })
        ));
    }
}

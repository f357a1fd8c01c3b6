//! Error types for the merge engine.

use crate::channel::ChannelId;
use crate::clock::ClockTime;
use thiserror::Error;

/// Result type alias using the crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type.
///
/// The first four variants are protocol violations. The engine halts on a
/// protocol violation or an emit failure and keeps reporting that error from
/// every later step.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// An auxiliary gap item arrived without a duration.
    #[error("auxiliary gap item at {} has no duration", DisplayTime(.timestamp))]
    GapWithoutDuration {
        /// Local timestamp of the offending item.
        timestamp: Option<ClockTime>,
    },

    /// An auxiliary data item carried no timestamp, or one outside its segment.
    #[error("auxiliary item has an unresolvable timestamp ({})", DisplayTime(.timestamp))]
    InvalidAuxiliaryTimestamp {
        /// Local timestamp of the offending item.
        timestamp: Option<ClockTime>,
    },

    /// A segment with a zero, negative or non-finite rate.
    #[error("unsupported segment rate {rate}{}", DisplayChannel(.channel))]
    UnsupportedRate {
        /// Channel the segment was meant for, when known.
        channel: Option<ChannelId>,
        /// The rejected rate.
        rate: f64,
    },

    /// A segment whose bounds are inconsistent.
    #[error("invalid segment: {0}")]
    InvalidSegment(String),

    /// The emitter refused a completed frame.
    #[error("emit failed: {0}")]
    Emit(#[from] EmitError),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A push after end of stream was signalled.
    #[error("channel is at end of stream")]
    EndOfStream,

    /// A push while the channel is flushing.
    #[error("channel is flushing")]
    Flushing,

    /// A bounded wait expired.
    #[error("operation timed out")]
    Timeout,
}

impl Error {
    /// Whether this error is an upstream contract violation that halts the engine.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Error::GapWithoutDuration { .. }
                | Error::InvalidAuxiliaryTimestamp { .. }
                | Error::UnsupportedRate { .. }
                | Error::InvalidSegment(_)
        )
    }
}

/// Error returned by an [`Emitter`](crate::emitter::Emitter).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EmitError {
    message: String,
}

impl EmitError {
    /// Create an emit error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

struct DisplayTime<'a>(&'a Option<ClockTime>);

impl std::fmt::Display for DisplayTime<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(t) => write!(f, "{}", t),
            None => write!(f, "none"),
        }
    }
}

struct DisplayChannel<'a>(&'a Option<ChannelId>);

impl std::fmt::Display for DisplayChannel<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(channel) => write!(f, " on {} channel", channel),
            None => Ok(()),
        }
    }
}

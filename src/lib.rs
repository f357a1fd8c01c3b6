//! # Tandem
//!
//! A time-windowed stream merge engine.
//!
//! Tandem attaches the items of a sparse *auxiliary* stream (captions,
//! metadata, telemetry packets) to the frames of a regular *primary* stream.
//! Every primary item owns the running-time interval `[start, end)` up to
//! the next frame; every auxiliary item whose running time falls inside that
//! interval is delivered together with the frame.
//!
//! ## Features
//!
//! - **Segment mapping**: per-channel base/offset/rate/stop mapping into running time
//! - **Boundary inference**: explicit durations, successor peek-ahead, end-of-stream fallback
//! - **Non-blocking core**: `step()` returns `NeedMore` instead of waiting
//! - **Live timeouts**: a driver closes frames when auxiliary data is late
//! - **Observability**: `tracing` events and `metrics` counters
//!
//! ## Quick Start
//!
//! ```rust
//! use tandem::prelude::*;
//!
//! let (video_tx, video_rx) = item_queue::<u32>(16);
//! let (cc_tx, cc_rx) = item_queue::<&str>(16);
//! let config = MergeConfig::from_frame_rate(1, 1).unwrap();
//! let mut engine = MergeEngine::new(video_rx, cc_rx, FrameCollector::new(), config).unwrap();
//!
//! for n in 0..3 {
//!     video_tx.push(Item::at(ClockTime::from_secs(n), n as u32).with_duration(ClockTime::from_secs(1))).unwrap();
//! }
//! cc_tx.push(Item::at(ClockTime::from_millis(500), "a")).unwrap();
//! cc_tx.push(Item::at(ClockTime::from_millis(1500), "b")).unwrap();
//! video_tx.finish();
//! cc_tx.finish();
//!
//! while engine.step(false) == StepResult::Progress {}
//!
//! let frames = engine.emitter().frames();
//! assert_eq!(frames.len(), 3);
//! assert_eq!(frames[0].matched[0].payload, "a");
//! assert_eq!(frames[1].matched[0].payload, "b");
//! assert!(frames[2].matched.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod clock;
pub mod config;
pub mod driver;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod item;
pub mod observability;
pub mod queue;
pub mod resolver;
pub mod segment;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::channel::{Channel, ChannelId};
    pub use crate::clock::ClockTime;
    pub use crate::config::{MergeConfig, StartTimeSelection};
    pub use crate::driver::{Driver, DriverConfig};
    pub use crate::emitter::{Emitter, FrameCollector, MergedFrame};
    pub use crate::engine::{MergeEngine, MergeState, MergeStats, StepResult};
    pub use crate::error::{EmitError, Error, Result};
    pub use crate::item::Item;
    pub use crate::queue::{QueueReceiver, QueueSender, item_queue};
    pub use crate::segment::TimeSegment;
}

pub use error::{Error, Result};

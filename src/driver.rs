//! Blocking host loop for a merge engine fed by item queues.
//!
//! The engine itself never waits. The [`Driver`] is the scheduler that
//! does: whenever a step reports `NeedMore` it blocks on the channel the
//! engine is waiting for, and steps again once data arrived.
//!
//! # Live Mode
//!
//! In live mode (the default) the driver waits at most `latency` for
//! auxiliary data. When that wait expires the next step is taken with
//! `timeout = true`, so the pending frame is emitted with what was
//! collected instead of stalling the primary stream behind a sparse one.
//! Waits on the primary channel never trigger a timeout.
//!
//! # Example
//!
//! ```rust
//! use tandem::prelude::*;
//! use std::thread;
//!
//! let (video_tx, video_rx) = item_queue::<u32>(8);
//! let (cc_tx, cc_rx) = item_queue::<u32>(8);
//! let config = MergeConfig::from_frame_rate(25, 1).unwrap();
//! let engine = MergeEngine::new(video_rx, cc_rx, FrameCollector::new(), config).unwrap();
//! let mut driver = Driver::new(engine, DriverConfig::default());
//!
//! let producer = thread::spawn(move || {
//!     for n in 0..3u64 {
//!         let ts = ClockTime::from_millis(n * 40);
//!         video_tx.push(Item::at(ts, n as u32)).unwrap();
//!         cc_tx.push(Item::at(ts, n as u32)).unwrap();
//!     }
//!     video_tx.finish();
//!     cc_tx.finish();
//! });
//!
//! assert_eq!(driver.run().unwrap(), 3);
//! producer.join().unwrap();
//! ```

use crate::channel::ChannelId;
use crate::clock::ClockTime;
use crate::emitter::Emitter;
use crate::engine::{MergeEngine, StepResult};
use crate::error::Result;
use crate::queue::QueueReceiver;
use std::time::Duration;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for a [`Driver`].
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// How long to wait for auxiliary data before closing the pending
    /// frame, and the poll period for primary waits.
    pub latency: Duration,
    /// Whether auxiliary waits time out.
    pub live: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(200),
            live: true,
        }
    }
}

impl DriverConfig {
    /// Set the auxiliary latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Set live mode.
    pub fn with_live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Drives a [`MergeEngine`] to completion, blocking on its queues.
pub struct Driver<P, A, E> {
    engine: MergeEngine<QueueReceiver<P>, QueueReceiver<A>, E>,
    config: DriverConfig,
}

impl<P, A, E> Driver<P, A, E>
where
    E: Emitter<P, A>,
{
    /// Create a driver.
    pub fn new(
        engine: MergeEngine<QueueReceiver<P>, QueueReceiver<A>, E>,
        config: DriverConfig,
    ) -> Self {
        Self { engine, config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Step the engine, waiting once for data if it needs more.
    ///
    /// Returns `NeedMore` only when the wait ended without the engine
    /// making progress; callers normally just call again.
    pub fn step_blocking(&mut self) -> StepResult {
        let result = self.engine.step(false);
        if result != StepResult::NeedMore {
            return result;
        }

        match self.engine.waiting_on() {
            Some(ChannelId::Auxiliary) if self.config.live => {
                if self.engine.auxiliary().wait_for_data(self.config.latency) {
                    self.engine.step(false)
                } else {
                    tracing::debug!(
                        latency = %ClockTime::from(self.config.latency),
                        "auxiliary wait expired"
                    );
                    self.engine.step(true)
                }
            }
            Some(ChannelId::Auxiliary) => {
                self.engine.auxiliary().wait_for_data(self.config.latency);
                self.engine.step(false)
            }
            Some(ChannelId::Primary) => {
                self.engine.primary().wait_for_data(self.config.latency);
                self.engine.step(false)
            }
            None => result,
        }
    }

    /// Run until the primary channel is drained.
    ///
    /// Returns the number of frames emitted by this run, or the error that
    /// halted the engine.
    pub fn run(&mut self) -> Result<u64> {
        let first = self.engine.stats().frames_emitted;
        tracing::info!(engine = %self.engine.name(), "driver started");

        loop {
            match self.step_blocking() {
                StepResult::Progress | StepResult::NeedMore => {}
                StepResult::Eos => {
                    let frames = self.engine.stats().frames_emitted - first;
                    tracing::info!(engine = %self.engine.name(), frames, "driver finished");
                    return Ok(frames);
                }
                StepResult::Error(err) => return Err(err),
            }
        }
    }

    /// The driven engine.
    pub fn engine(&self) -> &MergeEngine<QueueReceiver<P>, QueueReceiver<A>, E> {
        &self.engine
    }

    /// The driven engine, mutably.
    pub fn engine_mut(&mut self) -> &mut MergeEngine<QueueReceiver<P>, QueueReceiver<A>, E> {
        &mut self.engine
    }

    /// Take back the engine.
    pub fn into_engine(self) -> MergeEngine<QueueReceiver<P>, QueueReceiver<A>, E> {
        self.engine
    }
}

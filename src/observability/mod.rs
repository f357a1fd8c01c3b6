//! Observability features: metrics and tracing.
//!
//! - **Metrics**: Counters and histograms via `metrics-rs`
//! - **Tracing**: Structured logging and spans via `tracing`
//!
//! ## Metrics
//!
//! Every merge engine records the following metrics, labelled with
//! `engine`:
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `tandem_frames_emitted` | Counter | Closed intervals handed to the emitter |
//! | `tandem_aux_matched` | Counter | Auxiliary items attached to a frame |
//! | `tandem_aux_gaps` | Counter | Gap items recorded on a frame |
//! | `tandem_aux_dropped` | Counter | Stale auxiliary items dropped |
//! | `tandem_primary_dropped` | Counter | Primary items without a resolvable start |
//! | `tandem_eos_fallbacks` | Counter | Intervals ended with the nominal duration |
//! | `tandem_timeouts` | Counter | Intervals closed by a live timeout |
//! | `tandem_errors` | Counter | Fatal errors |
//! | `tandem_matched_per_frame` | Histogram | Auxiliary items per emitted frame |
//!
//! Nothing is recorded until the application installs a recorder.
//!
//! ## Tracing
//!
//! Each engine step runs inside an `engine` span carrying the engine name.
//!
//! ## Example
//!
//! ```rust
//! use tandem::observability::init_metrics;
//!
//! // Describe metrics (call once at startup)
//! init_metrics();
//! ```

mod metrics;
mod tracing_support;

pub use metrics::{MergeMetrics, init_metrics};
pub use tracing_support::{span_engine, trace_halt, trace_state_change};

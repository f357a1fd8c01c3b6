//! Metrics collection using metrics-rs.

use metrics::{Counter, Histogram, Unit, counter, histogram};
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether metrics have been initialized.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

const FRAMES_EMITTED: &str = "tandem_frames_emitted";
const AUX_MATCHED: &str = "tandem_aux_matched";
const AUX_GAPS: &str = "tandem_aux_gaps";
const AUX_DROPPED: &str = "tandem_aux_dropped";
const PRIMARY_DROPPED: &str = "tandem_primary_dropped";
const EOS_FALLBACKS: &str = "tandem_eos_fallbacks";
const TIMEOUTS: &str = "tandem_timeouts";
const ERRORS: &str = "tandem_errors";
const MATCHED_PER_FRAME: &str = "tandem_matched_per_frame";

/// Initialize metrics descriptions.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    metrics::describe_counter!(
        FRAMES_EMITTED,
        Unit::Count,
        "Total number of merged frames handed to the emitter"
    );
    metrics::describe_counter!(
        AUX_MATCHED,
        Unit::Count,
        "Total number of auxiliary items attached to a frame"
    );
    metrics::describe_counter!(AUX_GAPS, Unit::Count, "Total number of gap items recorded");
    metrics::describe_counter!(
        AUX_DROPPED,
        Unit::Count,
        "Total number of stale auxiliary items dropped"
    );
    metrics::describe_counter!(
        PRIMARY_DROPPED,
        Unit::Count,
        "Total number of primary items dropped for an unresolvable start"
    );
    metrics::describe_counter!(
        EOS_FALLBACKS,
        Unit::Count,
        "Intervals ended with the nominal frame duration at end of stream"
    );
    metrics::describe_counter!(
        TIMEOUTS,
        Unit::Count,
        "Intervals closed early because the auxiliary channel timed out"
    );
    metrics::describe_counter!(ERRORS, Unit::Count, "Fatal merge errors");
    metrics::describe_histogram!(
        MATCHED_PER_FRAME,
        Unit::Count,
        "Auxiliary items matched to each emitted frame"
    );
}

/// Metrics handles for one merge engine.
///
/// Labels are resolved once at construction.
#[derive(Clone)]
pub struct MergeMetrics {
    engine: String,
    frames_emitted: Counter,
    aux_matched: Counter,
    aux_gaps: Counter,
    aux_dropped: Counter,
    primary_dropped: Counter,
    eos_fallbacks: Counter,
    timeouts: Counter,
    errors: Counter,
    matched_per_frame: Histogram,
}

impl MergeMetrics {
    /// Create the metrics handles for an engine.
    pub fn new(engine: &str) -> Self {
        Self {
            engine: engine.to_string(),
            frames_emitted: counter!(FRAMES_EMITTED, "engine" => engine.to_string()),
            aux_matched: counter!(AUX_MATCHED, "engine" => engine.to_string()),
            aux_gaps: counter!(AUX_GAPS, "engine" => engine.to_string()),
            aux_dropped: counter!(AUX_DROPPED, "engine" => engine.to_string()),
            primary_dropped: counter!(PRIMARY_DROPPED, "engine" => engine.to_string()),
            eos_fallbacks: counter!(EOS_FALLBACKS, "engine" => engine.to_string()),
            timeouts: counter!(TIMEOUTS, "engine" => engine.to_string()),
            errors: counter!(ERRORS, "engine" => engine.to_string()),
            matched_per_frame: histogram!(MATCHED_PER_FRAME, "engine" => engine.to_string()),
        }
    }

    /// Record an emitted frame and the size of its matched list.
    #[inline]
    pub fn record_frame(&self, matched: usize) {
        self.frames_emitted.increment(1);
        self.matched_per_frame.record(matched as f64);
    }

    /// Record a matched auxiliary item.
    #[inline]
    pub fn record_matched(&self, is_gap: bool) {
        if is_gap {
            self.aux_gaps.increment(1);
        } else {
            self.aux_matched.increment(1);
        }
    }

    /// Record a dropped stale auxiliary item.
    #[inline]
    pub fn record_aux_dropped(&self) {
        self.aux_dropped.increment(1);
    }

    /// Record dropped primary items.
    #[inline]
    pub fn record_primary_dropped(&self, count: u64) {
        self.primary_dropped.increment(count);
    }

    /// Record end-of-stream fallbacks.
    #[inline]
    pub fn record_eos_fallbacks(&self, count: u64) {
        self.eos_fallbacks.increment(count);
    }

    /// Record an interval closed by timeout.
    #[inline]
    pub fn record_timeout(&self) {
        self.timeouts.increment(1);
    }

    /// Record a fatal error.
    #[inline]
    pub fn record_error(&self) {
        self.errors.increment(1);
    }

    /// Get the engine name.
    pub fn engine(&self) -> &str {
        &self.engine
    }
}

impl std::fmt::Debug for MergeMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeMetrics")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics() {
        init_metrics();
        // idempotent
        init_metrics();
    }

    #[test]
    fn test_merge_metrics_without_recorder() {
        let metrics = MergeMetrics::new("test-engine");

        metrics.record_frame(3);
        metrics.record_matched(false);
        metrics.record_matched(true);
        metrics.record_aux_dropped();
        metrics.record_primary_dropped(2);
        metrics.record_eos_fallbacks(1);
        metrics.record_timeout();
        metrics.record_error();

        assert_eq!(metrics.engine(), "test-engine");
    }
}

// src/metrics.rs
//
// Run observability. Counters for every stage of the pipeline,
// summarised in logs at the end of a run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub detections_accepted: Arc<AtomicU64>,
    pub detections_skipped: Arc<AtomicU64>,
    pub events_finalized: Arc<AtomicU64>,
    pub sink_successes: Arc<AtomicU64>,
    pub sink_failures: Arc<AtomicU64>,
    /// Sum of accepted detection scores, scaled by 1e6 so it fits an
    /// atomic integer
    pub confidence_sum_micros: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            detections_accepted: Arc::new(AtomicU64::new(0)),
            detections_skipped: Arc::new(AtomicU64::new(0)),
            events_finalized: Arc::new(AtomicU64::new(0)),
            sink_successes: Arc::new(AtomicU64::new(0)),
            sink_failures: Arc::new(AtomicU64::new(0)),
            confidence_sum_micros: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_confidence(&self, score: f32) {
        let micros = (score.clamp(0.0, 1.0) as f64 * 1e6) as u64;
        self.confidence_sum_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn mean_confidence(&self) -> f64 {
        let accepted = self.detections_accepted.load(Ordering::Relaxed);
        if accepted == 0 {
            return 0.0;
        }
        let sum = self.confidence_sum_micros.load(Ordering::Relaxed) as f64 / 1e6;
        sum / accepted as f64
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            fps: self.fps(),
            detections_accepted: self.detections_accepted.load(Ordering::Relaxed),
            detections_skipped: self.detections_skipped.load(Ordering::Relaxed),
            mean_confidence: self.mean_confidence(),
            events_finalized: self.events_finalized.load(Ordering::Relaxed),
            sink_successes: self.sink_successes.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub fps: f64,
    pub detections_accepted: u64,
    pub detections_skipped: u64,
    pub mean_confidence: f64,
    pub events_finalized: u64,
    pub sink_successes: u64,
    pub sink_failures: u64,
    pub elapsed_secs: f64,
}

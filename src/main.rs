// src/main.rs

mod config;
mod frame_log;
mod location;
mod metrics;
mod sink;
mod tracker;
mod types;

use anyhow::Result;
use frame_log::FrameLogSource;
use location::LocationProvider;
use metrics::PipelineMetrics;
use sink::EventSink;
use std::time::Duration;
use tracker::Tracker;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = types::Config::load("config.yaml")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Traffic analyser starting");
    info!(
        "Tracking thresholds: height_tolerance={:.2}, grace_threshold={}, min_confidence={:.2}",
        config.tracking.height_tolerance,
        config.tracking.grace_threshold,
        config.tracking.min_confidence
    );
    info!("Event sink: {}", config.sink.url);

    let metrics = PipelineMetrics::new();
    let location = LocationProvider::from_config(&config.location);
    let sink = EventSink::new(&config.sink, metrics.clone())?;
    let source = FrameLogSource::new(config.input.clone());

    let log_files = source.find_log_files()?;
    if log_files.is_empty() {
        error!("No detection logs found in {}", config.input.log_dir);
        return Ok(());
    }

    let mut tracker = Tracker::new(config.tracking.clone());

    for (idx, path) in log_files.iter().enumerate() {
        info!(
            "Processing log {}/{}: {}",
            idx + 1,
            log_files.len(),
            path.display()
        );

        let mut reader = source.open(path)?;
        let mut frames_in_log: u64 = 0;

        while let Some(frame) = reader.next_frame()? {
            metrics.inc(&metrics.total_frames);
            frames_in_log += 1;

            for detection in &frame.detections {
                if detection.score.is_finite()
                    && detection.score >= config.tracking.min_confidence
                {
                    metrics.inc(&metrics.detections_accepted);
                    metrics.add_confidence(detection.score);
                } else {
                    metrics.inc(&metrics.detections_skipped);
                }
            }

            for event in tracker.process(&frame, location.snapshot()) {
                metrics.inc(&metrics.events_finalized);
                sink.deliver(event);
            }

            if frames_in_log % 300 == 0 {
                debug!(
                    "{} frames into {}, {} live track(s)",
                    frames_in_log,
                    path.display(),
                    tracker.snapshot().len()
                );
            }
        }

        if config.input.drain_at_end {
            let leftovers = tracker.drain(location.snapshot());
            if !leftovers.is_empty() {
                info!(
                    "Draining {} live track(s) at end of {}",
                    leftovers.len(),
                    path.display()
                );
            }
            for event in leftovers {
                metrics.inc(&metrics.events_finalized);
                sink.deliver(event);
            }
        }
    }

    // Let spawned deliveries settle before the runtime shuts down
    sink.flush(Duration::from_secs(config.sink.timeout_secs + 1))
        .await;

    let summary = metrics.summary();
    info!("Run complete:");
    info!(
        "  Frames: {} ({:.1} fps)",
        summary.total_frames, summary.fps
    );
    info!(
        "  Detections: {} accepted, {} skipped (mean confidence {:.3})",
        summary.detections_accepted, summary.detections_skipped, summary.mean_confidence
    );
    info!(
        "  Tracks created: {}, still live: {}, events finalized: {}",
        tracker.created_total(),
        tracker.live_count(),
        summary.events_finalized
    );
    info!(
        "  Sink: {} stored, {} failed",
        summary.sink_successes, summary.sink_failures
    );

    Ok(())
}

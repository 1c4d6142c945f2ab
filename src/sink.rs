// src/sink.rs
//
// Fire-and-forget delivery of passage events to the HTTP event sink.
//
// Delivery runs on a spawned task so a slow or failing sink never stalls
// the frame path. Failures are logged and counted, never retried here:
// the tracker already removed the track, so emission is at-most-once.

use crate::metrics::PipelineMetrics;
use crate::types::{PassageEvent, SinkConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Wire payload expected by the storage API.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventPayload {
    pub category: String,
    /// Epoch milliseconds of the track's last confirmed match
    pub timestamp: u64,
    pub latitude: f64,
    pub longitude: f64,
    pub direction: String,
}

impl EventPayload {
    /// Unavailable position maps to the 0.0/0.0 placeholder the storage
    /// API already accepts.
    pub fn from_event(event: &PassageEvent) -> Self {
        let (latitude, longitude) = match event.position {
            Some(pos) => (pos.latitude, pos.longitude),
            None => (0.0, 0.0),
        };
        Self {
            category: event.category.clone(),
            timestamp: event.timestamp_ms,
            latitude,
            longitude,
            direction: event.direction.as_str().to_string(),
        }
    }
}

pub struct EventSink {
    http_client: reqwest::Client,
    url: String,
    enabled: bool,
    metrics: PipelineMetrics,
    in_flight: Arc<AtomicU64>,
}

impl EventSink {
    pub fn new(config: &SinkConfig, metrics: PipelineMetrics) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        if !config.enabled {
            info!("Event sink disabled; finalized events will only be logged");
        }

        Ok(Self {
            http_client,
            url: config.url.clone(),
            enabled: config.enabled,
            metrics,
            in_flight: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Hand one finalized event to the sink. Returns immediately; the POST
    /// happens on a spawned task.
    pub fn deliver(&self, event: PassageEvent) {
        if !self.enabled {
            debug!(
                "Sink disabled, dropping event for T{} ({})",
                event.track_id, event.category
            );
            return;
        }

        let payload = EventPayload::from_event(&event);
        let delivery_id = uuid::Uuid::new_v4();
        let client = self.http_client.clone();
        let url = self.url.clone();
        let metrics = self.metrics.clone();
        let in_flight = Arc::clone(&self.in_flight);

        in_flight.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            debug!(
                "Posting event {} for T{}: {} {}",
                delivery_id, event.track_id, payload.category, payload.direction
            );
            match client.post(&url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    info!(
                        "Event {} stored: {} {} @ {}",
                        delivery_id, payload.category, payload.direction, payload.timestamp
                    );
                    metrics.inc(&metrics.sink_successes);
                }
                Ok(response) => {
                    error!(
                        "Sink returned {} for event {}: {}",
                        response.status(),
                        delivery_id,
                        response
                            .text()
                            .await
                            .unwrap_or_else(|_| "<no body>".to_string())
                    );
                    metrics.inc(&metrics.sink_failures);
                }
                Err(e) => {
                    error!("Delivery of event {} failed: {}", delivery_id, e);
                    metrics.inc(&metrics.sink_failures);
                }
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }

    /// Wait for in-flight deliveries to settle, up to `max_wait`. Used at
    /// the end of a batch run so spawned posts are not cut off by exit.
    pub async fn flush(&self, max_wait: Duration) {
        let deadline = tokio::time::Instant::now() + max_wait;
        while self.in_flight.load(Ordering::SeqCst) > 0 {
            if tokio::time::Instant::now() >= deadline {
                error!(
                    "{} deliveries still in flight at shutdown",
                    self.in_flight.load(Ordering::SeqCst)
                );
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, GeoPosition};

    fn event(position: Option<GeoPosition>) -> PassageEvent {
        PassageEvent {
            track_id: 7,
            category: "car".to_string(),
            timestamp_ms: 1700000000000,
            position,
            direction: Direction::Left,
            frames_seen: 12,
        }
    }

    #[test]
    fn test_payload_carries_position_and_direction() {
        let payload = EventPayload::from_event(&event(Some(GeoPosition {
            latitude: 51.5007,
            longitude: -0.1246,
        })));

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["category"], "car");
        assert_eq!(json["timestamp"], 1700000000000u64);
        assert_eq!(json["direction"], "LEFT");
        assert!((json["latitude"].as_f64().unwrap() - 51.5007).abs() < 1e-9);
        assert!((json["longitude"].as_f64().unwrap() + 0.1246).abs() < 1e-9);
    }

    #[test]
    fn test_unavailable_position_uses_placeholder() {
        let payload = EventPayload::from_event(&event(None));
        assert_eq!(payload.latitude, 0.0);
        assert_eq!(payload.longitude, 0.0);
    }

    #[tokio::test]
    async fn test_disabled_sink_drops_without_spawning() {
        let metrics = PipelineMetrics::new();
        let sink = EventSink::new(
            &SinkConfig {
                url: "http://localhost:1/api/data".to_string(),
                timeout_secs: 1,
                enabled: false,
            },
            metrics.clone(),
        )
        .unwrap();

        sink.deliver(event(None));
        sink.flush(Duration::from_millis(100)).await;
        assert_eq!(
            metrics.sink_failures.load(std::sync::atomic::Ordering::Relaxed),
            0
        );
    }

    #[tokio::test]
    async fn test_unreachable_sink_counts_failure() {
        let metrics = PipelineMetrics::new();
        let sink = EventSink::new(
            &SinkConfig {
                // Port 1 is essentially never listening
                url: "http://127.0.0.1:1/api/data".to_string(),
                timeout_secs: 1,
                enabled: true,
            },
            metrics.clone(),
        )
        .unwrap();

        sink.deliver(event(None));
        sink.flush(Duration::from_secs(3)).await;
        assert_eq!(
            metrics.sink_failures.load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub tracking: TrackingConfig,
    pub input: InputConfig,
    pub sink: SinkConfig,
    pub location: LocationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Maximum relative height difference for a detection to match a track
    pub height_tolerance: f32,
    /// Consecutive unmatched frames a track tolerates before finalization
    pub grace_threshold: u32,
    /// Detections below this score are ignored entirely
    pub min_confidence: f32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            height_tolerance: 0.3,
            grace_threshold: 10,
            min_confidence: 0.45,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub log_dir: String,
    /// Finalize all remaining tracks when a log stream ends
    pub drain_at_end: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub url: String,
    pub timeout_secs: u64,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// One detection frame as produced by the on-device model wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionFrame {
    pub timestamp_ms: u64,
    pub detections: Vec<Detection>,
}

/// A single per-frame detection. Carries no identity across frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub category: String,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn is_finite(&self) -> bool {
        self.left.is_finite()
            && self.top.is_finite()
            && self.right.is_finite()
            && self.bottom.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Still,
    Left,
    Right,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Still => "STILL",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
        }
    }
}

/// Per-track motion evidence. Buckets only ever increase while the track
/// is alive.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DirectionHistogram {
    pub still: u32,
    pub left: u32,
    pub right: u32,
}

impl DirectionHistogram {
    pub fn increment(&mut self, direction: Direction) {
        match direction {
            Direction::Still => self.still += 1,
            Direction::Left => self.left += 1,
            Direction::Right => self.right += 1,
        }
    }

    /// Bucket with the greatest count. Ties resolve STILL, then LEFT,
    /// then RIGHT.
    pub fn dominant(&self) -> Direction {
        if self.still >= self.left && self.still >= self.right {
            Direction::Still
        } else if self.left >= self.right {
            Direction::Left
        } else {
            Direction::Right
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
}

/// Finalized track event, emitted exactly once per track.
#[derive(Debug, Clone, Serialize)]
pub struct PassageEvent {
    pub track_id: u64,
    pub category: String,
    /// Timestamp of the track's last confirmed match, not finalization time
    pub timestamp_ms: u64,
    pub position: Option<GeoPosition>,
    pub direction: Direction,
    /// Frames the track was actually matched, for logging
    pub frames_seen: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dominant_direction_tie_break() {
        let histogram = DirectionHistogram {
            still: 2,
            left: 2,
            right: 2,
        };
        assert_eq!(histogram.dominant(), Direction::Still);

        let histogram = DirectionHistogram {
            still: 1,
            left: 3,
            right: 3,
        };
        assert_eq!(histogram.dominant(), Direction::Left);

        let histogram = DirectionHistogram {
            still: 1,
            left: 2,
            right: 5,
        };
        assert_eq!(histogram.dominant(), Direction::Right);
    }

    #[test]
    fn test_bounding_box_finite_check() {
        let bbox = BoundingBox {
            left: 0.0,
            top: 0.0,
            right: f32::NAN,
            bottom: 10.0,
        };
        assert!(!bbox.is_finite());

        let bbox = BoundingBox {
            left: 0.0,
            top: 0.0,
            right: 10.0,
            bottom: 10.0,
        };
        assert!(bbox.is_finite());
        assert_eq!(bbox.height(), 10.0);
        assert_eq!(bbox.width(), 10.0);
    }

    #[test]
    fn test_direction_wire_names() {
        assert_eq!(Direction::Still.as_str(), "STILL");
        assert_eq!(Direction::Left.as_str(), "LEFT");
        assert_eq!(Direction::Right.as_str(), "RIGHT");
    }
}

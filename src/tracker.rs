// src/tracker.rs
//
// Frame-to-frame tracker that turns independent per-frame detections into
// persistent passage events with a coarse direction of travel.
//
// Design:
//   - Greedy first-fit matching in input order (category equality + relative
//     height tolerance). No cost matrix. Known limitation: two same-category
//     objects whose paths cross can swap identities.
//   - Tracks coast through brief detection dropouts via a grace counter.
//   - A track whose grace exceeds the threshold is finalized exactly once:
//     it produces a PassageEvent and leaves the store in the same frame.
//   - The store is rebuilt wholesale every frame so callers always see a
//     consistent generation between `process` calls.

use crate::types::{
    BoundingBox, Detection, DetectionFrame, Direction, DirectionHistogram, GeoPosition,
    PassageEvent, TrackingConfig,
};
use tracing::{debug, info, warn};

/// A single tracked object followed across consecutive detection frames.
#[derive(Debug, Clone)]
pub struct Track {
    /// Unique identity, never reused
    pub id: u64,
    /// Fixed at creation; a track never changes category
    pub category: String,
    pub bbox: BoundingBox,
    pub directions: DirectionHistogram,
    /// Consecutive frames without a match
    pub grace: u32,
    /// Frames with a successful match, including the creating one
    pub frames_seen: u32,
    pub first_seen_ms: u64,
    pub last_seen_ms: u64,
}

impl Track {
    fn new(id: u64, detection: &Detection, timestamp_ms: u64) -> Self {
        // A freshly created track has no motion evidence yet, so it starts
        // with a single STILL observation.
        let mut directions = DirectionHistogram::default();
        directions.increment(Direction::Still);
        Self {
            id,
            category: detection.category.clone(),
            bbox: detection.bbox,
            directions,
            grace: 0,
            frames_seen: 1,
            first_seen_ms: timestamp_ms,
            last_seen_ms: timestamp_ms,
        }
    }

    /// Category equality plus relative height tolerance. Height ratio is
    /// the only geometric test, matching the source contract.
    fn matches(&self, detection: &Detection, height_tolerance: f32) -> bool {
        if detection.category != self.category {
            return false;
        }
        let prev_height = self.bbox.height();
        if prev_height <= 0.0 {
            return false;
        }
        let difference = (detection.bbox.height() - prev_height).abs() / prev_height;
        difference <= height_tolerance
    }

    /// LEFT if both horizontal edges moved negative, RIGHT if both moved
    /// positive, STILL otherwise.
    fn classify_motion(&self, detection: &Detection) -> Direction {
        let left_diff = detection.bbox.left - self.bbox.left;
        let right_diff = detection.bbox.right - self.bbox.right;
        if left_diff < 0.0 && right_diff < 0.0 {
            Direction::Left
        } else if left_diff > 0.0 && right_diff > 0.0 {
            Direction::Right
        } else {
            Direction::Still
        }
    }

    fn update_with_detection(&mut self, detection: &Detection, timestamp_ms: u64) {
        let direction = self.classify_motion(detection);
        self.directions.increment(direction);
        self.bbox = detection.bbox;
        self.grace = 0;
        self.frames_seen += 1;
        self.last_seen_ms = timestamp_ms;
    }
}

pub struct Tracker {
    config: TrackingConfig,
    tracks: Vec<Track>,
    next_id: u64,
}

impl Tracker {
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            config,
            tracks: Vec::with_capacity(32),
            next_id: 1,
        }
    }

    /// Process one detection frame. Returns the passage events of every
    /// track finalized by this frame.
    ///
    /// Single-writer: no second frame may be processed until this returns.
    pub fn process(
        &mut self,
        frame: &DetectionFrame,
        now_pos: Option<GeoPosition>,
    ) -> Vec<PassageEvent> {
        let valid: Vec<&Detection> = frame
            .detections
            .iter()
            .filter(|d| self.accept(d))
            .collect();

        // Previous generation becomes a pool; matched entries are taken out
        // so a track can be claimed by at most one detection per frame.
        let mut pool: Vec<Option<Track>> = self.tracks.drain(..).map(Some).collect();
        let mut next: Vec<Track> = Vec::with_capacity(pool.len() + valid.len());
        let mut events = Vec::new();

        // Greedy first-fit: detections in input order, tracks in store order.
        for detection in valid {
            let hit = pool.iter().position(|slot| {
                slot.as_ref()
                    .is_some_and(|t| t.matches(detection, self.config.height_tolerance))
            });
            match hit {
                Some(idx) => {
                    let mut track = pool[idx].take().unwrap();
                    track.update_with_detection(detection, frame.timestamp_ms);
                    next.push(track);
                }
                None => {
                    let track = Track::new(self.next_id, detection, frame.timestamp_ms);
                    debug!(
                        "New track T{} created: category={}, height={:.1}",
                        track.id,
                        track.category,
                        track.bbox.height()
                    );
                    self.next_id += 1;
                    next.push(track);
                }
            }
        }

        // Everything left in the pool went unmatched this frame.
        for slot in pool {
            let Some(mut track) = slot else { continue };
            track.grace += 1;
            if track.grace > self.config.grace_threshold {
                events.push(finalize(track, now_pos));
            } else {
                next.push(track);
            }
        }

        self.tracks = next;
        events
    }

    /// Finalize every remaining live track, e.g. at the end of a log
    /// stream. Same exactly-once guarantee as grace expiry.
    pub fn drain(&mut self, now_pos: Option<GeoPosition>) -> Vec<PassageEvent> {
        self.tracks
            .drain(..)
            .map(|track| finalize(track, now_pos))
            .collect()
    }

    /// Immutable copy of the current generation, for readers outside the
    /// frame-processing path.
    pub fn snapshot(&self) -> Vec<Track> {
        self.tracks.clone()
    }

    pub fn live_count(&self) -> usize {
        self.tracks.len()
    }

    /// Total tracks ever created.
    pub fn created_total(&self) -> u64 {
        self.next_id - 1
    }

    fn accept(&self, detection: &Detection) -> bool {
        if detection.category.is_empty()
            || !detection.bbox.is_finite()
            || !detection.score.is_finite()
        {
            warn!(
                "Skipping malformed detection: category={:?}, score={}",
                detection.category, detection.score
            );
            return false;
        }
        if detection.bbox.height() <= 0.0 {
            warn!(
                "Skipping degenerate box for {}: height={:.2}",
                detection.category,
                detection.bbox.height()
            );
            return false;
        }
        detection.score >= self.config.min_confidence
    }
}

fn finalize(track: Track, now_pos: Option<GeoPosition>) -> PassageEvent {
    let direction = track.directions.dominant();
    info!(
        "Track T{} finalized: {} {} after {} matched frames (histogram S/L/R = {}/{}/{})",
        track.id,
        track.category,
        direction.as_str(),
        track.frames_seen,
        track.directions.still,
        track.directions.left,
        track.directions.right
    );
    PassageEvent {
        track_id: track.id,
        category: track.category,
        timestamp_ms: track.last_seen_ms,
        position: now_pos,
        direction,
        frames_seen: track.frames_seen,
    }
}

// ============================================================================
// TESTS
// ============================================================================

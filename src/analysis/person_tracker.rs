// src/analysis/person_tracker.rs
//
// Nearest-centroid multi-person tracker.
//
// Design:
//   - Centroid = mean of confident torso landmarks (shoulders + hips)
//   - Greedy assignment: closest (track, detection) pairs first, each side
//     matched at most once, pairs beyond max_match_distance never match
//   - Tracks coast through detection gaps, then die after max_missed_frames
//   - Track ids come from a monotonic counter and are never reused
//   - Each track keeps a bounded history of centroid + hip/knee positions
//     for the travel check

use crate::detection::landmarks::{body_centroid, lower_body_centroid};
use crate::types::{FrameDetections, PersonDetection, Point, TeamId, TrackId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum centroid distance (px) for a detection to continue a track
    pub max_match_distance: f32,
    /// Consecutive unmatched frames a track survives before it is retired
    pub max_missed_frames: u32,
    /// Position samples kept per track
    pub history_len: usize,
    /// Minimum landmark confidence used for centroids
    pub min_keypoint_confidence: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_match_distance: 120.0,
            max_missed_frames: 30, // 1s at 30fps
            history_len: 90,
            min_keypoint_confidence: 0.3,
        }
    }
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    pub frame_index: u64,
    pub centroid: Point,
    /// Hip/knee centroid, None when the legs were not visible
    pub lower_body: Option<Point>,
}

#[derive(Debug, Clone)]
pub struct PersonTrack {
    pub id: TrackId,
    pub last_seen_frame: u64,
    pub frames_missed: u32,
    pub team: Option<TeamId>,
    pub history: VecDeque<PositionSample>,
}

impl PersonTrack {
    fn new(id: TrackId, sample: PositionSample, team: Option<TeamId>, capacity: usize) -> Self {
        let mut history = VecDeque::with_capacity(capacity);
        history.push_back(sample);
        Self {
            id,
            last_seen_frame: sample.frame_index,
            frames_missed: 0,
            team,
            history,
        }
    }

    pub fn centroid(&self) -> Option<Point> {
        self.history.back().map(|s| s.centroid)
    }

    pub fn lower_body(&self) -> Option<Point> {
        self.history.back().and_then(|s| s.lower_body)
    }

    fn update(&mut self, sample: PositionSample, team: Option<TeamId>, capacity: usize) {
        self.last_seen_frame = sample.frame_index;
        self.frames_missed = 0;
        if team.is_some() {
            self.team = team;
        }
        self.history.push_back(sample);
        while self.history.len() > capacity {
            self.history.pop_front();
        }
    }

    fn mark_missed(&mut self) {
        self.frames_missed += 1;
    }
}

/// A person detection matched to a track on the current frame.
#[derive(Debug, Clone)]
pub struct TrackedPerson {
    pub track_id: TrackId,
    pub team: Option<TeamId>,
    pub centroid: Point,
    pub detection: PersonDetection,
}

// ============================================================================
// MAIN TRACKER
// ============================================================================

pub struct PersonTracker {
    config: TrackerConfig,
    tracks: BTreeMap<TrackId, PersonTrack>,
    next_id: TrackId,
}

impl PersonTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Process one frame. Returns the people seen this frame with their track ids.
    pub fn update(&mut self, frame: &FrameDetections) -> Vec<TrackedPerson> {
        let min_conf = self.config.min_keypoint_confidence;

        // Detections without a single usable landmark cannot be placed
        let candidates: Vec<(usize, Point, Option<Point>)> = frame
            .people
            .iter()
            .enumerate()
            .filter_map(|(di, person)| {
                let centroid = body_centroid(person, min_conf);
                if centroid.is_none() {
                    debug!(
                        "frame {}: person #{} has no visible landmarks",
                        frame.frame_index, di
                    );
                }
                centroid.map(|c| (di, c, lower_body_centroid(person, min_conf)))
            })
            .collect();

        // ─────────────────────────────────────────────────────────────────
        // GREEDY NEAREST-CENTROID MATCHING
        // ─────────────────────────────────────────────────────────────────
        let max_dist = self.config.max_match_distance;
        let mut pairs: Vec<(TrackId, usize, f32)> = Vec::new();
        for track in self.tracks.values() {
            let Some(tc) = track.centroid() else {
                continue;
            };
            for (ci, (_, dc, _)) in candidates.iter().enumerate() {
                let dist = tc.distance(dc);
                if dist <= max_dist {
                    pairs.push((track.id, ci, dist));
                }
            }
        }
        pairs.sort_by(|a, b| {
            a.2.partial_cmp(&b.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
                .then(a.1.cmp(&b.1))
        });

        let mut matched_tracks: BTreeMap<TrackId, usize> = BTreeMap::new();
        let mut matched_candidates = vec![false; candidates.len()];
        for (track_id, ci, _dist) in &pairs {
            if matched_tracks.contains_key(track_id) || matched_candidates[*ci] {
                continue;
            }
            matched_tracks.insert(*track_id, *ci);
            matched_candidates[*ci] = true;
        }

        let mut seen: Vec<(TrackId, usize)> = Vec::with_capacity(candidates.len());
        let capacity = self.config.history_len;

        // ─────────────────────────────────────────────────────────────────
        // MATCHED → UPDATE, UNMATCHED → COAST
        // ─────────────────────────────────────────────────────────────────
        for track in self.tracks.values_mut() {
            match matched_tracks.get(&track.id) {
                Some(&ci) => {
                    let (di, centroid, lower_body) = candidates[ci];
                    track.update(
                        PositionSample {
                            frame_index: frame.frame_index,
                            centroid,
                            lower_body,
                        },
                        frame.people[di].team,
                        capacity,
                    );
                    seen.push((track.id, di));
                }
                None => track.mark_missed(),
            }
        }

        // ─────────────────────────────────────────────────────────────────
        // UNMATCHED DETECTIONS → NEW TRACKS
        // ─────────────────────────────────────────────────────────────────
        for (ci, matched) in matched_candidates.iter().enumerate() {
            if *matched {
                continue;
            }
            let (di, centroid, lower_body) = candidates[ci];
            let id = self.next_id;
            self.next_id += 1;
            let track = PersonTrack::new(
                id,
                PositionSample {
                    frame_index: frame.frame_index,
                    centroid,
                    lower_body,
                },
                frame.people[di].team,
                capacity,
            );
            info!(
                "New track P{} at ({:.0}, {:.0}), team={:?}",
                id, centroid.x, centroid.y, track.team
            );
            self.tracks.insert(id, track);
            seen.push((id, di));
        }

        // ─────────────────────────────────────────────────────────────────
        // RETIRE DEAD TRACKS
        // ─────────────────────────────────────────────────────────────────
        let max_missed = self.config.max_missed_frames;
        self.tracks.retain(|id, t| {
            if t.frames_missed > max_missed {
                info!("Track P{} retired (missed {} frames)", id, t.frames_missed);
                return false;
            }
            true
        });

        seen.sort_by_key(|(id, _)| *id);
        seen.into_iter()
            .filter_map(|(id, di)| {
                let track = self.tracks.get(&id)?;
                Some(TrackedPerson {
                    track_id: id,
                    team: track.team,
                    centroid: track.centroid()?,
                    detection: frame.people[di].clone(),
                })
            })
            .collect()
    }

    pub fn get(&self, id: TrackId) -> Option<&PersonTrack> {
        self.tracks.get(&id)
    }

    pub fn team_of(&self, id: TrackId) -> Option<TeamId> {
        self.tracks.get(&id).and_then(|t| t.team)
    }

    pub fn live_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn total_created(&self) -> u64 {
        u64::from(self.next_id - 1)
    }

    /// Drops all tracks. The id counter is kept so ids stay unique for the
    /// lifetime of the owning session.
    pub fn clear(&mut self) {
        self.tracks.clear();
    }
}

// ============================================================================
// TESTS
// ============================================================================

// src/analysis/possession.rs
//
// Decides, frame by frame, who holds the ball.
//
// A candidate is the tracked person whose wrist is nearest to the ball box
// (within max_wrist_distance, above min_wrist_confidence). Two hysteresis
// windows keep detector noise from reaching the play logic:
//
//   - Acquisition: a new holder (including the very first one) must be the
//     nearest candidate for hysteresis_frames consecutive frames. A one-frame
//     flicker to another player never reassigns possession.
//   - Lapse: frames with no candidate at all add to a miss streak. The
//     streak is only cleared once candidates have been seen for
//     hysteresis_frames consecutive frames, so a stream that keeps losing
//     the ball every other frame still lapses the episode.
//
// All counters advance per processed frame. Frames dropped upstream never
// reach this module and therefore only delay a window, never skip it.

use super::person_tracker::TrackedPerson;
use crate::detection::landmarks::wrists;
use crate::types::{BallBox, TrackId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PossessionConfig {
    /// Max distance (px) from a wrist to the ball box edge
    pub max_wrist_distance: f32,
    pub min_wrist_confidence: f32,
    /// Consecutive frames a new holder must be nearest before confirmation
    pub hysteresis_frames: u32,
    /// Frames without any candidate before the open episode lapses
    pub lapse_frames: u32,
}

impl Default for PossessionConfig {
    fn default() -> Self {
        Self {
            max_wrist_distance: 40.0,
            min_wrist_confidence: 0.3,
            hysteresis_frames: 3,
            lapse_frames: 15, // 0.5s at 30fps
        }
    }
}

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub track_id: TrackId,
    pub distance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PossessionTransition {
    /// A holder was confirmed. `previous` is the holder whose episode this
    /// closes, None when possession was free.
    Acquired {
        holder: TrackId,
        previous: Option<TrackId>,
    },
    /// The open episode closed without a successor.
    Lapsed { holder: TrackId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PossessionOutcome {
    /// Ball used for this frame, after selection and filtering
    pub ball: Option<BallBox>,
    /// Nearest qualifying wrist this frame
    pub nearest: Option<Candidate>,
    /// Confirmed holder after this frame
    pub holder: Option<TrackId>,
    /// Candidate inside the acquisition window and its streak
    pub pending: Option<(TrackId, u32)>,
    pub transition: Option<PossessionTransition>,
}

impl PossessionOutcome {
    pub fn in_hand_of(&self, id: TrackId) -> bool {
        self.nearest.map(|c| c.track_id) == Some(id)
    }
}

/// Highest confidence wins; ties go to the larger box, then the earlier row.
pub fn select_ball(boxes: &[BallBox]) -> Option<BallBox> {
    let mut best: Option<BallBox> = None;
    for b in boxes {
        best = match best {
            None => Some(*b),
            Some(cur) => {
                if b.confidence > cur.confidence
                    || (b.confidence == cur.confidence && b.area() > cur.area())
                {
                    Some(*b)
                } else {
                    Some(cur)
                }
            }
        };
    }
    best
}

// ============================================================================
// RESOLVER
// ============================================================================

pub struct PossessionResolver {
    config: PossessionConfig,
    holder: Option<TrackId>,
    pending: Option<(TrackId, u32)>,
    miss_streak: u32,
    hit_streak: u32,
}

impl PossessionResolver {
    pub fn new(config: PossessionConfig) -> Self {
        Self {
            config,
            holder: None,
            pending: None,
            miss_streak: 0,
            hit_streak: 0,
        }
    }

    pub fn holder(&self) -> Option<TrackId> {
        self.holder
    }

    pub fn update(&mut self, ball: Option<BallBox>, people: &[TrackedPerson]) -> PossessionOutcome {
        let nearest = ball.and_then(|b| self.nearest_wrist(&b, people));
        let mut transition = None;

        match nearest {
            Some(c) => {
                self.hit_streak = self.hit_streak.saturating_add(1);
                if self.hit_streak >= self.config.hysteresis_frames {
                    self.miss_streak = 0;
                }

                if self.holder == Some(c.track_id) {
                    self.pending = None;
                } else {
                    let streak = match self.pending {
                        Some((id, n)) if id == c.track_id => n + 1,
                        _ => 1,
                    };
                    if streak >= self.config.hysteresis_frames {
                        let previous = self.holder.replace(c.track_id);
                        self.pending = None;
                        self.miss_streak = 0;
                        info!(
                            "Possession confirmed: P{} (previous {:?})",
                            c.track_id, previous
                        );
                        transition = Some(PossessionTransition::Acquired {
                            holder: c.track_id,
                            previous,
                        });
                    } else {
                        debug!(
                            "Possession pending: P{} {}/{}",
                            c.track_id, streak, self.config.hysteresis_frames
                        );
                        self.pending = Some((c.track_id, streak));
                    }
                }
            }
            None => {
                self.hit_streak = 0;
                self.pending = None;
                self.miss_streak = self.miss_streak.saturating_add(1);
                if self.miss_streak >= self.config.lapse_frames {
                    if let Some(holder) = self.holder.take() {
                        info!(
                            "Possession lapsed: P{} ({} frames without a holder)",
                            holder, self.miss_streak
                        );
                        transition = Some(PossessionTransition::Lapsed { holder });
                    }
                }
            }
        }

        PossessionOutcome {
            ball,
            nearest,
            holder: self.holder,
            pending: self.pending,
            transition,
        }
    }

    /// Clears the lapse streak after the holder completes a dribble cycle.
    /// The cycle's away frames never add up across bounces.
    pub fn renew(&mut self, holder: TrackId) {
        if self.holder == Some(holder) {
            debug!("P{} completed a dribble, lapse streak cleared", holder);
            self.miss_streak = 0;
        }
    }

    fn nearest_wrist(&self, ball: &BallBox, people: &[TrackedPerson]) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        for person in people {
            for wrist in wrists(&person.detection, self.config.min_wrist_confidence) {
                let distance = ball.distance_to(&wrist);
                if distance > self.config.max_wrist_distance {
                    continue;
                }
                let better = match best {
                    None => true,
                    Some(b) => {
                        distance < b.distance
                            || (distance == b.distance && person.track_id < b.track_id)
                    }
                };
                if better {
                    best = Some(Candidate {
                        track_id: person.track_id,
                        distance,
                    });
                }
            }
        }
        best
    }

    pub fn reset(&mut self) {
        self.holder = None;
        self.pending = None;
        self.miss_streak = 0;
        self.hit_streak = 0;
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Keypoint, PersonDetection, Point, NUM_LANDMARKS};

    fn person(track_id: TrackId, wrist_x: f32, wrist_y: f32) -> TrackedPerson {
        let mut keypoints = [Keypoint {
            x: wrist_x,
            y: wrist_y + 100.0,
            confidence: 0.9,
        }; NUM_LANDMARKS];
        keypoints[9] = Keypoint {
            x: wrist_x,
            y: wrist_y,
            confidence: 0.9,
        };
        keypoints[10] = Keypoint {
            x: wrist_x + 200.0,
            y: wrist_y,
            confidence: 0.1,
        };
        TrackedPerson {
            track_id,
            team: None,
            centroid: Point::new(wrist_x, wrist_y + 100.0),
            detection: PersonDetection {
                keypoints,
                team: None,
            },
        }
    }

    fn ball(x: f32, y: f32) -> Option<BallBox> {
        Some(BallBox {
            x1: x - 10.0,
            y1: y - 10.0,
            x2: x + 10.0,
            y2: y + 10.0,
            confidence: 0.9,
        })
    }

    fn resolver() -> PossessionResolver {
        PossessionResolver::new(PossessionConfig::default())
    }

    #[test]
    fn test_select_ball_confidence_then_area() {
        let small = BallBox { x1: 0.0, y1: 0.0, x2: 10.0, y2: 10.0, confidence: 0.8 };
        let large = BallBox { x1: 0.0, y1: 0.0, x2: 20.0, y2: 20.0, confidence: 0.8 };
        let best = BallBox { x1: 0.0, y1: 0.0, x2: 5.0, y2: 5.0, confidence: 0.95 };
        assert_eq!(select_ball(&[small, large]), Some(large));
        assert_eq!(select_ball(&[small, best, large]), Some(best));
        assert_eq!(select_ball(&[]), None);
    }

    #[test]
    fn test_first_holder_needs_hysteresis() {
        let mut r = resolver();
        let people = vec![person(1, 100.0, 100.0)];
        assert_eq!(r.update(ball(100.0, 100.0), &people).transition, None);
        assert_eq!(r.update(ball(100.0, 100.0), &people).transition, None);
        let out = r.update(ball(100.0, 100.0), &people);
        assert_eq!(
            out.transition,
            Some(PossessionTransition::Acquired {
                holder: 1,
                previous: None
            })
        );
        assert_eq!(out.holder, Some(1));
    }

    #[test]
    fn test_single_frame_flicker_does_not_reassign() {
        let mut r = resolver();
        let p1 = person(1, 100.0, 100.0);
        let p2 = person(2, 300.0, 100.0);
        let people = vec![p1, p2];
        for _ in 0..3 {
            r.update(ball(100.0, 100.0), &people);
        }
        assert_eq!(r.holder(), Some(1));

        let out = r.update(ball(300.0, 100.0), &people);
        assert_eq!(out.pending, Some((2, 1)));
        assert_eq!(out.transition, None);
        let out = r.update(ball(100.0, 100.0), &people);
        assert_eq!(out.pending, None);
        assert_eq!(out.holder, Some(1));
    }

    #[test]
    fn test_handoff_after_hysteresis() {
        let mut r = resolver();
        let people = vec![person(1, 100.0, 100.0), person(2, 300.0, 100.0)];
        for _ in 0..3 {
            r.update(ball(100.0, 100.0), &people);
        }
        let mut transitions = Vec::new();
        for _ in 0..3 {
            if let Some(t) = r.update(ball(300.0, 100.0), &people).transition {
                transitions.push(t);
            }
        }
        assert_eq!(
            transitions,
            vec![PossessionTransition::Acquired {
                holder: 2,
                previous: Some(1)
            }]
        );
    }

    #[test]
    fn test_lapse_after_consecutive_misses() {
        let mut r = resolver();
        let people = vec![person(1, 100.0, 100.0)];
        for _ in 0..3 {
            r.update(ball(100.0, 100.0), &people);
        }
        let mut lapsed_at = None;
        for i in 1..=20 {
            if let Some(PossessionTransition::Lapsed { holder }) = r.update(None, &people).transition {
                assert_eq!(holder, 1);
                lapsed_at = Some(i);
                break;
            }
        }
        assert_eq!(lapsed_at, Some(15));
        assert_eq!(r.holder(), None);
    }

    #[test]
    fn test_intermittent_ball_still_lapses() {
        let mut r = resolver();
        let people = vec![person(1, 100.0, 100.0)];
        for _ in 0..3 {
            r.update(ball(100.0, 100.0), &people);
        }
        let mut lapsed = false;
        for i in 0..40 {
            let b = if i % 2 == 0 { None } else { ball(100.0, 100.0) };
            if let Some(PossessionTransition::Lapsed { .. }) = r.update(b, &people).transition {
                lapsed = true;
            }
        }
        assert!(lapsed);
        assert_eq!(r.holder(), None);

        // steady ball afterwards opens a fresh episode, not a handoff
        r.update(None, &people);
        r.update(ball(100.0, 100.0), &people);
        r.update(ball(100.0, 100.0), &people);
        let out = r.update(ball(100.0, 100.0), &people);
        assert_eq!(
            out.transition,
            Some(PossessionTransition::Acquired {
                holder: 1,
                previous: None
            })
        );
    }

    #[test]
    fn test_renew_restarts_lapse_count() {
        let mut r = resolver();
        let people = vec![person(1, 100.0, 100.0)];
        for _ in 0..3 {
            r.update(ball(100.0, 100.0), &people);
        }
        // 5 bounces of 3 away frames + 1 catch: 15 away frames in total
        for _ in 0..5 {
            for _ in 0..3 {
                assert_eq!(r.update(None, &people).transition, None);
            }
            r.update(ball(100.0, 100.0), &people);
            r.renew(1);
        }
        assert_eq!(r.holder(), Some(1));

        // renewing someone else does nothing
        for _ in 0..14 {
            r.update(None, &people);
        }
        r.renew(2);
        let out = r.update(None, &people);
        assert_eq!(out.transition, Some(PossessionTransition::Lapsed { holder: 1 }));
    }

    #[test]
    fn test_short_gap_recovers() {
        let mut r = resolver();
        let people = vec![person(1, 100.0, 100.0)];
        for _ in 0..3 {
            r.update(ball(100.0, 100.0), &people);
        }
        // 10 misses, 3 hits, 10 misses: never 15 in a row after recovery
        for _ in 0..10 {
            r.update(None, &people);
        }
        for _ in 0..3 {
            r.update(ball(100.0, 100.0), &people);
        }
        for _ in 0..10 {
            assert_eq!(r.update(None, &people).transition, None);
        }
        assert_eq!(r.holder(), Some(1));
    }

    #[test]
    fn test_low_confidence_wrist_ignored() {
        let mut r = resolver();
        // Ball sits on the low-confidence right wrist only
        let people = vec![person(1, 100.0, 100.0)];
        let out = r.update(ball(300.0, 100.0), &people);
        assert_eq!(out.nearest, None);
    }
}

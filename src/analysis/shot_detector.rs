// src/analysis/shot_detector.rs
//
// Trajectory-based shot detection, independent of possession episodes.
//
// The ball centroid is sampled over the last `trajectory_frames` processed
// frames. Once the ball has left the confirmed holder's hand, a shot is the
// window's start→end motion pointing up and, projected forward
// `projection_factor` times its own length, crossing the basket zone.
//
// One shot per release: the detector disarms after firing and re-arms the
// next time the ball is back in the holder's hand.

use super::possession::PossessionOutcome;
use crate::types::{FrameDetections, GameEvent, Point, Region, TrackId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info};

/// Below this the direction of travel is noise.
const MIN_MOTION_PX: f32 = 2.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShotConfig {
    /// Basket region in frame pixels. No zone, no shots.
    pub basket_zone: Option<Region>,
    pub trajectory_frames: usize,
    pub min_trajectory_points: usize,
    /// Minimum upward travel (px) between window start and end
    pub min_rise: f32,
    pub projection_factor: f32,
    /// Frames after the last in-hand sighting during which a shot is attributed
    pub release_window_frames: u32,
}

impl Default for ShotConfig {
    fn default() -> Self {
        Self {
            basket_zone: None,
            trajectory_frames: 5,
            min_trajectory_points: 3,
            min_rise: 10.0,
            projection_factor: 5.0,
            release_window_frames: 20,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Release {
    player: TrackId,
    frames_since: u32,
}

pub struct ShotDetector {
    config: ShotConfig,
    window: VecDeque<Option<Point>>,
    release: Option<Release>,
    armed: bool,
    frames_since_shot: Option<u64>,
}

impl ShotDetector {
    pub fn new(config: ShotConfig) -> Self {
        let capacity = config.trajectory_frames;
        Self {
            config,
            window: VecDeque::with_capacity(capacity),
            release: None,
            armed: false,
            frames_since_shot: None,
        }
    }

    /// Processed frames since the last emitted shot (0 on the shot frame).
    pub fn frames_since_shot(&self) -> Option<u64> {
        self.frames_since_shot
    }

    pub fn update(&mut self, frame: &FrameDetections, outcome: &PossessionOutcome) -> Option<GameEvent> {
        if let Some(n) = self.frames_since_shot.as_mut() {
            *n += 1;
        }
        if let Some(r) = self.release.as_mut() {
            r.frames_since = r.frames_since.saturating_add(1);
        }

        let ball = outcome.ball.map(|b| b.center());
        self.window.push_back(ball);
        while self.window.len() > self.config.trajectory_frames {
            self.window.pop_front();
        }

        if let Some(candidate) = outcome.nearest {
            if outcome.holder == Some(candidate.track_id) {
                self.release = Some(Release {
                    player: candidate.track_id,
                    frames_since: 0,
                });
                self.armed = true;
            }
            return None;
        }

        let zone = self.config.basket_zone?;
        if ball.is_none() || !self.armed {
            return None;
        }
        let release = self.release?;
        if release.frames_since > self.config.release_window_frames {
            return None;
        }

        let (start, end) = self.trajectory()?;
        let rise = start.y - end.y;
        if rise < self.config.min_rise {
            return None;
        }
        let (dx, dy) = (end.x - start.x, end.y - start.y);
        if dx.hypot(dy) < MIN_MOTION_PX {
            return None;
        }
        let k = self.config.projection_factor;
        let projected = Point::new(end.x + dx * k, end.y + dy * k);
        if !zone.intersects_segment(&end, &projected) {
            debug!(
                "frame {}: ball rising {:.0}px but not aimed at the basket",
                frame.frame_index, rise
            );
            return None;
        }

        self.armed = false;
        self.frames_since_shot = Some(0);
        info!(
            "🏀 SHOT: P{} at frame {} ({} frames after release)",
            release.player, frame.frame_index, release.frames_since
        );
        Some(GameEvent::shot(frame, release.player))
    }

    /// First and last observed centroids in the window.
    fn trajectory(&self) -> Option<(Point, Point)> {
        let observed: Vec<Point> = self.window.iter().flatten().copied().collect();
        if observed.len() < self.config.min_trajectory_points {
            return None;
        }
        Some((*observed.first()?, *observed.last()?))
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.release = None;
        self.armed = false;
        self.frames_since_shot = None;
    }
}

// src/types.rs

use crate::config::EngineConfig;
use serde::{Deserialize, Serialize};

pub type TrackId = u32;
pub type TeamId = u32;

/// Landmarks per person, fixed by the upstream pose model (COCO-17).
pub const NUM_LANDMARKS: usize = 17;

// ============================================================================
// FILE CONFIG
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub batch: BatchConfig,
    pub live: LiveConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub input_dir: String,
    pub output_dir: String,
    /// Extension of detection files picked up from `input_dir`
    pub extension: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_dir: "detections".to_string(),
            output_dir: "reports".to_string(),
            extension: "jsonl".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Inbound frames buffered per session before new frames are dropped
    pub queue_capacity: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self { queue_capacity: 8 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "hoopwatch=info".to_string(),
        }
    }
}

// ============================================================================
// GEOMETRY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Mean of a set of points, None when empty
    pub fn mean(points: &[Point]) -> Option<Point> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f32;
        let (sx, sy) = points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some(Point::new(sx / n, sy / n))
    }
}

/// Axis-aligned frame region in pixels, used for the basket zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Region {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.x1 && p.x <= self.x2 && p.y >= self.y1 && p.y <= self.y2
    }

    pub fn is_valid(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| v.is_finite())
            && self.x2 > self.x1
            && self.y2 > self.y1
    }

    /// Segment/box intersection (Liang-Barsky clipping).
    pub fn intersects_segment(&self, a: &Point, b: &Point) -> bool {
        if self.contains(a) || self.contains(b) {
            return true;
        }
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let mut t0 = 0.0f32;
        let mut t1 = 1.0f32;
        let checks = [
            (-dx, a.x - self.x1),
            (dx, self.x2 - a.x),
            (-dy, a.y - self.y1),
            (dy, self.y2 - a.y),
        ];
        for (p, q) in checks {
            if p == 0.0 {
                if q < 0.0 {
                    return false;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
            if t0 > t1 {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// DETECTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

impl Keypoint {
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl BallBox {
    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) * 0.5, (self.y1 + self.y2) * 0.5)
    }

    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Distance from `p` to the nearest point of the box (0 inside).
    pub fn distance_to(&self, p: &Point) -> f32 {
        let nx = p.x.clamp(self.x1, self.x2);
        let ny = p.y.clamp(self.y1, self.y2);
        p.distance(&Point::new(nx, ny))
    }
}

/// One person's pose for a frame, validated to the fixed landmark count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonDetection {
    pub keypoints: [Keypoint; NUM_LANDMARKS],
    pub team: Option<TeamId>,
}

/// Validated per-frame record handed to the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDetections {
    pub frame_index: u64,
    pub timestamp: f64,
    pub ball_boxes: Vec<BallBox>,
    pub people: Vec<PersonDetection>,
}

/// Inbound payload exactly as the detector produced it.
///
/// Shapes are loose on purpose: `[x1, y1, x2, y2, conf]` ball rows and
/// `[x, y, conf]` keypoint rows are checked by the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFrame {
    #[serde(default)]
    pub frame_index: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub ball_boxes: Vec<Vec<f32>>,
    #[serde(default)]
    pub people: Vec<RawPerson>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPerson {
    #[serde(default)]
    pub keypoints: Vec<Vec<f32>>,
    #[serde(default)]
    pub team: Option<TeamId>,
}

// ============================================================================
// EVENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Travel,
    DoubleDribble,
    Pass,
    Interception,
    Shot,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        Self::Travel,
        Self::DoubleDribble,
        Self::Pass,
        Self::Interception,
        Self::Shot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Travel => "travel",
            Self::DoubleDribble => "double_dribble",
            Self::Pass => "pass",
            Self::Interception => "interception",
            Self::Shot => "shot",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub timestamp: f64,
    #[serde(rename = "frame")]
    pub frame_index: u64,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<TeamId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<TrackId>,
}

impl GameEvent {
    pub fn travel(frame: &FrameDetections, player: TrackId, team: Option<TeamId>) -> Self {
        Self {
            kind: EventKind::Travel,
            timestamp: frame.timestamp,
            frame_index: frame.frame_index,
            description: format!("Travel violation by {}", describe_player(player, team)),
            team: None,
            player_id: None,
        }
    }

    pub fn double_dribble(frame: &FrameDetections, player: TrackId, team: Option<TeamId>) -> Self {
        Self {
            kind: EventKind::DoubleDribble,
            timestamp: frame.timestamp,
            frame_index: frame.frame_index,
            description: format!(
                "Double dribble violation by {}",
                describe_player(player, team)
            ),
            team: None,
            player_id: None,
        }
    }

    pub fn pass(frame: &FrameDetections, team: Option<TeamId>) -> Self {
        let description = match team {
            Some(t) => format!("Team {} pass", t),
            None => "Pass".to_string(),
        };
        Self {
            kind: EventKind::Pass,
            timestamp: frame.timestamp,
            frame_index: frame.frame_index,
            description,
            team,
            player_id: None,
        }
    }

    pub fn interception(frame: &FrameDetections, team: TeamId) -> Self {
        Self {
            kind: EventKind::Interception,
            timestamp: frame.timestamp,
            frame_index: frame.frame_index,
            description: format!("Team {} interception", team),
            team: Some(team),
            player_id: None,
        }
    }

    pub fn shot(frame: &FrameDetections, player: TrackId) -> Self {
        Self {
            kind: EventKind::Shot,
            timestamp: frame.timestamp,
            frame_index: frame.frame_index,
            description: format!("Shot by player {}", player),
            team: None,
            player_id: Some(player),
        }
    }
}

fn describe_player(player: TrackId, team: Option<TeamId>) -> String {
    match team {
        Some(t) => format!("player {} (team {})", player, t),
        None => format!("player {}", player),
    }
}

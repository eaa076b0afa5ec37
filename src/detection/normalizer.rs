// src/detection/normalizer.rs
//
// Boundary check between the external detector and the engine.
//
// Frame-level problems (missing index/timestamp, replayed or reordered
// frames, timestamps running backwards) reject the whole frame. Row-level
// problems (a ball row with the wrong arity, a person with a truncated
// skeleton) drop only that row; the rest of the frame is still processed.

use super::DetectionConfig;
use crate::error::{EngineError, Result};
use crate::types::{BallBox, FrameDetections, Keypoint, PersonDetection, RawFrame, RawPerson};
use crate::types::NUM_LANDMARKS;
use tracing::{debug, warn};

impl RawFrame {
    pub fn from_json(line: &str) -> Result<Self> {
        serde_json::from_str(line)
            .map_err(|e| EngineError::malformed(None, format!("unparseable payload: {}", e)))
    }
}

/// Position of the last accepted frame, as tracked by the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptedFrame {
    pub frame_index: u64,
    pub timestamp: f64,
}

pub struct FrameNormalizer {
    config: DetectionConfig,
}

impl FrameNormalizer {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    pub fn normalize(
        &self,
        raw: RawFrame,
        last: Option<AcceptedFrame>,
    ) -> Result<FrameDetections> {
        let frame_index = raw
            .frame_index
            .ok_or_else(|| EngineError::malformed(None, "missing frame_index"))?;
        let timestamp = raw
            .timestamp
            .ok_or_else(|| EngineError::malformed(Some(frame_index), "missing timestamp"))?;

        if !timestamp.is_finite() || timestamp < 0.0 {
            return Err(EngineError::malformed(
                Some(frame_index),
                format!("invalid timestamp {}", timestamp),
            ));
        }

        if let Some(prev) = last {
            if frame_index <= prev.frame_index {
                return Err(EngineError::malformed(
                    Some(frame_index),
                    format!(
                        "frame index not increasing (last accepted {})",
                        prev.frame_index
                    ),
                ));
            }
            if timestamp < prev.timestamp {
                return Err(EngineError::malformed(
                    Some(frame_index),
                    format!(
                        "timestamp {:.3}s earlier than last accepted {:.3}s",
                        timestamp, prev.timestamp
                    ),
                ));
            }
        }

        let ball_boxes: Vec<BallBox> = raw
            .ball_boxes
            .iter()
            .enumerate()
            .filter_map(|(i, row)| match parse_ball(row) {
                Some(b) if b.confidence >= self.config.min_ball_confidence => Some(b),
                Some(b) => {
                    debug!(
                        "frame {}: ball #{} below confidence ({:.2})",
                        frame_index, i, b.confidence
                    );
                    None
                }
                None => {
                    warn!("frame {}: dropping malformed ball row #{}", frame_index, i);
                    None
                }
            })
            .collect();

        let people: Vec<PersonDetection> = raw
            .people
            .iter()
            .enumerate()
            .filter_map(|(i, person)| {
                let parsed = parse_person(person);
                if parsed.is_none() {
                    warn!(
                        "frame {}: dropping person #{} ({} keypoint rows, expected {})",
                        frame_index,
                        i,
                        person.keypoints.len(),
                        NUM_LANDMARKS
                    );
                }
                parsed
            })
            .collect();

        Ok(FrameDetections {
            frame_index,
            timestamp,
            ball_boxes,
            people,
        })
    }
}

fn parse_ball(row: &[f32]) -> Option<BallBox> {
    if row.len() != 5 || row.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let b = BallBox {
        x1: row[0],
        y1: row[1],
        x2: row[2],
        y2: row[3],
        confidence: row[4],
    };
    if b.x2 < b.x1 || b.y2 < b.y1 {
        return None;
    }
    Some(b)
}

fn parse_person(raw: &RawPerson) -> Option<PersonDetection> {
    if raw.keypoints.len() != NUM_LANDMARKS {
        return None;
    }
    let mut keypoints = [Keypoint {
        x: 0.0,
        y: 0.0,
        confidence: 0.0,
    }; NUM_LANDMARKS];
    for (slot, row) in keypoints.iter_mut().zip(&raw.keypoints) {
        if row.len() != 3 || row.iter().any(|v| !v.is_finite()) {
            return None;
        }
        *slot = Keypoint {
            x: row[0],
            y: row[1],
            confidence: row[2],
        };
    }
    Some(PersonDetection {
        keypoints,
        team: raw.team,
    })
}

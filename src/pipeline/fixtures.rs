// src/pipeline/fixtures.rs
//
// Raw detector payloads for session-level tests.

use crate::types::{RawFrame, RawPerson, TeamId, NUM_LANDMARKS};

/// Player standing at x: body landmarks at y=300, left wrist at (x, 250),
/// right wrist invisible.
pub fn player(x: f32, team: Option<TeamId>) -> RawPerson {
    let mut keypoints = vec![vec![x, 300.0, 0.9]; NUM_LANDMARKS];
    keypoints[9] = vec![x, 250.0, 0.9];
    keypoints[10] = vec![x, 250.0, 0.0];
    RawPerson { keypoints, team }
}

/// 16px ball box centred on (x, y).
pub fn ball_row(x: f32, y: f32) -> Vec<f32> {
    vec![x - 8.0, y - 8.0, x + 8.0, y + 8.0, 0.9]
}

/// 30 fps stream position for `index`.
pub fn frame_with(index: u64, people: Vec<RawPerson>, ball_boxes: Vec<Vec<f32>>) -> RawFrame {
    RawFrame {
        frame_index: Some(index),
        timestamp: Some(index as f64 / 30.0),
        ball_boxes,
        people,
    }
}

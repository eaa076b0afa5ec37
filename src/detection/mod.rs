// src/detection/mod.rs
//
// Everything between the raw detector payload and the tracker.

pub mod ball_filter;
pub mod landmarks;
pub mod normalizer;

pub use ball_filter::BallJumpFilter;
pub use normalizer::{AcceptedFrame, FrameNormalizer};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Ball boxes below this confidence are dropped at the boundary
    pub min_ball_confidence: f32,
    /// Max ball centre travel per frame index; None disables the jump filter
    pub max_ball_step: Option<f32>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_ball_confidence: 0.3,
            max_ball_step: Some(150.0),
        }
    }
}

// src/detection/ball_filter.rs
//
// Rejects ball detections that teleport. The allowed jump grows with the
// number of frame indices since the last accepted ball, so a ball that
// reappears after a long gap is eventually accepted again.

use crate::types::{BallBox, Point};
use tracing::debug;

pub struct BallJumpFilter {
    max_step: Option<f32>,
    last_good: Option<(u64, Point)>,
}

impl BallJumpFilter {
    pub fn new(max_step: Option<f32>) -> Self {
        Self {
            max_step,
            last_good: None,
        }
    }

    pub fn accept(&mut self, ball: Option<BallBox>, frame_index: u64) -> Option<BallBox> {
        let ball = ball?;
        let center = ball.center();
        let Some(max_step) = self.max_step else {
            self.last_good = Some((frame_index, center));
            return Some(ball);
        };

        if let Some((last_frame, last_center)) = self.last_good {
            let gap = frame_index.saturating_sub(last_frame).max(1) as f32;
            let jump = center.distance(&last_center);
            if jump > max_step * gap {
                debug!(
                    "frame {}: ball jump {:.0}px over {} frame(s) rejected",
                    frame_index, jump, gap
                );
                return None;
            }
        }
        self.last_good = Some((frame_index, center));
        Some(ball)
    }

    pub fn reset(&mut self) {
        self.last_good = None;
    }
}
